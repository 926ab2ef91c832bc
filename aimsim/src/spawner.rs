//! Vehicle generation. A spawner owns one road lane's upstream end, draws arrivals at a
//! configured rate, and holds a single pending vehicle back (rather than dropping the arrival)
//! when there isn't room to place it yet.

use rand::Rng;
use rand_xorshift::XorShiftRng;

use geom::{Acceleration, Distance};

use crate::ids::{RoadLaneId, SpawnerId};
use crate::lane::VehicleProgress;
use crate::network::Network;
use crate::vehicle::{Vehicle, VehicleCharacteristics, VinCounter};

/// Closed ranges a spawner samples uniformly from when building a new vehicle. Mirrors the
/// teacher's `BorderSpawnOverTime` fields, just flattened into ranges instead of a handful of
/// hardcoded constants.
#[derive(Clone, Debug)]
pub struct VehicleTemplate {
    pub length: (f64, f64),
    pub width: (f64, f64),
    pub max_acceleration: (f64, f64),
    pub max_braking: (f64, f64),
    pub throttle_score: (f64, f64),
    pub tracking_score: (f64, f64),
    pub vot: (f64, f64),
}

impl Default for VehicleTemplate {
    fn default() -> VehicleTemplate {
        VehicleTemplate {
            length: (4.5, 5.5),
            width: (1.8, 2.2),
            max_acceleration: (2.5, 3.5),
            max_braking: (-3.5, -2.5),
            throttle_score: (0.8, 1.0),
            tracking_score: (0.8, 1.0),
            vot: (0.5, 2.0),
        }
    }
}

/// One destination choice and its relative weight. Weights need not sum to 1; `Spawner::pick`
/// normalizes.
#[derive(Clone, Copy, Debug)]
pub struct WeightedDestination {
    pub remover_id: u64,
    pub weight: f64,
}

#[derive(Debug)]
pub struct Spawner {
    pub id: SpawnerId,
    pub road_lane: RoadLaneId,
    pub rate_per_second: f64,
    pub destinations: Vec<WeightedDestination>,
    pub template: VehicleTemplate,
    rng: XorShiftRng,
    pending: Option<VehicleCharacteristics>,
}

impl Spawner {
    pub fn new(id: SpawnerId, road_lane: RoadLaneId, rate_per_second: f64, destinations: Vec<WeightedDestination>, template: VehicleTemplate, rng: XorShiftRng) -> Spawner {
        Spawner {
            id,
            road_lane,
            rate_per_second,
            destinations,
            template,
            rng,
            pending: None,
        }
    }

    /// Each tick, with probability `rate_per_second * dt_seconds`, draws a new arrival and holds
    /// it as `pending` until the lane has room to place it. Returns the VIN of any vehicle
    /// placed this call.
    pub fn step(&mut self, network: &mut Network, vin_counter: &VinCounter, dt_seconds: f64, length_buffer_factor: f64) -> Option<crate::vehicle::Vin> {
        if self.pending.is_none() && self.rng.gen::<f64>() < self.rate_per_second * dt_seconds {
            self.pending = Some(self.sample_characteristics());
        }

        let characteristics = self.pending.clone()?;
        let lane = network.road_lanes.get(&self.road_lane)?;
        let needed = Distance::meters(characteristics.length.inner_meters() * (1.0 + length_buffer_factor));
        if lane.room_to_enter() < needed {
            return None;
        }

        let vin = vin_counter.next();
        let heading = lane.trajectory.heading_at(0.0);
        let pos = lane.trajectory.start_coord();
        let vehicle = Vehicle::new(vin, pos, heading, characteristics);

        let lane = network.road_lanes.get_mut(&self.road_lane)?;
        lane.vehicles.push_back(vin);
        lane.progress.insert(vin, VehicleProgress::fresh_front(0.0));
        network.vehicles.insert(vin, vehicle);
        self.pending = None;
        Some(vin)
    }

    fn sample_characteristics(&mut self) -> VehicleCharacteristics {
        let destination_id = self.pick_destination();
        VehicleCharacteristics {
            destination_id,
            max_acceleration: Acceleration::meters_per_second_squared(sample(&mut self.rng, self.template.max_acceleration)),
            max_braking: Acceleration::meters_per_second_squared(sample(&mut self.rng, self.template.max_braking)),
            length: Distance::meters(sample(&mut self.rng, self.template.length)),
            width: Distance::meters(sample(&mut self.rng, self.template.width)),
            throttle_score: sample(&mut self.rng, self.template.throttle_score),
            tracking_score: sample(&mut self.rng, self.template.tracking_score),
            vot: sample(&mut self.rng, self.template.vot),
        }
    }

    fn pick_destination(&mut self) -> u64 {
        let total: f64 = self.destinations.iter().map(|d| d.weight).sum();
        if total <= 0.0 {
            return self.destinations.first().map(|d| d.remover_id).unwrap_or(0);
        }
        let mut roll = self.rng.gen::<f64>() * total;
        for d in &self.destinations {
            if roll < d.weight {
                return d.remover_id;
            }
            roll -= d.weight;
        }
        self.destinations.last().map(|d| d.remover_id).unwrap_or(0)
    }
}

fn sample(rng: &mut XorShiftRng, range: (f64, f64)) -> f64 {
    if range.0 >= range.1 {
        return range.0;
    }
    rng.gen_range(range.0..range.1)
}
