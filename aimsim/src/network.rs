//! Cross-lane kinematics: who controls a vehicle's speed this tick, how positions advance, and
//! how transfers hand a section from one lane to the next. Lanes themselves ([`crate::lane`])
//! are dumb containers; this module is where the overall driving-state bookkeeping lives.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use geom::{Acceleration, Distance, Speed, Trajectory};
use log::warn;

use crate::ids::{IntersectionLaneId, RoadLaneId};
use crate::lane::{IntersectionLane, RoadLane, VehicleProgress, VehicleTransfer};
use crate::vehicle::{Vehicle, Vin, VehicleSection};

/// Either side of a seam: kinematics code shouldn't have to care which kind of lane it's
/// looking at beyond trajectory length and speed limit.
pub trait Lane {
    fn trajectory(&self) -> &Trajectory;
    fn speed_limit(&self) -> Speed;
    fn vehicles(&self) -> &VecDeque<Vin>;
    fn vehicles_mut(&mut self) -> &mut VecDeque<Vin>;
    fn progress(&self) -> &BTreeMap<Vin, VehicleProgress>;
    fn progress_mut(&mut self) -> &mut BTreeMap<Vin, VehicleProgress>;
}

impl Lane for RoadLane {
    fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }
    fn speed_limit(&self) -> Speed {
        self.speed_limit
    }
    fn vehicles(&self) -> &VecDeque<Vin> {
        &self.vehicles
    }
    fn vehicles_mut(&mut self) -> &mut VecDeque<Vin> {
        &mut self.vehicles
    }
    fn progress(&self) -> &BTreeMap<Vin, VehicleProgress> {
        &self.progress
    }
    fn progress_mut(&mut self) -> &mut BTreeMap<Vin, VehicleProgress> {
        &mut self.progress
    }
}

impl Lane for IntersectionLane {
    fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }
    fn speed_limit(&self) -> Speed {
        self.speed_limit
    }
    fn vehicles(&self) -> &VecDeque<Vin> {
        &self.vehicles
    }
    fn vehicles_mut(&mut self) -> &mut VecDeque<Vin> {
        &mut self.vehicles
    }
    fn progress(&self) -> &BTreeMap<Vin, VehicleProgress> {
        &self.progress
    }
    fn progress_mut(&mut self) -> &mut BTreeMap<Vin, VehicleProgress> {
        &mut self.progress
    }
}

/// What a lane with no in-lane leader asks its downstream object for.
pub enum DownstreamQuery {
    /// The road is clear; accelerate toward the speed limit.
    Clear,
    /// Brake as if there were a vehicle requiring this much stopping distance ahead.
    Distance(Distance),
}

/// The bang-bang longitudinal controller: either floor the brake or floor the
/// accelerator, then clip velocity to `[0, speed_limit]` afterward. Reports the *pre-clip*
/// acceleration.
pub fn accel_update(
    own_stopping_distance: Distance,
    effective_stopping_distance: DownstreamQuery,
    max_acceleration: Acceleration,
    max_braking: Acceleration,
    forced_brake: bool,
) -> Acceleration {
    if forced_brake {
        return max_braking;
    }
    match effective_stopping_distance {
        DownstreamQuery::Distance(gap) if own_stopping_distance > gap => max_braking,
        _ => max_acceleration,
    }
}

pub fn clip_velocity(v: Speed, effective_speed_limit: Speed) -> Speed {
    v.max(Speed::ZERO).min(effective_speed_limit)
}

/// Applies one timestep's worth of longitudinal motion to every present section of `vin` within
/// `lane`. Sections that cross progress 1 are pulled out of `lane`'s map and returned as
/// transfers; the caller threads those to whatever's downstream. Iterates a single lane's own
/// vehicle list in decreasing-progress order (front to back) is the caller's responsibility --
/// this function only ever touches one vehicle.
pub fn position_update(lane: &mut impl Lane, vin: Vin, velocity: Speed, dt_seconds: f64, entry_coord: geom::Coord) -> Vec<VehicleTransfer> {
    let length = lane.trajectory().length();
    let delta = velocity.inner_meters_per_second() * dt_seconds / length.inner_meters();
    let mut transfers = Vec::new();

    let progress = lane.progress_mut().get_mut(&vin).expect("position_update on vehicle not in lane");
    for section in VehicleSection::ALL {
        if let Some(p) = progress.get(section) {
            let new_p = p + delta;
            if new_p > 1.0 {
                let overshoot = Distance::meters((new_p - 1.0) * length.inner_meters());
                transfers.push(VehicleTransfer {
                    vehicle: vin,
                    section,
                    distance_remaining: Some(overshoot),
                    entry_coord,
                });
                progress.set(section, None);
            } else {
                progress.set(section, Some(new_p));
            }
        }
    }

    if lane.progress().get(&vin).map(|p| p.is_empty()).unwrap_or(false) {
        lane.progress_mut().remove(&vin);
        lane.vehicles_mut().retain(|v| *v != vin);
    }

    transfers
}

/// Appends a fresh-spawned vehicle's front, projected backward by its own length plus buffer so
/// the whole body starts inside the lane, or absorbs an in-flight section's remaining distance.
pub fn accept_transfer(lane: &mut impl Lane, transfer: VehicleTransfer, vehicle_length: Distance, length_buffer_factor: f64) {
    let lane_len = lane.trajectory().length();
    let p = match transfer.distance_remaining {
        Some(d) => (d.inner_meters() / lane_len.inner_meters()).max(0.0),
        None => {
            let back_off = vehicle_length.inner_meters() * (1.0 + length_buffer_factor);
            (-back_off / lane_len.inner_meters()).max(-1.0).min(0.0).max(0.0)
        }
    };

    let entry = lane.progress_mut().entry(transfer.vehicle).or_default();
    entry.set(transfer.section, Some(p));

    if !lane.vehicles().contains(&transfer.vehicle) {
        lane.vehicles_mut().push_back(transfer.vehicle);
    }
}

/// Logs (never rejects) an overlap between two consecutive vehicles' progress in the same lane.
/// A diagnostic only -- the reservation engine is what's supposed to prevent this from ever
/// actually happening.
pub fn warn_if_overlapping(lane_name: &str, leader: Vin, leader_rear: f64, follower: Vin, follower_front: f64) {
    if follower_front > leader_rear + 1e-9 {
        warn!(
            "collision warning on {}: follower {} front {:.4} ahead of leader {} rear {:.4}",
            lane_name, follower, follower_front, leader, leader_rear
        );
    }
}

/// Holds every lane and every live vehicle. Road lanes and intersection lanes reference each
/// other only by ID; there are no cross-lane pointers, so cloning a handful of lanes for the
/// reservation engine's mock loop never has to worry about dangling references.
#[derive(Clone, Debug)]
pub struct Network {
    pub road_lanes: BTreeMap<RoadLaneId, RoadLane>,
    pub intersection_lanes: BTreeMap<IntersectionLaneId, IntersectionLane>,
    pub vehicles: BTreeMap<Vin, Vehicle>,
    /// Lane-change manager override hook: vehicles forced to brake regardless of their
    /// own controller's decision. Always empty -- lane changing is out of scope, so nothing ever
    /// populates it, but `accel_update`'s call sites still consult it.
    pub to_slow: BTreeSet<Vin>,
}

impl Network {
    pub fn new() -> Network {
        Network {
            road_lanes: BTreeMap::new(),
            intersection_lanes: BTreeMap::new(),
            vehicles: BTreeMap::new(),
            to_slow: BTreeSet::new(),
        }
    }

    /// True if `lane` (a road lane) currently holds this vehicle's rear section -- the
    /// "controls this speed" test. A live vehicle holds its rear in exactly one lane at
    /// a time; a lane holding only a leading section (front, or front+center) while straddling
    /// a seam defers control to whichever lane still has the rear.
    pub fn road_lane_controls(&self, lane: RoadLaneId, vin: Vin) -> bool {
        self.road_lanes[&lane].progress.get(&vin).map(|p| p.rear.is_some()).unwrap_or(false)
    }

    pub fn intersection_lane_controls(&self, lane: IntersectionLaneId, vin: Vin) -> bool {
        self.intersection_lanes[&lane].progress.get(&vin).map(|p| p.rear.is_some()).unwrap_or(false)
    }
}

impl Default for Network {
    fn default() -> Network {
        Network::new()
    }
}
