//! The top-level driver. `Simulator::step` runs one discrete tick end to end: speed update,
//! position update and lane transfers, intersection manager request processing, then spawning.
//! Every phase runs to completion before the next starts -- nothing here interleaves lanes
//! mid-phase, so a timestep is never partially applied.

use geom::{Distance, Duration, Timestep};

use crate::config::Config;
use crate::error::{AimError, Result};
use crate::ids::{IntersectionLaneId, RoadLaneId};
use crate::intersection_manager::IntersectionManager;
use crate::network::{self, DownstreamQuery, Network};
use crate::pathfinder::GreedyPathfinder;
use crate::remover::Remover;
use crate::spawner::Spawner;
use crate::spec::{self, ScenarioSpec};
use crate::vehicle::{Vin, VinCounter};
use crate::vehicle::VehicleSection;

/// One fact worth recording about a tick, returned from [`Simulator::fetch_log`]. Intentionally
/// flat and serializable rather than an event-sourced ledger -- callers that want replay fidelity
/// should drive `step` themselves and record whatever they need between calls.
#[derive(Clone, Debug, serde::Serialize)]
pub enum LogEvent {
    Spawned { vehicle: Vin, timestep: Timestep },
    Departed { vehicle: Vin, timestep: Timestep },
    ReservationCommitted { vehicle: Vin, lane: IntersectionLaneId, timestep: Timestep },
}

pub struct Simulator {
    pub network: Network,
    managers: Vec<IntersectionManager>,
    spawners: Vec<Spawner>,
    removers: Vec<Remover>,
    pathfinder: GreedyPathfinder,
    config: Config,
    rng: rand_xorshift::XorShiftRng,
    vin_counter: VinCounter,
    now: Timestep,
    log: Vec<LogEvent>,
}

impl Simulator {
    pub fn new(spec: &ScenarioSpec) -> Result<Simulator> {
        let built = spec::build(spec, Timestep::ZERO)?;
        Ok(Simulator {
            network: built.network,
            managers: built.managers,
            spawners: built.spawners,
            removers: built.removers,
            pathfinder: built.pathfinder,
            config: spec.config.clone(),
            rng: crate::rng::seeded(spec.seed),
            vin_counter: VinCounter::default(),
            now: Timestep::ZERO,
            log: Vec::new(),
        })
    }

    pub fn now(&self) -> Timestep {
        self.now
    }

    /// Drains and returns every log entry recorded since the last call.
    pub fn fetch_log(&mut self) -> Vec<LogEvent> {
        std::mem::take(&mut self.log)
    }

    pub fn step(&mut self) -> Result<()> {
        let dt = self.config.dt_seconds();
        self.now = self.now.succ();

        self.speed_update_phase(dt);
        self.position_update_phase(dt)?;
        self.manager_phase()?;
        self.spawn_phase(dt);

        Ok(())
    }

    fn speed_update_phase(&mut self, dt: f64) {
        let road_lane_ids: Vec<RoadLaneId> = self.network.road_lanes.keys().copied().collect();
        for lane_id in road_lane_ids {
            self.speed_update_road_lane(lane_id, dt);
        }
        let il_ids: Vec<IntersectionLaneId> = self.network.intersection_lanes.keys().copied().collect();
        for lane_id in il_ids {
            self.speed_update_intersection_lane(lane_id, dt);
        }
    }

    fn speed_update_road_lane(&mut self, lane_id: RoadLaneId, dt: f64) {
        let vins: Vec<Vin> = self.network.road_lanes[&lane_id].vehicles.iter().copied().collect();
        for (pos, &vin) in vins.iter().enumerate() {
            if !self.network.road_lane_controls(lane_id, vin) {
                continue;
            }
            let lane = &self.network.road_lanes[&lane_id];
            let own_stop = self.network.vehicles[&vin].stopping_distance();
            let effective = if pos > 0 {
                let leader = vins[pos - 1];
                let leader_rear = lane.progress[&leader].rear.unwrap_or(1.0);
                let this_front = lane.progress[&vin].front.unwrap_or(1.0);
                let gap = Distance::meters((leader_rear - this_front).max(0.0) * lane.trajectory.length().inner_meters());
                DownstreamQuery::Distance(gap + self.network.vehicles[&leader].stopping_distance())
            } else if lane.downstream_is_remover || self.network.vehicles[&vin].permission_to_enter_intersection {
                DownstreamQuery::Clear
            } else {
                let front = lane.progress[&vin].front.unwrap_or(1.0);
                DownstreamQuery::Distance(lane.trajectory.length() * (1.0 - front))
            };
            self.apply_accel_update(vin, own_stop, effective, lane.speed_limit, dt);
        }
    }

    fn speed_update_intersection_lane(&mut self, lane_id: IntersectionLaneId, dt: f64) {
        let vins: Vec<Vin> = self.network.intersection_lanes[&lane_id].vehicles.iter().copied().collect();
        for (pos, &vin) in vins.iter().enumerate() {
            if !self.network.intersection_lane_controls(lane_id, vin) {
                continue;
            }
            let lane = &self.network.intersection_lanes[&lane_id];
            let own_stop = self.network.vehicles[&vin].stopping_distance();
            let effective = if pos > 0 {
                let leader = vins[pos - 1];
                let leader_rear = lane.progress[&leader].rear.unwrap_or(1.0);
                let this_front = lane.progress[&vin].front.unwrap_or(1.0);
                let gap = Distance::meters((leader_rear - this_front).max(0.0) * lane.trajectory.length().inner_meters());
                DownstreamQuery::Distance(gap + self.network.vehicles[&leader].stopping_distance())
            } else {
                DownstreamQuery::Clear
            };
            self.apply_accel_update(vin, own_stop, effective, lane.speed_limit, dt);
        }
    }

    fn apply_accel_update(&mut self, vin: Vin, own_stop: Distance, effective: DownstreamQuery, speed_limit: geom::Speed, dt: f64) {
        let forced_brake = self.network.to_slow.contains(&vin);
        let characteristics = &self.network.vehicles[&vin].characteristics;
        let accel = network::accel_update(own_stop, effective, characteristics.max_acceleration, characteristics.max_braking, forced_brake);
        let vehicle = self.network.vehicles.get_mut(&vin).unwrap();
        vehicle.set_acceleration(accel);
        let new_v = vehicle.velocity + vehicle.acceleration * Duration::const_seconds(dt);
        vehicle.velocity = network::clip_velocity(new_v, speed_limit);
    }

    fn position_update_phase(&mut self, dt: f64) -> Result<()> {
        let road_lane_ids: Vec<RoadLaneId> = self.network.road_lanes.keys().copied().collect();
        for lane_id in road_lane_ids {
            let vins: Vec<Vin> = self.network.road_lanes[&lane_id].vehicles.iter().copied().collect();
            for vin in vins {
                let velocity = self.network.vehicles[&vin].velocity;
                let entry_coord = self.network.road_lanes[&lane_id].trajectory.end_coord();
                let lane = self.network.road_lanes.get_mut(&lane_id).unwrap();
                let transfers = network::position_update(lane, vin, velocity, dt, entry_coord);
                if transfers.is_empty() {
                    continue;
                }

                if self.network.road_lanes[&lane_id].downstream_is_remover {
                    if let Some(remover) = self.removers.iter().find(|r| r.road_lane == lane_id).cloned() {
                        let departed = remover.collect(&mut self.network, &transfers);
                        for vehicle in departed {
                            self.log.push(LogEvent::Departed { vehicle, timestep: self.now });
                        }
                    }
                    continue;
                }

                let il_id = self
                    .destination_intersection_lane_for(vin)
                    .ok_or_else(|| AimError::invariant(format!("vehicle {} crossed out of road lane {} without a reservation", vin, lane_id)))?;
                let length = self.network.vehicles[&vin].length();
                for transfer in transfers {
                    let is_front = transfer.section == VehicleSection::Front;
                    let il = self.network.intersection_lanes.get_mut(&il_id).unwrap();
                    network::accept_transfer(il, transfer, length, self.config.length_buffer_factor);
                    if is_front {
                        for m in &mut self.managers {
                            if m.tiling.activate(vin).is_some() {
                                break;
                            }
                        }
                    }
                }
            }
        }

        let il_ids: Vec<IntersectionLaneId> = self.network.intersection_lanes.keys().copied().collect();
        for il_id in il_ids {
            let vins: Vec<Vin> = self.network.intersection_lanes[&il_id].vehicles.iter().copied().collect();
            let downstream = self.network.intersection_lanes[&il_id].downstream_road_lane;
            for vin in vins {
                let velocity = self.network.vehicles[&vin].velocity;
                let entry_coord = self.network.intersection_lanes[&il_id].trajectory.end_coord();
                let il = self.network.intersection_lanes.get_mut(&il_id).unwrap();
                let transfers = network::position_update(il, vin, velocity, dt, entry_coord);
                let length = self.network.vehicles[&vin].length();
                for transfer in transfers {
                    let is_rear = transfer.section == VehicleSection::Rear;
                    let lane = self.network.road_lanes.get_mut(&downstream).unwrap();
                    network::accept_transfer(lane, transfer, length, self.config.length_buffer_factor);
                    if is_rear {
                        for m in &mut self.managers {
                            m.tiling.finalize(vin);
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// An intersection lane a vehicle is already (partly) resident in wins over a reservation
    /// lookup -- that's the lane its other sections must join. Only a vehicle's very first
    /// section to cross needs the reservation lookup at all.
    fn destination_intersection_lane_for(&self, vin: Vin) -> Option<IntersectionLaneId> {
        if let Some((id, _)) = self.network.intersection_lanes.iter().find(|(_, il)| il.vehicles.contains(&vin)) {
            return Some(*id);
        }
        for m in &self.managers {
            if let Some(r) = m.tiling.queued_reservations().get(&vin) {
                return Some(r.lane);
            }
            if let Some(r) = m.tiling.active_reservations().get(&vin) {
                return Some(r.lane);
            }
        }
        None
    }

    fn manager_phase(&mut self) -> Result<()> {
        for manager in &mut self.managers {
            manager.advance_time();
            let committed = manager.step(&mut self.network, &self.pathfinder, &mut self.rng, self.now, &self.config)?;
            for r in committed {
                self.log.push(LogEvent::ReservationCommitted {
                    vehicle: r.vehicle,
                    lane: r.lane,
                    timestep: self.now,
                });
            }
        }
        Ok(())
    }

    fn spawn_phase(&mut self, dt: f64) {
        for spawner in &mut self.spawners {
            if let Some(vehicle) = spawner.step(&mut self.network, &self.vin_counter, dt, self.config.length_buffer_factor) {
                self.log.push(LogEvent::Spawned { vehicle, timestep: self.now });
            }
        }
    }
}
