//! The reservation engine: `check_request` speculatively drives a cloned sequence of vehicles
//! through a cloned intersection lane against the real tiling, and returns the longest prefix
//! of the request that the tiling will actually accept. This is the hardest piece of the system
//! -- everything else exists to feed it or act on its answer.

use std::collections::BTreeMap;

use geom::{Coord, Distance, Timestep};

use crate::config::Config;
use crate::error::Result;
use crate::ids::{IntersectionLaneId, RoadLaneId};
use crate::lane::{IntersectionLane, RoadLane, VehicleProgress};
use crate::network::{self, Network};
use crate::reservation::{Reservation, ScheduledExit};
use crate::tiling::Tiling;
use crate::vehicle::{Vehicle, Vin, VehicleSection};

/// How many ticks past a vehicle's rear clearing the intersection lane its io buffer extends.
/// One step is the minimal spacing gadget; scenarios wanting more following room tune it via
/// `Config::length_buffer_factor` instead of this count.
const IO_BUFFER_STEPS: u32 = 1;

/// Resolves, for a vehicle waiting on an incoming road lane, which intersection lane it wants
/// and which road lane is downstream of that intersection lane. Supplied by the caller (the
/// pathfinder, via the manager) so the engine never has to know about routing.
pub struct Movement {
    pub intersection_lane: IntersectionLaneId,
    pub downstream_road_lane: RoadLaneId,
}

pub struct CheckRequestParams<'a> {
    pub incoming: RoadLaneId,
    pub mark: bool,
    pub sequence: bool,
    pub now: Timestep,
    pub config: &'a Config,
    pub movement_for: &'a dyn Fn(&Network, Vin, RoadLaneId) -> Option<Movement>,
}

/// Speculatively validates a prefix of `params.incoming`'s permission-less vehicles. Returns the
/// (possibly empty) prefix of `Reservation`s the tiling actually accepts. On success with
/// `mark == true`, the tiling carries fresh tentative marks for exactly the returned
/// reservations; any request this call tentatively marked but did not end up validating is
/// rolled back before returning.
pub fn check_request(network: &Network, tiling: &mut Tiling, params: CheckRequestParams) -> Result<Vec<Reservation>> {
    let incoming_lane = &network.road_lanes[&params.incoming];

    let (first, end) = match first_without_permission(incoming_lane, network, &params) {
        Some(range) => range,
        None => return Ok(Vec::new()),
    };
    let original_vins: Vec<Vin> = incoming_lane.vehicles.iter().skip(first).take(end - first).copied().collect();
    if original_vins.is_empty() {
        return Ok(Vec::new());
    }

    let movement = match (params.movement_for)(network, original_vins[0], params.incoming) {
        Some(m) => m,
        None => return Ok(Vec::new()),
    };
    let downstream_trajectory = network.road_lanes[&movement.downstream_road_lane].trajectory.clone();

    let dt = params.config.dt_seconds();
    let mut up = incoming_lane.clone_empty();
    let mut il = network.intersection_lanes[&movement.intersection_lane].clone_empty();
    let mut clone_vehicles: BTreeMap<Vin, Vehicle> = BTreeMap::new();
    let mut test_reservations: BTreeMap<Vin, Reservation> = BTreeMap::new();
    let mut valid_reservations: Vec<Reservation> = Vec::new();

    let mut spawn_idx = 0usize;
    let mut prior_rear_exit: Option<ScheduledExit> = None;
    let mut next_entry_exit = Some(incoming_lane.soonest_exit(first, params.now, dt, &network.vehicles, None));
    let mut test_t = next_entry_exit.unwrap().timestep;

    loop {
        step_speed_update(&il, &mut clone_vehicles, dt);

        // Position update within the intersection lane clone; a rear crossing finalizes that
        // vehicle's reservation with its exit buffer instead of continuing to track it.
        let il_order: Vec<Vin> = il.vehicles.iter().copied().collect();
        for vin in &il_order {
            let vin = *vin;
            let velocity = clone_vehicles[&vin].velocity;
            let entry_coord = il.trajectory.end_coord();
            let transfers = network::position_update(&mut il, vin, velocity, dt, entry_coord);
            if transfers.iter().any(|t| t.section == VehicleSection::Rear) {
                let reservation = test_reservations.remove(&vin).expect("exiting clone must have a test reservation");
                match finalize_exit(tiling, &downstream_trajectory, &clone_vehicles[&vin], vin, test_t, dt, params.mark) {
                    Some(footprint) => {
                        let mut reservation = reservation;
                        for (t, tiles) in footprint {
                            reservation.merge_footprint(t, tiles);
                        }
                        valid_reservations.push(reservation);
                        clone_vehicles.remove(&vin);
                    }
                    None => {
                        rollback_all(tiling, &test_reservations, params.mark);
                        unlink_dependency(&mut valid_reservations);
                        return Ok(valid_reservations);
                    }
                }
            }
        }

        // Position update within the upstream clone; crossings hand off onto the intersection
        // lane clone, and a rear crossing records this vehicle's exit bound for the next spawn.
        let up_order: Vec<Vin> = up.vehicles.iter().copied().collect();
        for vin in up_order {
            let velocity = clone_vehicles[&vin].velocity;
            let entry_coord = up.trajectory.end_coord();
            let transfers = network::position_update(&mut up, vin, velocity, dt, entry_coord);
            for transfer in transfers {
                let section = transfer.section;
                network::accept_transfer(&mut il, transfer, clone_vehicles[&vin].length(), params.config.length_buffer_factor);
                if section == VehicleSection::Rear {
                    prior_rear_exit = Some(ScheduledExit {
                        vehicle: vin,
                        section: VehicleSection::Rear,
                        timestep: test_t,
                        velocity,
                    });
                    if let Some(r) = test_reservations.get_mut(&vin) {
                        r.entry_exit = prior_rear_exit.unwrap();
                    }
                }
            }
        }

        // Tile check, front to back: a rejection poisons every clone from that point back.
        let il_order: Vec<Vin> = il.vehicles.iter().copied().collect();
        let mut reject_from: Option<usize> = None;
        for (pos, vin) in il_order.iter().enumerate() {
            let vin = *vin;
            let progress = il.progress[&vin];
            let p = representative_progress(&progress);
            let center = il.trajectory.position_at(p);
            let heading = il.trajectory.heading_at(p);
            let footprint = tiling.position_to_tiles(
                test_t,
                vin,
                center,
                heading,
                clone_vehicles[&vin].length(),
                clone_vehicles[&vin].width(),
                1.0,
                params.mark,
                false,
            );
            match footprint {
                Some(tiles) => {
                    test_reservations.get_mut(&vin).expect("in-flight clone must have a test reservation").add_footprint(test_t, tiles);
                }
                None => {
                    reject_from = Some(pos);
                    break;
                }
            }
        }
        if let Some(cut) = reject_from {
            if cut == 0 {
                rollback_all(tiling, &test_reservations, params.mark);
                unlink_dependency(&mut valid_reservations);
                return Ok(valid_reservations);
            }
            for vin in &il_order[cut..] {
                il.progress.remove(vin);
                il.vehicles.retain(|v| v != vin);
                up.progress.remove(vin);
                up.vehicles.retain(|v| v != vin);
                clone_vehicles.remove(vin);
                test_reservations.remove(vin);
            }
            if let Some(r) = test_reservations.get_mut(&il_order[cut - 1]) {
                r.dependency = None;
            }
            spawn_idx = original_vins.len(); // abandon any vehicles not yet cloned
            next_entry_exit = None;
        }

        // Spawn the next original vehicle once the upstream clone has drained.
        if up.vehicles.is_empty() && spawn_idx < original_vins.len() {
            if let Some(exit) = next_entry_exit {
                if exit.timestep <= test_t {
                    spawn_next(
                        &mut up,
                        &mut il,
                        &mut clone_vehicles,
                        &mut test_reservations,
                        &mut valid_reservations,
                        &network.vehicles,
                        &original_vins,
                        spawn_idx,
                        test_t,
                    );
                    spawn_idx += 1;
                    next_entry_exit = if spawn_idx < original_vins.len() {
                        let idx = first + spawn_idx;
                        Some(incoming_lane.soonest_exit(idx, params.now, dt, &network.vehicles, prior_rear_exit))
                    } else {
                        None
                    };
                }
            }
        }

        if up.vehicles.is_empty() && il.vehicles.is_empty() && spawn_idx >= original_vins.len() {
            break;
        }
        test_t = test_t.succ();
    }

    Ok(valid_reservations)
}

fn finalize_exit(
    tiling: &mut Tiling,
    downstream_trajectory: &geom::Trajectory,
    vehicle: &Vehicle,
    vin: Vin,
    test_t: Timestep,
    dt: f64,
    mark: bool,
) -> Option<crate::reservation::TileFootprint> {
    let heading = downstream_trajectory.heading_at(0.0);
    let speed = vehicle.velocity.inner_meters_per_second().max(0.1);
    let samples: Vec<(Timestep, Coord, geom::Angle)> = (1..=IO_BUFFER_STEPS)
        .map(|k| {
            let dist = Distance::meters(speed * dt * k as f64);
            (test_t.plus_steps(k as u64), downstream_trajectory.start_coord().project_along(heading, dist), heading)
        })
        .collect();
    tiling.io_tile_buffer(vin, &samples, vehicle.length(), vehicle.width(), 1.0, mark)
}

fn representative_progress(progress: &VehicleProgress) -> f64 {
    progress.center.or(progress.front).or(progress.rear).unwrap_or(0.0)
}

fn first_without_permission(lane: &RoadLane, network: &Network, params: &CheckRequestParams) -> Option<(usize, usize)> {
    let desired = |vin: Vin| (params.movement_for)(network, vin, params.incoming).map(|m| Coord::new(m.intersection_lane.0 as f64, 0.0));
    if params.sequence {
        lane.first_without_permission_sequenced(&network.vehicles, desired)
    } else {
        let idx = lane
            .vehicles
            .iter()
            .enumerate()
            .find(|(_, vin)| !network.vehicles[vin].permission_to_enter_intersection)
            .map(|(idx, _)| idx)?;
        let target = desired(lane.vehicles[idx])?;
        lane.first_without_permission_targeted(&network.vehicles, desired, &[target]).map(|idx| (idx, idx + 1))
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_next(
    up: &mut RoadLane,
    il: &mut IntersectionLane,
    clone_vehicles: &mut BTreeMap<Vin, Vehicle>,
    test_reservations: &mut BTreeMap<Vin, Reservation>,
    valid_reservations: &mut [Reservation],
    real_vehicles: &BTreeMap<Vin, Vehicle>,
    original_vins: &[Vin],
    spawn_idx: usize,
    test_t: Timestep,
) {
    let vin = original_vins[spawn_idx];
    let mut vehicle = real_vehicles[&vin].clone();

    let up_len = up.trajectory.length().inner_meters().max(1e-6);
    let half = (vehicle.length().inner_meters() / 2.0) / up_len;
    let full = vehicle.length().inner_meters() / up_len;
    up.progress.insert(
        vin,
        VehicleProgress {
            front: None,
            center: Some((1.0 - half).max(0.0)),
            rear: Some((1.0 - full).max(0.0)),
        },
    );
    up.vehicles.push_back(vin);

    il.progress.insert(vin, VehicleProgress::fresh_front(0.0));
    il.vehicles.push_back(vin);
    vehicle.pos = il.trajectory.start_coord();
    vehicle.heading = il.trajectory.heading_at(0.0);

    let dependent_on = original_vins[..spawn_idx].to_vec();
    let entry_exit = ScheduledExit {
        vehicle: vin,
        section: VehicleSection::Front,
        timestep: test_t,
        velocity: vehicle.velocity,
    };
    let reservation = Reservation::new(vin, il.trajectory.start_coord(), il.id, entry_exit, dependent_on);

    if let Some(prev_vin) = spawn_idx.checked_sub(1).map(|i| original_vins[i]) {
        if let Some(prev) = test_reservations.get_mut(&prev_vin) {
            prev.dependency = Some(vin);
        } else if let Some(prev) = valid_reservations.iter_mut().rev().find(|r| r.vehicle == prev_vin) {
            prev.dependency = Some(vin);
        }
    }

    clone_vehicles.insert(vin, vehicle);
    test_reservations.insert(vin, reservation);
}

fn unlink_dependency(valid: &mut [Reservation]) {
    if let Some(last) = valid.last_mut() {
        last.dependency = None;
    }
}

fn rollback_all(tiling: &mut Tiling, test_reservations: &BTreeMap<Vin, Reservation>, mark: bool) {
    if !mark {
        return;
    }
    for r in test_reservations.values() {
        tiling.rollback(r);
    }
}

fn step_speed_update(il: &IntersectionLane, clone_vehicles: &mut BTreeMap<Vin, Vehicle>, dt: f64) {
    let vins: Vec<Vin> = il.vehicles.iter().copied().collect();
    for (pos, vin) in vins.iter().enumerate() {
        let leader = pos.checked_sub(1).map(|i| vins[i]);
        let own_stop = clone_vehicles[vin].stopping_distance();
        let effective = match leader {
            Some(l) => {
                let leader_rear = il.progress[&l].rear.unwrap_or(1.0);
                let this_front = il.progress[vin].front.unwrap_or(1.0);
                let gap = Distance::meters((leader_rear - this_front).max(0.0) * il.trajectory.length().inner_meters());
                network::DownstreamQuery::Distance(gap + clone_vehicles[&l].stopping_distance())
            }
            None => {
                let this_front = il.progress[vin].front.unwrap_or(1.0);
                network::DownstreamQuery::Distance(il.trajectory.length() * (1.0 - this_front))
            }
        };
        let max_accel = clone_vehicles[vin].characteristics.max_acceleration;
        let max_brake = clone_vehicles[vin].characteristics.max_braking;
        let accel = network::accel_update(own_stop, effective, max_accel, max_brake, false);
        let vehicle = clone_vehicles.get_mut(vin).unwrap();
        vehicle.set_acceleration(accel);
        let new_v = vehicle.velocity + vehicle.acceleration * geom::Duration::const_seconds(dt);
        vehicle.velocity = network::clip_velocity(new_v, il.speed_limit);
    }
}
