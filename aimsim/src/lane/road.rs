use std::collections::{BTreeMap, VecDeque};

use geom::{Distance, Speed, Timestep, Trajectory};
use serde::{Deserialize, Serialize};

use crate::ids::RoadLaneId;
use crate::reservation::ScheduledExit;
use crate::vehicle::{Vehicle, Vin, VehicleSection};

use super::VehicleProgress;

/// A lane bordered upstream by a spawner or an intersection lane, and downstream by a remover or
/// an intersection lane. Owns its trajectory, its geometry-derived region thresholds, and the
/// one `ScheduledExit` in flight so concurrent reservation checks against it don't overlap.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoadLane {
    pub id: RoadLaneId,
    pub trajectory: Trajectory,
    pub width: Distance,
    pub speed_limit: Speed,
    /// Proportional end of the entrance region (closest to the start), `< lcregion_end < 1`.
    pub entrance_end: f64,
    /// Proportional end of the lane-change / approach region.
    pub lcregion_end: f64,
    pub upstream_is_spawner: bool,
    pub downstream_is_remover: bool,

    /// Ordered front-to-back: `vehicles[0]` has the highest progress. No overtaking ever
    /// reorders this.
    pub vehicles: VecDeque<Vin>,
    pub progress: BTreeMap<Vin, VehicleProgress>,
    pub latest_scheduled_exit: Option<ScheduledExit>,
}

impl RoadLane {
    pub fn new(
        id: RoadLaneId,
        trajectory: Trajectory,
        width: Distance,
        speed_limit: Speed,
        entrance_end: f64,
        lcregion_end: f64,
        upstream_is_spawner: bool,
        downstream_is_remover: bool,
    ) -> RoadLane {
        RoadLane {
            id,
            trajectory,
            width,
            speed_limit,
            entrance_end,
            lcregion_end,
            upstream_is_spawner,
            downstream_is_remover,
            vehicles: VecDeque::new(),
            progress: BTreeMap::new(),
            latest_scheduled_exit: None,
        }
    }

    /// Structural copy with no vehicles -- what the reservation engine clones to run its mock
    /// simulation against, and what a fresh `Simulator` constructs from a `RoadSpec`.
    pub fn clone_empty(&self) -> RoadLane {
        RoadLane {
            id: self.id,
            trajectory: self.trajectory.clone(),
            width: self.width,
            speed_limit: self.speed_limit,
            entrance_end: self.entrance_end,
            lcregion_end: self.lcregion_end,
            upstream_is_spawner: self.upstream_is_spawner,
            downstream_is_remover: self.downstream_is_remover,
            vehicles: VecDeque::new(),
            progress: BTreeMap::new(),
            latest_scheduled_exit: self.latest_scheduled_exit,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    pub fn leader(&self) -> Option<Vin> {
        self.vehicles.front().copied()
    }

    /// Free length available for a spawner: the gap immediately behind the rearmost vehicle in
    /// the entrance region, capped by the entrance region's own length.
    pub fn room_to_enter(&self) -> Distance {
        let entrance_len = self.trajectory.length() * self.entrance_end;
        let rearmost_in_entrance = self
            .vehicles
            .iter()
            .rev()
            .filter_map(|vin| self.progress.get(vin))
            .filter(|p| p.leading_progress() <= self.entrance_end)
            .map(|p| p.rear.or(p.center).or(p.front).unwrap_or(0.0))
            .next();
        match rearmost_in_entrance {
            Some(p) => (self.trajectory.length() * p).min(entrance_len),
            None => entrance_len,
        }
    }

    /// Walks the queue from the head, skipping vehicles already past the approach region,
    /// looking for the first one lacking intersection permission. The first such vehicle's
    /// desired outbound coord must be in `targets`, or this returns `None` entirely (not just
    /// skip it) -- mutually exclusive with `first_without_permission_sequenced` at the type
    /// level.
    pub fn first_without_permission_targeted(
        &self,
        vehicles: &BTreeMap<Vin, Vehicle>,
        desired_outbound: impl Fn(Vin) -> Option<geom::Coord>,
        targets: &[geom::Coord],
    ) -> Option<usize> {
        let idx = self.first_candidate_index(vehicles)?;
        let vin = self.vehicles[idx];
        let coord = desired_outbound(vin)?;
        if targets.contains(&coord) {
            Some(idx)
        } else {
            None
        }
    }

    /// Same search, but extends the returned range across consecutive followers that share the
    /// first vehicle's desired outbound coord -- a sequence of same-movement vehicles the
    /// reservation engine can test as a batch.
    pub fn first_without_permission_sequenced(
        &self,
        vehicles: &BTreeMap<Vin, Vehicle>,
        desired_outbound: impl Fn(Vin) -> Option<geom::Coord>,
    ) -> Option<(usize, usize)> {
        let first = self.first_candidate_index(vehicles)?;
        let first_vin = self.vehicles[first];
        let target = desired_outbound(first_vin)?;
        let mut end = first + 1;
        while end < self.vehicles.len() {
            let vin = self.vehicles[end];
            if vehicles.get(&vin).map(|v| v.permission_to_enter_intersection).unwrap_or(true) {
                break;
            }
            match desired_outbound(vin) {
                Some(c) if c == target => end += 1,
                _ => break,
            }
        }
        Some((first, end))
    }

    fn first_candidate_index(&self, vehicles: &BTreeMap<Vin, Vehicle>) -> Option<usize> {
        for (idx, vin) in self.vehicles.iter().enumerate() {
            let progress = self.progress.get(vin)?;
            if progress.leading_progress() < self.lcregion_end {
                // Still approaching; hasn't reached the part of the lane that requests turns.
                continue;
            }
            let vehicle = vehicles.get(vin)?;
            if !vehicle.permission_to_enter_intersection {
                return Some(idx);
            }
        }
        None
    }

    /// Earliest timestep and velocity at which `vehicles[idx]`'s front can reach progress 1
    /// under uncontested acceleration, bounded below by this lane's (or `avoid_exit`'s) latest
    /// scheduled exit so the new exit can't collide with the tail of the previous one.
    ///
    /// With no prior scheduled exit to bound against, assume uncontested acceleration straight
    /// to the effective speed limit.
    pub fn soonest_exit(
        &self,
        idx: usize,
        now: Timestep,
        dt_seconds: f64,
        vehicles: &BTreeMap<Vin, Vehicle>,
        avoid_exit: Option<ScheduledExit>,
    ) -> ScheduledExit {
        let vin = self.vehicles[idx];
        let vehicle = &vehicles[&vin];
        let progress = self.progress[&vin].front.unwrap_or(0.0);
        let remaining = self.trajectory.length() * (1.0 - progress);

        let (mut steps, mut exit_velocity) =
            uncontested_exit(remaining, vehicle.velocity, vehicle.characteristics.max_acceleration, self.speed_limit, dt_seconds);

        let bound = avoid_exit.or(self.latest_scheduled_exit);
        if let Some(bound) = bound {
            let earliest = bound.timestep.plus_steps(1);
            if now.plus_steps(steps) < earliest {
                steps = earliest.offset_from(now);
                exit_velocity = self.speed_limit;
            }
        }

        ScheduledExit {
            vehicle: vin,
            section: VehicleSection::Front,
            timestep: now.plus_steps(steps),
            velocity: exit_velocity,
        }
    }

    /// Only accepts REAR exits, and only overwrites the stored one if the new exit is no
    /// earlier, so a later arrival can never be told it's safe to exit before an earlier
    /// vehicle's tail has actually cleared.
    pub fn register_latest_scheduled_exit(&mut self, rear_exit: ScheduledExit) {
        debug_assert_eq!(rear_exit.section, VehicleSection::Rear);
        let overwrite = match self.latest_scheduled_exit {
            Some(existing) => rear_exit.timestep >= existing.timestep,
            None => true,
        };
        if overwrite {
            self.latest_scheduled_exit = Some(rear_exit);
        }
    }
}

/// Steps forward (in whole simulation ticks) a vehicle accelerating at `max_accel` up to
/// `speed_limit`, covering `remaining` distance. Returns `(steps, exit_velocity)`.
fn uncontested_exit(remaining: Distance, v0: Speed, max_accel: geom::Acceleration, speed_limit: Speed, dt_seconds: f64) -> (u64, Speed) {
    let mut v = v0.inner_meters_per_second();
    let mut d = 0.0;
    let target = remaining.inner_meters().max(0.0);
    let a = max_accel.inner_meters_per_second_squared();
    let vmax = speed_limit.inner_meters_per_second();
    let mut steps = 0u64;
    while d < target && steps < 100_000 {
        v = (v + a * dt_seconds).min(vmax).max(0.0);
        d += v * dt_seconds;
        steps += 1;
    }
    (steps.max(1), Speed::meters_per_second(v))
}
