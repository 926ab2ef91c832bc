//! Ties one intersection's [`Tiling`] and [`Policy`] to its lanes. The tiling has no handle on
//! road lanes, so registering a committed reservation's exit bound on the upstream lane is this
//! module's job, not the tiling's.

use std::collections::BTreeMap;

use geom::{Coord, Distance, Timestep};
use rand_xorshift::XorShiftRng;

use crate::config::Config;
use crate::error::Result;
use crate::ids::{IntersectionId, RoadLaneId};
use crate::manager::{Connector, ManagerContext, Policy};
use crate::network::Network;
use crate::pathfinder::Pathfinder;
use crate::reservation::Reservation;
use crate::tiling::Tiling;

pub struct IntersectionManager {
    pub id: IntersectionId,
    pub tiling: Tiling,
    pub policy: Box<dyn Policy>,
    pub incoming_road_lanes: Vec<RoadLaneId>,
    pub connectors: BTreeMap<RoadLaneId, Vec<Connector>>,
}

impl IntersectionManager {
    pub fn new(
        id: IntersectionId,
        grid_min: Coord,
        grid_max: Coord,
        tile_width: Distance,
        now: Timestep,
        rejection_threshold: f64,
        policy: Box<dyn Policy>,
        incoming_road_lanes: Vec<RoadLaneId>,
        connectors: BTreeMap<RoadLaneId, Vec<Connector>>,
    ) -> IntersectionManager {
        IntersectionManager {
            id,
            tiling: Tiling::new(grid_min, grid_max, tile_width, now, rejection_threshold),
            policy,
            incoming_road_lanes,
            connectors,
        }
    }

    /// Runs the configured policy once, commits whatever it accepted, grants the corresponding
    /// vehicles permission and a reservation, and registers the incoming lane's new exit bound so
    /// the next vehicle in line can't be scheduled to overtake it.
    pub fn step(&mut self, network: &mut Network, pathfinder: &dyn Pathfinder, rng: &mut XorShiftRng, now: Timestep, config: &Config) -> Result<Vec<Reservation>> {
        let committed = {
            let mut ctx = ManagerContext {
                id: self.id,
                tiling: &mut self.tiling,
                incoming_road_lanes: &self.incoming_road_lanes,
                connectors: &self.connectors,
                pathfinder,
                now,
                config,
                rng,
            };
            self.policy.process_requests(network, &mut ctx)?
        };

        for reservation in &committed {
            if let Some(vehicle) = network.vehicles.get_mut(&reservation.vehicle) {
                vehicle.grant_permission_to_enter_intersection();
                vehicle.grant_reservation();
            }
            if let Some(il) = network.intersection_lanes.get(&reservation.lane) {
                let upstream = il.upstream_road_lane;
                if let Some(lane) = network.road_lanes.get_mut(&upstream) {
                    lane.register_latest_scheduled_exit(reservation.entry_exit);
                }
            }
        }

        Ok(committed)
    }

    /// Advances the tiling's own clock. Called once per simulation tick regardless of whether
    /// the policy found anything to do this tick.
    pub fn advance_time(&mut self) {
        self.tiling.advance_time();
    }
}
