//! Intersection manager policies. A policy decides, once per tick, which pending requests get
//! tested against the tiling and which of the tiling's answers get committed and granted. All
//! the physics and tile bookkeeping lives in [`crate::engine`] and [`crate::tiling`]; a policy is
//! pure decision logic layered on top.

pub mod auction;
pub mod fcfs;
pub mod fcfs_signals;
pub mod signals;
pub mod stop_sign;

use std::collections::BTreeMap;

use rand_xorshift::XorShiftRng;

use geom::Timestep;

use crate::config::Config;
use crate::engine::{check_request, CheckRequestParams, Movement};
use crate::error::Result;
use crate::ids::{IntersectionId, IntersectionLaneId, RoadLaneId};
use crate::network::Network;
use crate::pathfinder::Pathfinder;
use crate::reservation::Reservation;
use crate::tiling::Tiling;
use crate::vehicle::Vin;

/// One inbound-to-outbound connector a manager may route a vehicle across.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Connector {
    pub intersection_lane: IntersectionLaneId,
    pub downstream_road_lane: RoadLaneId,
}

/// Read-only view handed to a policy each tick: its own identity, its tiling, the lanes it
/// manages, and how to resolve a vehicle's desired movement.
pub struct ManagerContext<'a> {
    pub id: IntersectionId,
    pub tiling: &'a mut Tiling,
    pub incoming_road_lanes: &'a [RoadLaneId],
    pub connectors: &'a BTreeMap<RoadLaneId, Vec<Connector>>,
    pub pathfinder: &'a dyn Pathfinder,
    pub now: Timestep,
    pub config: &'a Config,
    pub rng: &'a mut XorShiftRng,
}

impl<'a> ManagerContext<'a> {
    fn movement_for(
        connectors: &BTreeMap<RoadLaneId, Vec<Connector>>,
        pathfinder: &dyn Pathfinder,
        network: &Network,
        vin: Vin,
        incoming: RoadLaneId,
    ) -> Option<Movement> {
        let options = connectors.get(&incoming)?;
        let vehicle = network.vehicles.get(&vin)?;
        let next_hop = pathfinder.next_road_lane(vehicle, incoming, network)?;
        let chosen = options.iter().find(|c| c.downstream_road_lane == next_hop)?;
        Some(Movement {
            intersection_lane: chosen.intersection_lane,
            downstream_road_lane: chosen.downstream_road_lane,
        })
    }

    /// Runs the engine's mock loop for one incoming lane and, if `mark` is set, leaves the
    /// resulting tentative marks on the tiling for the caller to commit or roll back.
    pub fn check(&mut self, network: &Network, incoming: RoadLaneId, mark: bool, sequence: bool) -> Result<Vec<Reservation>> {
        let connectors = self.connectors;
        let pathfinder = self.pathfinder;
        let movement_for = move |network: &Network, vin: Vin, lane: RoadLaneId| ManagerContext::movement_for(connectors, pathfinder, network, vin, lane);
        check_request(
            network,
            self.tiling,
            CheckRequestParams {
                incoming,
                mark,
                sequence,
                now: self.now,
                config: self.config,
                movement_for: &movement_for,
            },
        )
    }
}

/// A manager policy decides, each tick, which pending requests to test and which accepted
/// reservations to commit. Returns every reservation it committed this tick, so the caller can
/// grant permission on the corresponding vehicles and extend the log.
pub trait Policy: std::fmt::Debug {
    fn process_requests(&mut self, network: &Network, ctx: &mut ManagerContext) -> Result<Vec<Reservation>>;
}

/// Commits every reservation in `accepted` and returns it unchanged -- the common tail end of
/// every policy's `process_requests`.
pub(crate) fn commit_all(ctx: &mut ManagerContext, accepted: Vec<Reservation>) -> Vec<Reservation> {
    for r in &accepted {
        ctx.tiling.commit(r.clone());
    }
    accepted
}
