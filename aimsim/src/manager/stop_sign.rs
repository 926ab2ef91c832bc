use super::{commit_all, ManagerContext, Policy};
use crate::error::Result;
use crate::ids::RoadLaneId;
use crate::network::Network;
use crate::reservation::Reservation;

/// An all-way stop: every lane is tested individually (`sequence == false`), never as a batch of
/// consecutive same-movement vehicles, since a stop-sign approach has to yield the crossing one
/// car at a time rather than platoon through. Otherwise identical to FCFS -- the reservation
/// engine's own tile arbitration already encodes "whoever claims the conflicting tiles first
/// wins", which is exactly an all-way stop's right-of-way rule.
#[derive(Debug, Default)]
pub struct StopSign;

impl Policy for StopSign {
    fn process_requests(&mut self, network: &Network, ctx: &mut ManagerContext) -> Result<Vec<Reservation>> {
        let lanes: Vec<RoadLaneId> = ctx.incoming_road_lanes.to_vec();
        let mut committed = Vec::new();
        for lane in lanes {
            let accepted = ctx.check(network, lane, true, false)?;
            committed.extend(commit_all(ctx, accepted));
        }
        Ok(committed)
    }
}
