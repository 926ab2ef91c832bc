use super::{commit_all, ManagerContext, Policy};
use crate::error::Result;
use crate::ids::{IntersectionLaneId, RoadLaneId};
use crate::network::Network;
use crate::reservation::Reservation;

/// A fixed-phase traffic light. A lane is even considered this tick if at least one of its
/// connectors currently has the right-of-way; the reservation engine still has final say over
/// whether a specific vehicle's movement actually fits.
#[derive(Debug, Default)]
pub struct Signals;

impl Policy for Signals {
    fn process_requests(&mut self, network: &Network, ctx: &mut ManagerContext) -> Result<Vec<Reservation>> {
        let greenlit: Vec<IntersectionLaneId> = ctx.tiling.signal_cycle.as_ref().map(|c| c.greenlit().to_vec()).unwrap_or_default();
        let lanes: Vec<RoadLaneId> = ctx.incoming_road_lanes.to_vec();
        let mut committed = Vec::new();
        for lane in lanes {
            let has_green = ctx
                .connectors
                .get(&lane)
                .map(|cs| cs.iter().any(|c| greenlit.contains(&c.intersection_lane)))
                .unwrap_or(false);
            if !has_green {
                continue;
            }
            let accepted = ctx.check(network, lane, true, true)?;
            committed.extend(commit_all(ctx, accepted));
        }
        Ok(committed)
    }
}
