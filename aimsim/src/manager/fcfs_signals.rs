use super::{commit_all, ManagerContext, Policy};
use crate::error::Result;
use crate::ids::{IntersectionLaneId, RoadLaneId};
use crate::network::Network;
use crate::reservation::Reservation;

/// A hybrid approach: a fixed signal phase sets default right-of-way the way [`super::signals`]
/// does, but every vehicle still files a real reservation through the tiling rather than simply
/// being waved through on green. In a mixed fleet this is meant to gate only human-driven
/// vehicles on the signal while automated ones reserve tiles directly; this implementation has
/// no vehicle-class distinction to key that split on, so every vehicle is treated as
/// reservation-capable and the signal acts purely as an additional admission gate on top of
/// FCFS -- see the open question recorded in the design notes.
#[derive(Debug, Default)]
pub struct FcfsSignals;

impl Policy for FcfsSignals {
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
