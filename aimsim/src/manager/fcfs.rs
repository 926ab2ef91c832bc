use super::{commit_all, ManagerContext, Policy};
use crate::error::Result;
use crate::ids::RoadLaneId;
use crate::network::Network;
use crate::reservation::Reservation;

/// First-come-first-served: every incoming lane gets tested, in lane-declaration order, against
/// whatever the tiling currently holds. Earlier lanes in the order see a less-occupied tiling
/// than later ones, which is the entire fairness mechanism -- there's no separate arrival-time
/// bookkeeping.
#[derive(Debug, Default)]
pub struct Fcfs;

impl Policy for Fcfs {
    fn process_requests(&mut self, network: &Network, ctx: &mut ManagerContext) -> Result<Vec<Reservation>> {
        let lanes: Vec<RoadLaneId> = ctx.incoming_road_lanes.to_vec();
        let mut committed = Vec::new();
        for lane in lanes {
            // Drain this lane completely -- commit its head vehicle, re-poll, repeat -- before
            // moving to the next one, so an unflagged lane never blocks behind a busy one.
            loop {
                let accepted = ctx.check(network, lane, false, false)?;
                match accepted.into_iter().next() {
                    Some(first) => committed.extend(commit_all(ctx, vec![first])),
                    None => break,
                }
            }
        }
        Ok(committed)
    }
}
