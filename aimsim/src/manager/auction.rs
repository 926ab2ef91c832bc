use rand::Rng;

use super::{commit_all, ManagerContext, Policy};
use crate::error::Result;
use crate::ids::RoadLaneId;
use crate::network::Network;
use crate::reservation::Reservation;

/// Value-of-time auction: every lane's leading request is probed without marking the tiling,
/// ranked by the summed VOT of the vehicles it would admit, then re-checked and committed
/// highest bid first. A later, lower-VOT bidder can still win whatever tiles the earlier
/// winners didn't need -- this never blocks a lane outright, it only orders who gets first
/// claim on contested tiles. Runs only when the intersection is completely empty -- mid-crossing
/// traffic has no business being re-auctioned out from under itself.
#[derive(Debug, Default)]
pub struct Auction;

impl Policy for Auction {
    fn process_requests(&mut self, network: &Network, ctx: &mut ManagerContext) -> Result<Vec<Reservation>> {
        if !ctx.tiling.active_reservations().is_empty() || !ctx.tiling.queued_reservations().is_empty() {
            return Ok(Vec::new());
        }

        let lanes: Vec<RoadLaneId> = ctx.incoming_road_lanes.to_vec();

        let mut bids: Vec<(RoadLaneId, f64, u64)> = Vec::new();
        for lane in &lanes {
            let probe = ctx.check(network, *lane, false, true)?;
            if probe.is_empty() {
                continue;
            }
            let vot: f64 = probe.iter().map(|r| network.vehicles.get(&r.vehicle).map(|v| v.characteristics.vot).unwrap_or(0.0)).sum();
            // Tertiary tie-break: a draw from the manager's own seeded RNG, never ambient
            // randomness, so equal-VOT bids still resolve deterministically given a seed.
            bids.push((*lane, vot, ctx.rng.gen::<u64>()));
        }
        bids.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(b.2.cmp(&a.2)));

        let mut committed = Vec::new();
        for (lane, _, _) in bids {
            let accepted = ctx.check(network, lane, true, true)?;
            committed.extend(commit_all(ctx, accepted));
        }
        Ok(committed)
    }
}
