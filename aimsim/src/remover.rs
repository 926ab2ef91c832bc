//! Vehicle removal. A remover owns one road lane's downstream end; whatever falls off the end of
//! that lane is gone from the simulation, full stop.

use crate::ids::{RemoverId, RoadLaneId};
use crate::lane::VehicleTransfer;
use crate::network::Network;
use crate::vehicle::Vin;

#[derive(Clone, Debug)]
pub struct Remover {
    pub id: RemoverId,
    pub road_lane: RoadLaneId,
}

impl Remover {
    /// Drops every vehicle named in `transfers` from the simulation entirely, returning their
    /// VINs for the caller's log. Expects `transfers` to already be filtered to ones that fell
    /// off `self.road_lane`'s far end -- this never checks the lane itself.
    pub fn collect(&self, network: &mut Network, transfers: &[VehicleTransfer]) -> Vec<Vin> {
        let mut departed = Vec::with_capacity(transfers.len());
        for transfer in transfers {
            if network.vehicles.remove(&transfer.vehicle).is_some() {
                departed.push(transfer.vehicle);
            }
        }
        departed
    }
}
