use std::collections::BTreeMap;

use geom::{Coord, Speed, Timestep};
use serde::{Deserialize, Serialize};

use crate::ids::IntersectionLaneId;
use crate::vehicle::{Vin, VehicleSection};

/// A promise that `section` of `vehicle` will cross the owning lane's downstream seam at
/// `timestep`, at `velocity`. FRONT exits from a road lane are what managers test against;
/// REAR exits are cached on the exiting lane so a later arrival's `soonest_exit` can't schedule
/// an overtake.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduledExit {
    pub vehicle: Vin,
    pub section: VehicleSection,
    pub timestep: Timestep,
    pub velocity: Speed,
}

/// Per-tile occupancy probability the reservation claims, keyed by absolute timestep then by
/// flattened tile index within that timestep's layer.
pub type TileFootprint = BTreeMap<Timestep, BTreeMap<usize, f64>>;

/// A single vehicle's commitment to occupy a sequence of tiles while crossing one intersection
/// lane. `dependent_on`/`dependency` thread a sequenced batch of same-movement vehicles into a
/// chain using VINs rather than references -- the tiling never
/// dereferences these fields, only the manager's bookkeeping does.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Reservation {
    pub vehicle: Vin,
    pub entry_coord: Coord,
    pub tiles: TileFootprint,
    pub lane: IntersectionLaneId,
    pub dependent_on: Vec<Vin>,
    pub dependency: Option<Vin>,
    pub entry_exit: ScheduledExit,
}

impl Reservation {
    pub fn new(vehicle: Vin, entry_coord: Coord, lane: IntersectionLaneId, entry_exit: ScheduledExit, dependent_on: Vec<Vin>) -> Reservation {
        Reservation {
            vehicle,
            entry_coord,
            tiles: BTreeMap::new(),
            lane,
            dependent_on,
            dependency: None,
            entry_exit,
        }
    }

    pub fn add_footprint(&mut self, t: Timestep, tiles: BTreeMap<usize, f64>) {
        self.tiles.entry(t).or_default().extend(tiles);
    }

    pub fn merge_footprint(&mut self, t: Timestep, tiles: BTreeMap<usize, f64>) {
        self.add_footprint(t, tiles);
    }
}
