//! The time-layered occupancy grid an intersection manager checks speculative requests
//! against, plus the ledger of confirmed/queued/active reservations it backs.

mod grid;
mod tile;

pub use grid::Grid;
pub use tile::Tile;

use std::collections::{BTreeMap, VecDeque};

use geom::{Angle, Coord, Distance, Timestep};
use serde::{Deserialize, Serialize};

use crate::ids::IntersectionLaneId;
use crate::reservation::{Reservation, TileFootprint};
use crate::vehicle::Vin;

/// One append/pop-at-the-tail-or-head slice of the grid, flattened row-major, per the arena
/// note: a tile is addressed as `(layer_offset, flat_index)`, never by pointer.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct Layer {
    tiles: Vec<Tile>,
}

impl Layer {
    fn new(num_tiles: usize) -> Layer {
        Layer {
            tiles: vec![Tile::new(); num_tiles],
        }
    }
}

/// A two-phase signal cycle schedule: `(greenlit lanes, duration in steps)` pairs, rotated in
/// order. Owned by the tiling so `advance_time` is the single place cycle bookkeeping
/// happens, even though only the Signals policy reads it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignalCycle {
    phases: Vec<(Vec<IntersectionLaneId>, u32)>,
    current_phase: usize,
    time_left_in_phase: u32,
}

impl SignalCycle {
    pub fn new(phases: Vec<(Vec<IntersectionLaneId>, u32)>) -> SignalCycle {
        let time_left_in_phase = phases.first().map(|(_, d)| *d).unwrap_or(0);
        SignalCycle {
            phases,
            current_phase: 0,
            time_left_in_phase,
        }
    }

    fn advance(&mut self) {
        if self.phases.is_empty() {
            return;
        }
        if self.time_left_in_phase == 0 {
            self.current_phase = (self.current_phase + 1) % self.phases.len();
            self.time_left_in_phase = self.phases[self.current_phase].1;
        }
        self.time_left_in_phase = self.time_left_in_phase.saturating_sub(1);
    }

    pub fn greenlit(&self) -> &[IntersectionLaneId] {
        self.phases
            .get(self.current_phase)
            .map(|(lanes, _)| lanes.as_slice())
            .unwrap_or(&[])
    }

    pub fn time_left_in_cycle(&self) -> u32 {
        self.time_left_in_phase
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tiling {
    grid: Grid,
    layers: VecDeque<Layer>,
    /// The timestep that `layers[0]` represents. Always `now + 1`; never past or present.
    base_timestep: Timestep,
    rejection_threshold: f64,
    pub signal_cycle: Option<SignalCycle>,
    active_reservations: BTreeMap<Vin, Reservation>,
    queued_reservations: BTreeMap<Vin, Reservation>,
}

impl Tiling {
    pub fn new(min: Coord, max: Coord, tile_width: Distance, now: Timestep, rejection_threshold: f64) -> Tiling {
        Tiling {
            grid: Grid::new(min, max, tile_width),
            layers: VecDeque::new(),
            base_timestep: now.succ(),
            rejection_threshold,
            signal_cycle: None,
            active_reservations: BTreeMap::new(),
            queued_reservations: BTreeMap::new(),
        }
    }

    pub fn with_signal_cycle(mut self, cycle: SignalCycle) -> Tiling {
        self.signal_cycle = Some(cycle);
        self
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Discards the head layer (the timestep that just became "now"), rotates the signal cycle
    /// if one is configured, and otherwise does pure timing bookkeeping -- it never rejects or
    /// mutates a reservation. The stochastic-correction hook is intentionally
    /// absent: the square grid concretion has nothing to reconcile.
    pub fn advance_time(&mut self) {
        if !self.layers.is_empty() {
            self.layers.pop_front();
        }
        self.base_timestep = self.base_timestep.succ();
        if let Some(cycle) = &mut self.signal_cycle {
            cycle.advance();
        }
    }

    fn layer_index_for(&self, t: Timestep) -> Option<usize> {
        if t < self.base_timestep {
            return None;
        }
        Some(t.offset_from(self.base_timestep) as usize)
    }

    fn ensure_layer(&mut self, idx: usize) {
        while self.layers.len() <= idx {
            self.layers.push_back(Layer::new(self.grid.num_tiles()));
        }
    }

    /// Returns the same tile-object identity (by (layer, index)) regardless of whether
    /// `check_request` had previously auto-created layers past `now + 1` -- `ensure_layer` only
    /// ever appends, never reinitializes an existing layer.
    pub fn active_reservations(&self) -> &BTreeMap<Vin, Reservation> {
        &self.active_reservations
    }

    pub fn queued_reservations(&self) -> &BTreeMap<Vin, Reservation> {
        &self.queued_reservations
    }

    /// Computes the tile footprint of a vehicle's rectangular outline at proportional progress
    /// `center`/`heading` (already evaluated by the caller from its lane's trajectory) at future
    /// timestep `t`. Returns `None` if any tile in the footprint rejects (and, in that case,
    /// leaves the tiling untouched -- no partial marks survive a rejected call). `force` bypasses
    /// the acceptance check and is never combined with `mark`.
    pub fn position_to_tiles(
        &mut self,
        t: Timestep,
        vin: Vin,
        center: Coord,
        heading: Angle,
        length: Distance,
        width: Distance,
        inflation: f64,
        mark: bool,
        force: bool,
    ) -> Option<BTreeMap<usize, f64>> {
        debug_assert!(!(mark && force), "mark and force are mutually exclusive");
        let li = self.layer_index_for(t)?;
        self.ensure_layer(li);
        let coords = self.grid.rasterize_rectangle(center, heading, length, width, inflation);
        let idxs: Vec<usize> = coords.iter().map(|(x, y)| self.grid.tile_index(*x, *y)).collect();

        if !force {
            for &idx in &idxs {
                if !self.layers[li].tiles[idx].accepts(vin, 1.0, self.rejection_threshold) {
                    return None;
                }
            }
        }

        let mut footprint = BTreeMap::new();
        for &idx in &idxs {
            if mark {
                self.layers[li].tiles[idx].mark(vin, 1.0, self.rejection_threshold);
            }
            footprint.insert(idx, 1.0);
        }
        Some(footprint)
    }

    /// The Dresner-Stone entry/exit buffer: checks (and optionally marks) tiles at timesteps and
    /// positions outside the vehicle's core footprint, enforcing spacing at the intersection
    /// boundary. `samples` is the caller-computed sequence of `(timestep, center, heading)`
    /// triples for however many buffer steps are being requested; checking is all-or-nothing
    /// across the whole sample set.
    pub fn io_tile_buffer(
        &mut self,
        vin: Vin,
        samples: &[(Timestep, Coord, Angle)],
        length: Distance,
        width: Distance,
        inflation: f64,
        mark: bool,
    ) -> Option<TileFootprint> {
        let mut per_t_idxs: Vec<(Timestep, Vec<usize>)> = Vec::with_capacity(samples.len());
        for (t, center, heading) in samples {
            let li = match self.layer_index_for(*t) {
                Some(li) => li,
                None => return None,
            };
            self.ensure_layer(li);
            let coords = self.grid.rasterize_rectangle(*center, *heading, length, width, inflation);
            let idxs: Vec<usize> = coords.iter().map(|(x, y)| self.grid.tile_index(*x, *y)).collect();
            for &idx in &idxs {
                if !self.layers[li].tiles[idx].accepts(vin, 1.0, self.rejection_threshold) {
                    return None;
                }
            }
            per_t_idxs.push((*t, idxs));
        }

        let mut result = TileFootprint::new();
        for (t, idxs) in per_t_idxs {
            let li = self.layer_index_for(t).unwrap();
            let mut m = BTreeMap::new();
            for idx in idxs {
                if mark {
                    self.layers[li].tiles[idx].mark(vin, 1.0, self.rejection_threshold);
                }
                m.insert(idx, 1.0);
            }
            result.insert(t, m);
        }
        Some(result)
    }

    /// Confirms every tentative mark this reservation left behind and moves it into
    /// `queued_reservations`. Registering permission on the upstream road lane is the caller's
    /// job (see `IntersectionManager::commit`) -- the tiling has no handle on road lanes.
    pub fn commit(&mut self, reservation: Reservation) {
        for (t, tiles) in &reservation.tiles {
            if let Some(li) = self.layer_index_for(*t) {
                if li < self.layers.len() {
                    for (&idx, &p) in tiles {
                        self.layers[li].tiles[idx].confirm(reservation.vehicle, p, false, self.rejection_threshold);
                    }
                }
            }
        }
        self.queued_reservations.insert(reservation.vehicle, reservation);
    }

    /// Removes every tentative mark this reservation holds. A no-op for tiles that already
    /// expired off the front of the layer queue.
    pub fn rollback(&mut self, reservation: &Reservation) {
        for (t, tiles) in &reservation.tiles {
            if let Some(li) = self.layer_index_for(*t) {
                if li < self.layers.len() {
                    for &idx in tiles.keys() {
                        self.layers[li].tiles[idx].remove_mark(reservation.vehicle);
                    }
                }
            }
        }
    }

    /// Moves a queued reservation to active once the vehicle's front crosses the entry seam.
    pub fn activate(&mut self, vin: Vin) -> Option<IntersectionLaneId> {
        let reservation = self.queued_reservations.remove(&vin)?;
        let lane = reservation.lane;
        self.active_reservations.insert(vin, reservation);
        Some(lane)
    }

    /// Drops the active reservation once the vehicle's rear crosses the exit seam, freeing its
    /// confirmed tiles isn't necessary -- they expire naturally as layers are popped -- but the
    /// bookkeeping entry itself must go so `nobody_headed_towards`-style queries stay accurate.
    pub fn finalize(&mut self, vin: Vin) {
        self.active_reservations.remove(&vin);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geom::Distance;

    fn tiling() -> Tiling {
        Tiling::new(Coord::new(0.0, 0.0), Coord::new(10.0, 10.0), Distance::meters(1.0), Timestep::new(0), 0.0)
    }

    #[test]
    fn rejects_overlapping_confirmed_tile() {
        let mut t = tiling();
        let v1 = Vin(1);
        let v2 = Vin(2);
        let footprint = t
            .position_to_tiles(
                Timestep::new(6),
                v1,
                Coord::new(5.0, 5.0),
                Angle::radians(0.0),
                Distance::meters(1.0),
                Distance::meters(1.0),
                1.0,
                true,
                false,
            )
            .unwrap();
        let mut r = Reservation::new(
            v1,
            Coord::new(5.0, 5.0),
            IntersectionLaneId(0),
            crate::reservation::ScheduledExit {
                vehicle: v1,
                section: crate::vehicle::VehicleSection::Front,
                timestep: Timestep::new(6),
                velocity: geom::Speed::ZERO,
            },
            vec![],
        );
        r.add_footprint(Timestep::new(6), footprint);
        t.commit(r);

        let rejected = t.position_to_tiles(
            Timestep::new(6),
            v2,
            Coord::new(5.0, 5.0),
            Angle::radians(0.0),
            Distance::meters(1.0),
            Distance::meters(1.0),
            1.0,
            true,
            false,
        );
        assert!(rejected.is_none());
    }

    #[test]
    fn rollback_clears_every_tentative_mark() {
        let mut t = tiling();
        let v1 = Vin(1);
        let footprint = t
            .position_to_tiles(
                Timestep::new(3),
                v1,
                Coord::new(5.0, 5.0),
                Angle::radians(0.0),
                Distance::meters(1.0),
                Distance::meters(1.0),
                1.0,
                true,
                false,
            )
            .unwrap();
        let mut r = Reservation::new(
            v1,
            Coord::new(5.0, 5.0),
            IntersectionLaneId(0),
            crate::reservation::ScheduledExit {
                vehicle: v1,
                section: crate::vehicle::VehicleSection::Front,
                timestep: Timestep::new(3),
                velocity: geom::Speed::ZERO,
            },
            vec![],
        );
        r.add_footprint(Timestep::new(3), footprint);
        t.rollback(&r);

        // A second vehicle should be able to claim the exact same footprint: nothing of v1's
        // speculation survived the rollback.
        let v2 = Vin(2);
        let retried = t.position_to_tiles(
            Timestep::new(3),
            v2,
            Coord::new(5.0, 5.0),
            Angle::radians(0.0),
            Distance::meters(1.0),
            Distance::meters(1.0),
            1.0,
            true,
            false,
        );
        assert!(retried.is_some());
    }
}
