use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::vehicle::Vin;

/// One spatial cell at one future timestep. Two disjoint-by-key maps: a tentative mark is a
/// speculation in progress (the reservation engine's private workspace), a confirmed mark is
/// part of the manager's ledger. A vehicle holds at most one entry in `confirmed` -- the square
/// grid (the only concretion this crate ships) keeps that entry's probability pinned at 1.0, but
/// the type itself stays generic over `(0, 1]` so a probabilistic grid could reuse it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    confirmed: BTreeMap<Vin, f64>,
    tentative: BTreeMap<Vin, f64>,
}

impl Tile {
    pub fn new() -> Tile {
        Tile::default()
    }

    pub fn is_empty(&self) -> bool {
        self.confirmed.is_empty() && self.tentative.is_empty()
    }

    fn confirmed_sum_excluding(&self, vin: Vin) -> f64 {
        self.confirmed
            .iter()
            .filter(|(v, _)| **v != vin)
            .map(|(_, p)| p)
            .sum()
    }

    /// True if this tile has no confirmed reservation (other than `vin`'s own), or if adding
    /// `p` to the confirmed sum keeps it under `1 - rejection_threshold`.
    pub fn accepts(&self, vin: Vin, p: f64, rejection_threshold: f64) -> bool {
        if self.confirmed.contains_key(&vin) {
            return true;
        }
        self.confirmed_sum_excluding(vin) + p <= 1.0 - rejection_threshold + 1e-9
    }

    /// Adds a tentative mark if `accepts`; otherwise leaves the tile untouched and reports
    /// failure.
    pub fn mark(&mut self, vin: Vin, p: f64, rejection_threshold: f64) -> bool {
        if !self.accepts(vin, p, rejection_threshold) {
            return false;
        }
        self.tentative.insert(vin, p);
        true
    }

    /// Promotes a tentative mark to confirmed. Requires either `accepts` to hold or `force` to
    /// be set; `force` is reserved for the stochastic post-hoc correction hook in
    /// [`super::Tiling::advance_time`] and is never combined with a `mark` call on the same
    /// tile in the same pass.
    pub fn confirm(&mut self, vin: Vin, p: f64, force: bool, rejection_threshold: f64) -> bool {
        if !force && !self.accepts(vin, p, rejection_threshold) {
            return false;
        }
        self.tentative.remove(&vin);
        self.confirmed.insert(vin, p);
        true
    }

    pub fn remove_mark(&mut self, vin: Vin) {
        self.tentative.remove(&vin);
    }

    pub fn remove_confirmed(&mut self, vin: Vin) {
        self.confirmed.remove(&vin);
    }

    pub fn remove_all_marks(&mut self) {
        self.tentative.clear();
    }

    pub fn confirmed_sum(&self) -> f64 {
        self.confirmed.values().sum()
    }

    pub fn has_confirmed(&self, vin: Vin) -> bool {
        self.confirmed.contains_key(&vin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_single_occupant() {
        let mut t = Tile::new();
        assert!(t.mark(Vin(1), 1.0, 0.0));
        assert!(t.confirm(Vin(1), 1.0, false, 0.0));
        assert!(t.accepts(Vin(1), 1.0, 0.0));
        assert!(!t.accepts(Vin(2), 1.0, 0.0));
        assert!(!t.mark(Vin(2), 1.0, 0.0));
    }

    #[test]
    fn force_bypasses_acceptance() {
        let mut t = Tile::new();
        t.confirm(Vin(1), 1.0, true, 0.0);
        assert!(t.confirm(Vin(2), 1.0, true, 0.0));
        assert_eq!(t.confirmed_sum(), 2.0);
    }

    #[test]
    fn remove_mark_is_a_no_op_on_absent_vin() {
        let mut t = Tile::new();
        t.remove_mark(Vin(7));
        assert!(t.is_empty());
    }
}
