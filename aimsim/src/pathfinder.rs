//! Routing: which road lane should a vehicle move onto next, given where it is and where it's
//! headed. The reservation engine and the managers only ever ask "what's next", never "what's
//! the whole route" -- so a pathfinder implementation is free to cache, precompute, or recompute
//! from scratch on every call.

use std::collections::{BTreeMap, VecDeque};

use crate::ids::{RemoverId, RoadLaneId};
use crate::network::Network;
use crate::vehicle::Vehicle;

pub trait Pathfinder: std::fmt::Debug {
    /// The next road lane `vehicle` (currently on `current`) should move onto on its way to the
    /// remover named by `vehicle.destination_id()`. `None` means `current` already feeds that
    /// remover directly.
    fn next_road_lane(&self, vehicle: &Vehicle, current: RoadLaneId, network: &Network) -> Option<RoadLaneId>;
}

/// Breadth-first search over the static lane graph, recomputed per query. Road networks in this
/// simulator are small enough (single intersections, a handful of approaches) that caching a
/// shortest-path tree buys nothing; what matters is correctness against a graph that can grow a
/// new lane mid-run if a future scenario ever needs it.
#[derive(Clone, Debug)]
pub struct GreedyPathfinder {
    /// `road_lane -> the road lanes reachable from it by crossing exactly one intersection lane`.
    adjacency: BTreeMap<RoadLaneId, Vec<RoadLaneId>>,
    /// `remover -> the single road lane that feeds it`.
    feeders: BTreeMap<RemoverId, RoadLaneId>,
}

impl GreedyPathfinder {
    pub fn new(adjacency: BTreeMap<RoadLaneId, Vec<RoadLaneId>>, feeders: BTreeMap<RemoverId, RoadLaneId>) -> GreedyPathfinder {
        GreedyPathfinder { adjacency, feeders }
    }

    fn target_for(&self, destination_id: u64) -> Option<RoadLaneId> {
        self.feeders.get(&RemoverId(destination_id)).copied()
    }
}

impl Pathfinder for GreedyPathfinder {
    fn next_road_lane(&self, vehicle: &Vehicle, current: RoadLaneId, _network: &Network) -> Option<RoadLaneId> {
        let target = self.target_for(vehicle.destination_id())?;
        if target == current {
            return None;
        }

        let mut visited = BTreeMap::new();
        let mut queue = VecDeque::new();
        visited.insert(current, None);
        queue.push_back(current);

        while let Some(lane) = queue.pop_front() {
            if lane == target {
                break;
            }
            for &next in self.adjacency.get(&lane).into_iter().flatten() {
                if !visited.contains_key(&next) {
                    visited.insert(next, Some(lane));
                    queue.push_back(next);
                }
            }
        }

        if !visited.contains_key(&target) {
            return None;
        }

        // Walk the parent chain back from `target` until we find the step taken directly out of
        // `current` -- that's the hop this vehicle should take this time.
        let mut step = target;
        loop {
            match visited.get(&step).copied().flatten() {
                Some(parent) if parent == current => return Some(step),
                Some(parent) => step = parent,
                None => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::{Vehicle, VehicleCharacteristics, Vin};
    use geom::{Acceleration, Angle, Coord, Distance};

    fn vehicle(destination_id: u64) -> Vehicle {
        Vehicle::new(
            Vin(1),
            Coord::new(0.0, 0.0),
            Angle::radians(0.0),
            VehicleCharacteristics {
                destination_id,
                max_acceleration: Acceleration::meters_per_second_squared(3.0),
                max_braking: Acceleration::meters_per_second_squared(-3.0),
                length: Distance::meters(4.5),
                width: Distance::meters(2.0),
                throttle_score: 1.0,
                tracking_score: 1.0,
                vot: 1.0,
            },
        )
    }

    #[test]
    fn finds_next_hop_over_two_intersections() {
        let a = RoadLaneId(0);
        let b = RoadLaneId(1);
        let c = RoadLaneId(2);
        let mut adjacency = BTreeMap::new();
        adjacency.insert(a, vec![b]);
        adjacency.insert(b, vec![c]);
        let mut feeders = BTreeMap::new();
        feeders.insert(RemoverId(9), c);
        let pf = GreedyPathfinder::new(adjacency, feeders);
        let network = Network::new();

        let v = vehicle(9);
        assert_eq!(pf.next_road_lane(&v, a, &network), Some(b));
        assert_eq!(pf.next_road_lane(&v, b, &network), Some(c));
        assert_eq!(pf.next_road_lane(&v, c, &network), None);
    }

    #[test]
    fn unreachable_destination_returns_none() {
        let a = RoadLaneId(0);
        let unreachable = RoadLaneId(5);
        let mut feeders = BTreeMap::new();
        feeders.insert(RemoverId(1), unreachable);
        let pf = GreedyPathfinder::new(BTreeMap::new(), feeders);
        let network = Network::new();
        assert_eq!(pf.next_road_lane(&vehicle(1), a, &network), None);
    }
}
