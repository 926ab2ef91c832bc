//! Scenario schemas and the loader that turns them into a runnable [`crate::network::Network`]
//! plus one [`IntersectionManager`] per intersection. An intersection names its incoming and
//! outgoing roads explicitly; every lane of an incoming road is paired, via the connector Bezier,
//! with every lane of every outgoing road whose approach heading isn't parallel to its own.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use geom::{Coord, Distance, Speed, Timestep, Trajectory};

use crate::config::Config;
use crate::error::{AimError, Result};
use crate::ids::{IntersectionId, IntersectionLaneId, RemoverId, RoadLaneId, SpawnerId};
use crate::intersection_manager::IntersectionManager;
use crate::lane::{IntersectionLane, RoadLane};
use crate::manager::{auction::Auction, fcfs::Fcfs, fcfs_signals::FcfsSignals, signals::Signals, stop_sign::StopSign, Connector, Policy};
use crate::network::Network;
use crate::pathfinder::GreedyPathfinder;
use crate::remover::Remover;
use crate::spawner::{Spawner, VehicleTemplate, WeightedDestination};
use crate::tiling::SignalCycle;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoadLaneSpec {
    pub start: Coord,
    pub end: Coord,
    pub width: f64,
    pub speed_limit: f64,
    #[serde(default = "default_entrance_end")]
    pub entrance_end: f64,
    #[serde(default = "default_lcregion_end")]
    pub lcregion_end: f64,
}

fn default_entrance_end() -> f64 {
    0.3
}
fn default_lcregion_end() -> f64 {
    0.7
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoadSpec {
    pub id: u64,
    pub lanes: Vec<RoadLaneSpec>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub enum ManagerPolicyKind {
    Fcfs,
    Signals,
    StopSign,
    Auction,
    FcfsSignals,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignalPhaseSpec {
    /// Indices, within this intersection's list of incoming lanes (in the order they first
    /// appear across `roads`), that get the right of way during this phase.
    pub greenlit_incoming_lane_indices: Vec<usize>,
    pub duration_steps: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IntersectionSpec {
    pub id: u64,
    /// Roads whose lanes end at this intersection. Every lane of every listed road is a
    /// candidate incoming lane.
    pub incoming_road_ids: Vec<u64>,
    /// Roads whose lanes start at this intersection.
    pub outgoing_road_ids: Vec<u64>,
    /// Center of the tiling's bounding box. Purely a grid-sizing parameter -- lane connectivity
    /// is resolved from `incoming_road_ids`/`outgoing_road_ids`, not from this point, so it need
    /// only be roughly where the roads converge.
    pub location: Coord,
    pub policy: ManagerPolicyKind,
    pub tile_width: f64,
    pub grid_half_extent: f64,
    #[serde(default)]
    pub rejection_threshold: f64,
    #[serde(default)]
    pub signal_phases: Vec<SignalPhaseSpec>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpawnerSpec {
    pub id: u64,
    pub road_id: u64,
    pub lane_index: usize,
    pub rate_per_second: f64,
    pub destinations: Vec<(u64, f64)>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemoverSpec {
    pub id: u64,
    pub road_id: u64,
    pub lane_index: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub config: Config,
    pub seed: u64,
    pub roads: Vec<RoadSpec>,
    pub intersections: Vec<IntersectionSpec>,
    pub spawners: Vec<SpawnerSpec>,
    pub removers: Vec<RemoverSpec>,
}

/// Everything a freshly-built `Simulator` needs, before it's wrapped with a clock and a log.
pub struct BuiltScenario {
    pub network: Network,
    pub managers: Vec<IntersectionManager>,
    pub spawners: Vec<Spawner>,
    pub removers: Vec<Remover>,
    pub pathfinder: GreedyPathfinder,
}

/// Resolves every road lane, pairs incoming/outgoing lanes at each intersection per its declared
/// `incoming_road_ids`/`outgoing_road_ids`, and constructs the `Network`, the per-intersection
/// managers, and every spawner/remover declared in the scenario.
pub fn build(spec: &ScenarioSpec, now: Timestep) -> Result<BuiltScenario> {
    spec.config.validate()?;

    let mut network = Network::new();
    let mut flat_lane_id = BTreeMap::new(); // (road_id, lane_index) -> RoadLaneId
    let mut lanes_of_road: BTreeMap<u64, Vec<RoadLaneId>> = BTreeMap::new();
    let mut next_lane_id = 0u64;

    for road in &spec.roads {
        for (idx, lane_spec) in road.lanes.iter().enumerate() {
            let id = RoadLaneId(next_lane_id);
            next_lane_id += 1;
            flat_lane_id.insert((road.id, idx), id);
            lanes_of_road.entry(road.id).or_default().push(id);

            let midpoint = Coord::new((lane_spec.start.x + lane_spec.end.x) / 2.0, (lane_spec.start.y + lane_spec.end.y) / 2.0);
            let trajectory = Trajectory::new(lane_spec.start, midpoint, lane_spec.end);

            let lane = RoadLane::new(
                id,
                trajectory,
                Distance::meters(lane_spec.width),
                Speed::meters_per_second(lane_spec.speed_limit),
                lane_spec.entrance_end,
                lane_spec.lcregion_end,
                false,
                false,
            );
            network.road_lanes.insert(id, lane);
        }
    }

    let mut managers = Vec::with_capacity(spec.intersections.len());
    let mut adjacency: BTreeMap<RoadLaneId, Vec<RoadLaneId>> = BTreeMap::new();
    let mut next_il_id = 0u64;

    for isec in &spec.intersections {
        let lanes_for = |road_ids: &[u64]| -> Result<Vec<RoadLaneId>> {
            let mut out = Vec::new();
            for rid in road_ids {
                let lanes = lanes_of_road
                    .get(rid)
                    .ok_or_else(|| AimError::configuration(format!("intersection {} references unknown road {}", isec.id, rid)))?;
                out.extend(lanes.iter().copied());
            }
            Ok(out)
        };
        let incoming = lanes_for(&isec.incoming_road_ids)?;
        let outgoing = lanes_for(&isec.outgoing_road_ids)?;
        if incoming.is_empty() || outgoing.is_empty() {
            return Err(AimError::missing_connection(format!("intersection {} has no incoming/outgoing lanes", isec.id)));
        }

        for &out_id in &outgoing {
            let out_len = network.road_lanes[&out_id].trajectory.length().inner_meters();
            if out_len < spec.config.min_entrance_length() {
                return Err(AimError::outgoing_road_too_short(format!(
                    "road lane {} ({:.1}m) is shorter than the configured minimum entrance length ({:.1}m)",
                    out_id,
                    out_len,
                    spec.config.min_entrance_length()
                )));
            }
        }

        let mut connectors: BTreeMap<RoadLaneId, Vec<Connector>> = BTreeMap::new();
        for &in_id in &incoming {
            let in_lane = &network.road_lanes[&in_id];
            let in_heading = in_lane.trajectory.heading_at(1.0);
            let mut this_lane_connectors = Vec::new();
            for &out_id in &outgoing {
                if out_id == in_id {
                    continue;
                }
                let out_lane = &network.road_lanes[&out_id];
                let out_heading = out_lane.trajectory.heading_at(0.0);
                let trajectory = match Trajectory::intersection_connector(in_lane.trajectory.end_coord(), in_heading, out_lane.trajectory.start_coord(), out_heading) {
                    Ok(t) => t,
                    Err(_) => continue, // parallel headings: no sensible connector, skip this movement
                };
                let il_id = IntersectionLaneId(next_il_id);
                next_il_id += 1;
                let speed_limit = in_lane.speed_limit.min(out_lane.speed_limit);
                let il = IntersectionLane::new(il_id, in_id, out_id, trajectory, speed_limit);
                network.intersection_lanes.insert(il_id, il);
                this_lane_connectors.push(Connector {
                    intersection_lane: il_id,
                    downstream_road_lane: out_id,
                });
                adjacency.entry(in_id).or_default().push(out_id);
            }
            if this_lane_connectors.is_empty() {
                return Err(AimError::missing_connection(format!("incoming lane {} at intersection {} has no usable outgoing movement", in_id, isec.id)));
            }
            connectors.insert(in_id, this_lane_connectors);
        }

        let policy: Box<dyn Policy> = match isec.policy {
            ManagerPolicyKind::Fcfs => Box::new(Fcfs),
            ManagerPolicyKind::Signals => Box::new(Signals),
            ManagerPolicyKind::StopSign => Box::new(StopSign),
            ManagerPolicyKind::Auction => Box::new(Auction),
            ManagerPolicyKind::FcfsSignals => Box::new(FcfsSignals),
        };

        let id = IntersectionId(isec.id);
        let half = isec.grid_half_extent;
        let mut manager = IntersectionManager::new(
            id,
            isec.location.offset(-half, -half),
            isec.location.offset(half, half),
            Distance::meters(isec.tile_width),
            now,
            isec.rejection_threshold,
            policy,
            incoming.clone(),
            connectors,
        );

        if !isec.signal_phases.is_empty() {
            let phases = isec
                .signal_phases
                .iter()
                .map(|p| {
                    let lanes = p
                        .greenlit_incoming_lane_indices
                        .iter()
                        .filter_map(|&idx| incoming.get(idx))
                        .filter_map(|in_id| manager.connectors.get(in_id))
                        .flat_map(|cs| cs.iter().map(|c| c.intersection_lane))
                        .collect();
                    (lanes, p.duration_steps)
                })
                .collect();
            manager.tiling = manager.tiling.with_signal_cycle(SignalCycle::new(phases));
        }

        managers.push(manager);
    }

    let mut remover_feeders = BTreeMap::new();
    let mut removers = Vec::with_capacity(spec.removers.len());
    for r in &spec.removers {
        let lane_id = *flat_lane_id
            .get(&(r.road_id, r.lane_index))
            .ok_or_else(|| AimError::configuration(format!("remover {} references unknown lane ({}, {})", r.id, r.road_id, r.lane_index)))?;
        network.road_lanes.get_mut(&lane_id).unwrap().downstream_is_remover = true;
        remover_feeders.insert(RemoverId(r.id), lane_id);
        removers.push(Remover { id: RemoverId(r.id), road_lane: lane_id });
    }

    let mut spawners = Vec::with_capacity(spec.spawners.len());
    for (i, s) in spec.spawners.iter().enumerate() {
        let lane_id = *flat_lane_id
            .get(&(s.road_id, s.lane_index))
            .ok_or_else(|| AimError::configuration(format!("spawner {} references unknown lane ({}, {})", s.id, s.road_id, s.lane_index)))?;
        network.road_lanes.get_mut(&lane_id).unwrap().upstream_is_spawner = true;
        let destinations = s.destinations.iter().map(|(id, w)| WeightedDestination { remover_id: *id, weight: *w }).collect();
        let rng = crate::rng::seeded(spec.seed.wrapping_add(i as u64).wrapping_add(1));
        spawners.push(Spawner::new(SpawnerId(s.id), lane_id, s.rate_per_second, destinations, VehicleTemplate::default(), rng));
    }

    let pathfinder = GreedyPathfinder::new(adjacency, remover_feeders);

    Ok(BuiltScenario {
        network,
        managers,
        spawners,
        removers,
        pathfinder,
    })
}
