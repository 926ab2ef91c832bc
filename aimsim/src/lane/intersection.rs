use std::collections::{BTreeMap, VecDeque};

use geom::{Speed, Trajectory};
use serde::{Deserialize, Serialize};

use crate::ids::{IntersectionLaneId, RoadLaneId};
use crate::vehicle::Vin;

use super::VehicleProgress;

/// Connects one inbound road lane's end to one outbound road lane's start. No cross-lane
/// following happens at the seam entering this lane -- the upstream road lane handles that --
/// within the lane it's ordinary following, same as a road lane.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IntersectionLane {
    pub id: IntersectionLaneId,
    pub upstream_road_lane: RoadLaneId,
    pub downstream_road_lane: RoadLaneId,
    pub trajectory: Trajectory,
    pub speed_limit: Speed,

    /// Extension point for stochastic tracking error; defaults to zero lateral deviation for
    /// every vehicle.
    pub lateral_deviation: BTreeMap<Vin, f64>,

    pub vehicles: VecDeque<Vin>,
    pub progress: BTreeMap<Vin, VehicleProgress>,
}

impl IntersectionLane {
    pub fn new(
        id: IntersectionLaneId,
        upstream_road_lane: RoadLaneId,
        downstream_road_lane: RoadLaneId,
        trajectory: Trajectory,
        speed_limit: Speed,
    ) -> IntersectionLane {
        IntersectionLane {
            id,
            upstream_road_lane,
            downstream_road_lane,
            trajectory,
            speed_limit,
            lateral_deviation: BTreeMap::new(),
            vehicles: VecDeque::new(),
            progress: BTreeMap::new(),
        }
    }

    /// Structural copy with empty `vehicles`/`progress`/`lateral_deviation` -- required by the
    /// reservation engine's mock loop.
    pub fn clone_empty(&self) -> IntersectionLane {
        IntersectionLane {
            id: self.id,
            upstream_road_lane: self.upstream_road_lane,
            downstream_road_lane: self.downstream_road_lane,
            trajectory: self.trajectory.clone(),
            speed_limit: self.speed_limit,
            lateral_deviation: BTreeMap::new(),
            vehicles: VecDeque::new(),
            progress: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    pub fn lateral_deviation_of(&self, vin: Vin) -> f64 {
        self.lateral_deviation.get(&vin).copied().unwrap_or(0.0)
    }
}
