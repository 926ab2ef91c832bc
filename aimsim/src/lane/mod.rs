//! Lane containers. A lane here is a dumb, ordered queue of vehicles over a trajectory -- it
//! knows nothing about its neighbors. Cross-lane kinematics (who controls a vehicle's speed,
//! where a transfer lands) are [`crate::network::Network`]'s job: a container versus a stepper.

mod intersection;
mod road;

pub use intersection::IntersectionLane;
pub use road::RoadLane;

use geom::Distance;
use serde::{Deserialize, Serialize};

use crate::vehicle::{Vin, VehicleSection};

/// The fractional position of each of a vehicle's three sections along one lane's trajectory.
/// `None` means that section lives in an adjacent upstream/downstream object instead. When all
/// three are present, `rear <= center <= front` always holds -- nothing in this module ever
/// permits overtaking within a lane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleProgress {
    pub front: Option<f64>,
    pub center: Option<f64>,
    pub rear: Option<f64>,
}

impl VehicleProgress {
    pub fn fresh_front(p: f64) -> VehicleProgress {
        VehicleProgress {
            front: Some(p),
            center: None,
            rear: None,
        }
    }

    pub fn get(&self, section: VehicleSection) -> Option<f64> {
        match section {
            VehicleSection::Front => self.front,
            VehicleSection::Center => self.center,
            VehicleSection::Rear => self.rear,
        }
    }

    pub fn set(&mut self, section: VehicleSection, p: Option<f64>) {
        match section {
            VehicleSection::Front => self.front = p,
            VehicleSection::Center => self.center = p,
            VehicleSection::Rear => self.rear = p,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.front.is_none() && self.center.is_none() && self.rear.is_none()
    }

    /// The highest present section's progress -- used to order a lane's queue front-to-back.
    pub fn leading_progress(&self) -> f64 {
        self.front.or(self.center).or(self.rear).unwrap_or(0.0)
    }

    pub fn check_monotonic(&self) -> bool {
        match (self.rear, self.center, self.front) {
            (Some(r), Some(c), Some(f)) => r <= c + 1e-9 && c <= f + 1e-9,
            _ => true,
        }
    }
}

/// Handed from an upstream object to a downstream object's buffer when one section of a
/// vehicle crosses a seam. `distance_remaining` is `None` for a fresh spawn.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct VehicleTransfer {
    pub vehicle: Vin,
    pub section: VehicleSection,
    pub distance_remaining: Option<Distance>,
    pub entry_coord: geom::Coord,
}
