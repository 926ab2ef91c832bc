//! Minimal typed-units geometry used by the AIM scheduler: real-valued planar coordinates,
//! newtype wrappers for distance/speed/acceleration/duration so they can't be mixed up at
//! call sites, and the parametric trajectory curve lanes are built from.

mod acceleration;
mod angle;
mod coord;
mod distance;
mod duration;
mod speed;
mod trajectory;

pub use acceleration::Acceleration;
pub use angle::Angle;
pub use coord::Coord;
pub use distance::Distance;
pub use duration::{Duration, Timestep};
pub use speed::Speed;
pub use trajectory::{ParallelHeadingsError, Trajectory};
