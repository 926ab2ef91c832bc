//! An autonomous intersection management traffic simulator: discrete-time, microscopic, and
//! reservation-based. Vehicles request a slot through an intersection from an
//! [`intersection_manager::IntersectionManager`]; the manager's [`manager::Policy`] decides which
//! requests to test against the [`tiling::Tiling`]'s time-layered occupancy grid, and only a
//! vehicle holding a committed [`reservation::Reservation`] is ever allowed to cross.

pub mod config;
pub mod engine;
pub mod error;
pub mod ids;
pub mod intersection_manager;
pub mod lane;
pub mod manager;
pub mod network;
pub mod pathfinder;
pub mod remover;
pub mod reservation;
pub mod rng;
pub mod sim;
pub mod spawner;
pub mod spec;
pub mod tiling;
pub mod vehicle;

pub use error::{AimError, ErrorKind, Result};
pub use sim::{LogEvent, Simulator};
pub use spec::ScenarioSpec;
