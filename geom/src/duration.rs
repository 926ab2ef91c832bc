use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Sub};

use serde::{Deserialize, Serialize};

/// A continuous span of simulated time, in seconds. Distinct from [`crate::Timestep`], which
/// counts discrete simulation ticks.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Duration(f64);

impl Duration {
    pub const ZERO: Duration = Duration(0.0);

    pub fn seconds(x: f64) -> Duration {
        Duration(x)
    }

    pub const fn const_seconds(x: f64) -> Duration {
        Duration(x)
    }

    pub fn inner_seconds(self) -> f64 {
        self.0
    }

    pub fn max(self, other: Duration) -> Duration {
        if self.0 >= other.0 {
            self
        } else {
            other
        }
    }

    pub fn min(self, other: Duration) -> Duration {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }
}

impl Add for Duration {
    type Output = Duration;
    fn add(self, other: Duration) -> Duration {
        Duration(self.0 + other.0)
    }
}

impl AddAssign for Duration {
    fn add_assign(&mut self, other: Duration) {
        self.0 += other.0;
    }
}

impl Sub for Duration {
    type Output = Duration;
    fn sub(self, other: Duration) -> Duration {
        Duration(self.0 - other.0)
    }
}

impl Mul<f64> for Duration {
    type Output = Duration;
    fn mul(self, scalar: f64) -> Duration {
        Duration(self.0 * scalar)
    }
}

impl Div<f64> for Duration {
    type Output = Duration;
    fn div(self, scalar: f64) -> Duration {
        Duration(self.0 / scalar)
    }
}

impl Div for Duration {
    type Output = f64;
    fn div(self, other: Duration) -> f64 {
        self.0 / other.0
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:.2}s", self.0)
    }
}

/// A discrete tick of the simulation clock. Layer 0 of a tiling always represents `now + 1`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestep(u64);

impl Timestep {
    pub const ZERO: Timestep = Timestep(0);

    pub fn new(t: u64) -> Timestep {
        Timestep(t)
    }

    pub fn inner(self) -> u64 {
        self.0
    }

    pub fn succ(self) -> Timestep {
        Timestep(self.0 + 1)
    }

    /// Number of steps ahead `self` is of `other`. Panics if `self < other`; callers must not
    /// ask for a negative offset.
    pub fn offset_from(self, other: Timestep) -> u64 {
        self.0 - other.0
    }

    pub fn plus_steps(self, steps: u64) -> Timestep {
        Timestep(self.0 + steps)
    }
}

impl fmt::Display for Timestep {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}
