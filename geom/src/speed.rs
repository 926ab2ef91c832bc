use std::fmt;
use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

use crate::{Distance, Duration};

/// A longitudinal speed, in meters/second. Always non-negative for vehicles in this simulator;
/// the type itself doesn't enforce that, the same way `Distance` doesn't enforce positivity.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Speed(f64);

impl Speed {
    pub const ZERO: Speed = Speed(0.0);

    pub fn meters_per_second(x: f64) -> Speed {
        Speed(x)
    }

    pub fn inner_meters_per_second(self) -> f64 {
        self.0
    }

    pub fn max(self, other: Speed) -> Speed {
        if self.0 >= other.0 {
            self
        } else {
            other
        }
    }

    pub fn min(self, other: Speed) -> Speed {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }
}

impl Add for Speed {
    type Output = Speed;
    fn add(self, other: Speed) -> Speed {
        Speed(self.0 + other.0)
    }
}

impl Sub for Speed {
    type Output = Speed;
    fn sub(self, other: Speed) -> Speed {
        Speed(self.0 - other.0)
    }
}

impl Mul<Duration> for Speed {
    type Output = Distance;
    fn mul(self, dt: Duration) -> Distance {
        Distance::meters(self.0 * dt.inner_seconds())
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:.2}m/s", self.0)
    }
}
