use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

use crate::{Duration, Speed};

/// A longitudinal acceleration, in meters/second^2. Negative values brake.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Acceleration(f64);

impl Acceleration {
    pub const ZERO: Acceleration = Acceleration(0.0);

    pub fn meters_per_second_squared(x: f64) -> Acceleration {
        Acceleration(x)
    }

    pub fn inner_meters_per_second_squared(self) -> f64 {
        self.0
    }

    pub fn max(self, other: Acceleration) -> Acceleration {
        if self.0 >= other.0 {
            self
        } else {
            other
        }
    }

    pub fn min(self, other: Acceleration) -> Acceleration {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }
}

impl Add for Acceleration {
    type Output = Acceleration;
    fn add(self, other: Acceleration) -> Acceleration {
        Acceleration(self.0 + other.0)
    }
}

impl Sub for Acceleration {
    type Output = Acceleration;
    fn sub(self, other: Acceleration) -> Acceleration {
        Acceleration(self.0 - other.0)
    }
}

impl Neg for Acceleration {
    type Output = Acceleration;
    fn neg(self) -> Acceleration {
        Acceleration(-self.0)
    }
}

impl Mul<Duration> for Acceleration {
    type Output = Speed;
    fn mul(self, dt: Duration) -> Speed {
        Speed::meters_per_second(self.0 * dt.inner_seconds())
    }
}

impl fmt::Display for Acceleration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:.2}m/s^2", self.0)
    }
}
