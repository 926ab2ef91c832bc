use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

use crate::Duration;

/// A length or displacement along a trajectory, in meters.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Distance(f64);

impl Distance {
    pub const ZERO: Distance = Distance(0.0);

    pub fn meters(x: f64) -> Distance {
        Distance(x)
    }

    pub fn inner_meters(self) -> f64 {
        self.0
    }

    pub fn abs(self) -> Distance {
        Distance(self.0.abs())
    }

    pub fn max(self, other: Distance) -> Distance {
        if self.0 >= other.0 {
            self
        } else {
            other
        }
    }

    pub fn min(self, other: Distance) -> Distance {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }
}

impl Add for Distance {
    type Output = Distance;
    fn add(self, other: Distance) -> Distance {
        Distance(self.0 + other.0)
    }
}

impl AddAssign for Distance {
    fn add_assign(&mut self, other: Distance) {
        self.0 += other.0;
    }
}

impl Sub for Distance {
    type Output = Distance;
    fn sub(self, other: Distance) -> Distance {
        Distance(self.0 - other.0)
    }
}

impl Neg for Distance {
    type Output = Distance;
    fn neg(self) -> Distance {
        Distance(-self.0)
    }
}

impl Mul<f64> for Distance {
    type Output = Distance;
    fn mul(self, scalar: f64) -> Distance {
        Distance(self.0 * scalar)
    }
}

impl Div<f64> for Distance {
    type Output = Distance;
    fn div(self, scalar: f64) -> Distance {
        Distance(self.0 / scalar)
    }
}

/// Dividing a distance by a distance yields a dimensionless fraction -- used to convert a
/// longitudinal offset into a trajectory progress value.
impl Div for Distance {
    type Output = f64;
    fn div(self, other: Distance) -> f64 {
        self.0 / other.0
    }
}

impl Div<Duration> for Distance {
    type Output = crate::Speed;
    fn div(self, dt: Duration) -> crate::Speed {
        crate::Speed::meters_per_second(self.0 / dt.inner_seconds())
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:.2}m", self.0)
    }
}
