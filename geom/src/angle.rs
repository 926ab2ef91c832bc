use std::f64::consts::PI;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A heading, normalized to `[0, 2*PI)` radians, 0 pointing along +x.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Angle(f64);

impl Angle {
    pub fn radians(x: f64) -> Angle {
        Angle(x.rem_euclid(2.0 * PI))
    }

    pub fn inner_radians(self) -> f64 {
        self.0
    }
}

impl PartialEq for Angle {
    fn eq(&self, other: &Angle) -> bool {
        (self.0 - other.0).abs() < 1e-9
    }
}

impl fmt::Display for Angle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:.1}deg", self.0.to_degrees())
    }
}
