use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::{Angle, Distance};

/// A point in the plane. Used both as a general-purpose geometric value and, when it coincides
/// exactly with a lane endpoint, as a stable identifier for that endpoint -- so equality and
/// hashing are bitwise rather than approximate.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    pub fn new(x: f64, y: f64) -> Coord {
        Coord { x, y }
    }

    pub fn dist_to(self, other: Coord) -> Distance {
        Distance::meters(self.dist2_to(other).sqrt())
    }

    pub fn dist2_to(self, other: Coord) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn offset(self, dx: f64, dy: f64) -> Coord {
        Coord::new(self.x + dx, self.y + dy)
    }

    pub fn project_along(self, heading: Angle, dist: Distance) -> Coord {
        let d = dist.inner_meters();
        self.offset(d * heading.inner_radians().cos(), d * heading.inner_radians().sin())
    }
}

impl PartialEq for Coord {
    fn eq(&self, other: &Coord) -> bool {
        self.x.to_bits() == other.x.to_bits() && self.y.to_bits() == other.y.to_bits()
    }
}
impl Eq for Coord {}

impl Hash for Coord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.x.to_bits().hash(state);
        self.y.to_bits().hash(state);
    }
}

// Required so Coord can be used as a BTreeMap key for deterministic iteration over lane
// endpoints; ordering is lexicographic on bit patterns, which is monotonic in the represented
// float ordering for any non-NaN value.
impl PartialOrd for Coord {
    fn partial_cmp(&self, other: &Coord) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Coord {
    fn cmp(&self, other: &Coord) -> std::cmp::Ordering {
        (self.x.to_bits(), self.y.to_bits()).cmp(&(other.x.to_bits(), other.y.to_bits()))
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}
