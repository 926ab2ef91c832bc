use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use geom::{Acceleration, Angle, Coord, Distance, Speed};
use serde::{Deserialize, Serialize};

/// A vehicle identification number. The global counter lives on the `Simulator` (see
/// [`crate::sim::VinCounter`]); this type is just the stable, hashable, cheap-to-copy identifier
/// handed around everywhere else.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Vin(pub u64);

impl fmt::Display for Vin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Process-wide, single-threaded-write VIN counter. One per `Simulator`; never shared between
/// concurrently-running simulators.
#[derive(Default)]
pub struct VinCounter(AtomicU64);

impl VinCounter {
    pub fn next(&self) -> Vin {
        Vin(self.0.fetch_add(1, Ordering::Relaxed))
    }
}

/// The three longitudinal reference points tracked for every vehicle: `Front` leads, `Rear`
/// trails. Ordered so `section as usize` gives a stable index into a 3-slot array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VehicleSection {
    Front = 0,
    Center = 1,
    Rear = 2,
}

impl VehicleSection {
    pub const ALL: [VehicleSection; 3] = [VehicleSection::Front, VehicleSection::Center, VehicleSection::Rear];
}

/// Immutable per-vehicle characteristics, set once by the factory that spawned it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VehicleCharacteristics {
    pub destination_id: u64,
    pub max_acceleration: Acceleration,
    pub max_braking: Acceleration,
    pub length: Distance,
    pub width: Distance,
    pub throttle_score: f64,
    pub tracking_score: f64,
    pub vot: f64,
}

/// A single vehicle: mutable physical state plus the immutable characteristics it was spawned
/// with. `pos`/`heading` are cosmetic -- all longitudinal reasoning goes through
/// [`crate::lane::VehicleProgress`] -- but are kept current so drawing or logging never needs to
/// re-derive them from a lane.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Vehicle {
    pub vin: Vin,
    pub pos: Coord,
    pub velocity: Speed,
    pub acceleration: Acceleration,
    pub heading: Angle,
    pub characteristics: VehicleCharacteristics,
    pub permission_to_enter_intersection: bool,
    pub has_reservation: bool,
}

impl Vehicle {
    pub fn new(vin: Vin, pos: Coord, heading: Angle, characteristics: VehicleCharacteristics) -> Vehicle {
        Vehicle {
            vin,
            pos,
            velocity: Speed::ZERO,
            acceleration: Acceleration::ZERO,
            heading,
            characteristics,
            permission_to_enter_intersection: false,
            has_reservation: false,
        }
    }

    pub fn destination_id(&self) -> u64 {
        self.characteristics.destination_id
    }

    pub fn length(&self) -> Distance {
        self.characteristics.length
    }

    pub fn width(&self) -> Distance {
        self.characteristics.width
    }

    /// Sets acceleration, clamping away from braking while stopped: a stationary vehicle can't
    /// have negative acceleration, or it would (nonsensically) roll backwards.
    pub fn set_acceleration(&mut self, a: Acceleration) {
        self.acceleration = if self.velocity == Speed::ZERO && a.inner_meters_per_second_squared() < 0.0 {
            Acceleration::ZERO
        } else {
            a
        };
    }

    /// Worst-case distance this vehicle needs to come to a complete stop from its current speed,
    /// braking at `max_braking`. `v^2 / (2*|a|)`.
    pub fn stopping_distance(&self) -> Distance {
        let v = self.velocity.inner_meters_per_second();
        let a = self.characteristics.max_braking.inner_meters_per_second_squared().abs();
        if a == 0.0 {
            return Distance::meters(f64::INFINITY);
        }
        Distance::meters(v * v / (2.0 * a))
    }

    /// Idempotent: granting permission twice is a no-op, never an error.
    pub fn grant_permission_to_enter_intersection(&mut self) {
        self.permission_to_enter_intersection = true;
    }

    /// Idempotent for the same reason.
    pub fn grant_reservation(&mut self) {
        self.has_reservation = true;
    }
}
