use serde::{Deserialize, Serialize};

use crate::{Angle, Coord, Distance};

/// Number of chords used to approximate arc length. Small enough to be cheap per lane
/// construction, large enough that the approximation error is negligible next to tile size.
const LENGTH_SUBDIVISIONS: usize = 1000;

/// A quadratic Bezier curve: `start_coord`, one interior control coord, `end_coord`. Arc length
/// is precomputed once at construction by summing chord lengths over a fixed subdivision of `p`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Trajectory {
    start_coord: Coord,
    control_coord: Coord,
    end_coord: Coord,
    length: Distance,
}

#[derive(Debug)]
pub struct ParallelHeadingsError;

impl std::fmt::Display for ParallelHeadingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "start and end headings are parallel; no unique control point exists")
    }
}
impl std::error::Error for ParallelHeadingsError {}

impl Trajectory {
    pub fn new(start_coord: Coord, control_coord: Coord, end_coord: Coord) -> Trajectory {
        let mut t = Trajectory {
            start_coord,
            control_coord,
            end_coord,
            length: Distance::ZERO,
        };
        t.length = t.compute_length();
        t
    }

    /// Builds the Bezier connecting an upstream lane end to a downstream lane start, deriving
    /// the control point as the intersection of the two heading rays. Fails when the rays are
    /// parallel (including the degenerate case of two vertical rays).
    pub fn intersection_connector(
        start_coord: Coord,
        start_heading: Angle,
        end_coord: Coord,
        end_heading: Angle,
    ) -> Result<Trajectory, ParallelHeadingsError> {
        let control = ray_intersection(start_coord, start_heading, end_coord, end_heading)
            .ok_or(ParallelHeadingsError)?;
        Ok(Trajectory::new(start_coord, control, end_coord))
    }

    pub fn start_coord(&self) -> Coord {
        self.start_coord
    }

    pub fn end_coord(&self) -> Coord {
        self.end_coord
    }

    pub fn length(&self) -> Distance {
        self.length
    }

    pub fn position_at(&self, p: f64) -> Coord {
        let p = p.clamp(0.0, 1.0);
        let x = quad_bezier(self.start_coord.x, self.control_coord.x, self.end_coord.x, p);
        let y = quad_bezier(self.start_coord.y, self.control_coord.y, self.end_coord.y, p);
        Coord::new(x, y)
    }

    pub fn heading_at(&self, p: f64) -> Angle {
        let p = p.clamp(0.0, 1.0);
        let dx = quad_bezier_deriv(self.start_coord.x, self.control_coord.x, self.end_coord.x, p);
        let dy = quad_bezier_deriv(self.start_coord.y, self.control_coord.y, self.end_coord.y, p);
        Angle::radians(dy.atan2(dx))
    }

    fn compute_length(&self) -> Distance {
        let mut total = 0.0;
        let mut prev = self.position_at(0.0);
        for i in 1..=LENGTH_SUBDIVISIONS {
            let p = i as f64 / LENGTH_SUBDIVISIONS as f64;
            let cur = self.position_at(p);
            total += prev.dist_to(cur).inner_meters();
            prev = cur;
        }
        Distance::meters(total)
    }
}

fn quad_bezier(p0: f64, p1: f64, p2: f64, t: f64) -> f64 {
    (1.0 - t).powi(2) * p0 + 2.0 * (1.0 - t) * t * p1 + t.powi(2) * p2
}

fn quad_bezier_deriv(p0: f64, p1: f64, p2: f64, t: f64) -> f64 {
    2.0 * (1.0 - t) * (p1 - p0) + 2.0 * t * (p2 - p1)
}

/// Intersects the ray from `a` along `heading_a` with the ray from `b` along `heading_b`,
/// special-casing vertical rays (infinite slope) and returning `None` when the rays are
/// parallel.
fn ray_intersection(a: Coord, heading_a: Angle, b: Coord, heading_b: Angle) -> Option<Coord> {
    const EPS: f64 = 1e-9;
    let cos_a = heading_a.inner_radians().cos();
    let cos_b = heading_b.inner_radians().cos();
    let vertical_a = cos_a.abs() < EPS;
    let vertical_b = cos_b.abs() < EPS;

    if vertical_a && vertical_b {
        return None;
    }
    if vertical_a {
        let x = a.x;
        let slope_b = heading_b.inner_radians().tan();
        let y = b.y + slope_b * (x - b.x);
        return Some(Coord::new(x, y));
    }
    if vertical_b {
        let x = b.x;
        let slope_a = heading_a.inner_radians().tan();
        let y = a.y + slope_a * (x - a.x);
        return Some(Coord::new(x, y));
    }

    let slope_a = heading_a.inner_radians().tan();
    let slope_b = heading_b.inner_radians().tan();
    if (slope_a - slope_b).abs() < EPS {
        return None;
    }
    let x = (b.y - a.y + slope_a * a.x - slope_b * b.x) / (slope_a - slope_b);
    let y = a.y + slope_a * (x - a.x);
    Some(Coord::new(x, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn straight_line_length_matches_endpoints() {
        let t = Trajectory::new(Coord::new(0.0, 0.0), Coord::new(5.0, 0.0), Coord::new(10.0, 0.0));
        assert!((t.length().inner_meters() - 10.0).abs() < 1e-6);
        let mid = t.position_at(0.5);
        assert!((mid.x - 5.0).abs() < 1e-6);
        assert!((mid.y - 0.0).abs() < 1e-6);
    }

    #[test]
    fn connector_matches_square_turn() {
        let t = Trajectory::intersection_connector(
            Coord::new(0.0, 0.0),
            Angle::radians(0.0),
            Coord::new(10.0, 10.0),
            Angle::radians(PI / 2.0),
        )
        .unwrap();
        assert_eq!(t.start_coord(), Coord::new(0.0, 0.0));
        assert_eq!(t.end_coord(), Coord::new(10.0, 10.0));
    }

    #[test]
    fn parallel_headings_rejected() {
        let err = Trajectory::intersection_connector(
            Coord::new(0.0, 0.0),
            Angle::radians(0.0),
            Coord::new(10.0, 0.0),
            Angle::radians(0.0),
        );
        assert!(err.is_err());
    }
}
