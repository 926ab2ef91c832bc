use geom::{Angle, Coord, Distance};
use serde::{Deserialize, Serialize};

/// A uniform square grid over the axis-aligned bounding box of every intersection lane
/// endpoint. Indexes tiles `(x_index, y_index)`, flattened row-major as
/// `y_index * x_tile_count + x_index` -- the flat-arena layout a tile is always
/// addressed as `(layer_offset, index)` rather than by pointer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Grid {
    pub tile_width: Distance,
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub x_tile_count: u32,
    pub y_tile_count: u32,
}

impl Grid {
    pub fn new(min: Coord, max: Coord, tile_width: Distance) -> Grid {
        let w = tile_width.inner_meters();
        let x_tile_count = ((max.x - min.x) / w).ceil().max(1.0) as u32;
        let y_tile_count = ((max.y - min.y) / w).ceil().max(1.0) as u32;
        Grid {
            tile_width,
            min_x: min.x,
            min_y: min.y,
            max_x: min.x + x_tile_count as f64 * w,
            max_y: min.y + y_tile_count as f64 * w,
            x_tile_count,
            y_tile_count,
        }
    }

    pub fn num_tiles(&self) -> usize {
        (self.x_tile_count as usize) * (self.y_tile_count as usize)
    }

    pub fn tile_index(&self, x: u32, y: u32) -> usize {
        (y * self.x_tile_count + x) as usize
    }

    fn tile_center(&self, x: u32, y: u32) -> Coord {
        let w = self.tile_width.inner_meters();
        Coord::new(self.min_x + (x as f64 + 0.5) * w, self.min_y + (y as f64 + 0.5) * w)
    }

    /// Clips the vehicle's rectangular outline (centered at `center`, oriented along `heading`,
    /// `length` x `width`, inflated by `inflation` -- the throttle/tracking extension point) to
    /// the grid's bounding box, then enumerates every tile whose center lies inside the clipped
    /// polygon. Returns an empty vector when the rectangle falls entirely outside the grid.
    pub fn rasterize_rectangle(
        &self,
        center: Coord,
        heading: Angle,
        length: Distance,
        width: Distance,
        inflation: f64,
    ) -> Vec<(u32, u32)> {
        let polygon = vehicle_outline(center, heading, length * inflation, width * inflation);
        let clipped = clip_to_bbox(&polygon, self.min_x, self.min_y, self.max_x, self.max_y);
        if clipped.len() < 3 {
            return Vec::new();
        }

        let (bbox_min, bbox_max) = polygon_bbox(&clipped);
        let w = self.tile_width.inner_meters();
        let x_lo = (((bbox_min.x - self.min_x) / w).floor().max(0.0)) as u32;
        let x_hi = (((bbox_max.x - self.min_x) / w).ceil() as i64).min(self.x_tile_count as i64 - 1).max(0) as u32;
        let y_lo = (((bbox_min.y - self.min_y) / w).floor().max(0.0)) as u32;
        let y_hi = (((bbox_max.y - self.min_y) / w).ceil() as i64).min(self.y_tile_count as i64 - 1).max(0) as u32;

        let mut out = Vec::new();
        if x_lo > x_hi || y_lo > y_hi {
            return out;
        }
        for y in y_lo..=y_hi {
            for x in x_lo..=x_hi {
                if point_in_convex_polygon(self.tile_center(x, y), &clipped) {
                    out.push((x, y));
                }
            }
        }
        out
    }
}

/// The four corners of a vehicle's footprint, oriented along `heading`, centered at `center`.
fn vehicle_outline(center: Coord, heading: Angle, length: Distance, width: Distance) -> Vec<Coord> {
    let hl = length.inner_meters() / 2.0;
    let hw = width.inner_meters() / 2.0;
    let (s, c) = heading.inner_radians().sin_cos();
    // Local corners (forward, left), rotated into world space.
    let corners = [(hl, hw), (hl, -hw), (-hl, -hw), (-hl, hw)];
    corners
        .iter()
        .map(|(fwd, left)| Coord::new(center.x + fwd * c - left * s, center.y + fwd * s + left * c))
        .collect()
}

fn polygon_bbox(poly: &[Coord]) -> (Coord, Coord) {
    let mut min = poly[0];
    let mut max = poly[0];
    for p in poly {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    (min, max)
}

/// Sutherland-Hodgman clip of a convex polygon against an axis-aligned rectangle. Handles the
/// usual edge cases: a polygon entirely inside or outside the rectangle, edges that
/// cross the boundary, and vertices that land exactly on it (`inside` is a closed test, `<=`, so
/// a boundary vertex counts as inside -- consistent with the "lower-index side" tie-break tiles
/// use).
fn clip_to_bbox(poly: &[Coord], min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Vec<Coord> {
    let mut result = poly.to_vec();
    result = clip_edge(&result, |p| p.x >= min_x, |a, b| lerp_x(a, b, min_x));
    result = clip_edge(&result, |p| p.x <= max_x, |a, b| lerp_x(a, b, max_x));
    result = clip_edge(&result, |p| p.y >= min_y, |a, b| lerp_y(a, b, min_y));
    result = clip_edge(&result, |p| p.y <= max_y, |a, b| lerp_y(a, b, max_y));
    result
}

fn clip_edge(subject: &[Coord], inside: impl Fn(Coord) -> bool, intersect: impl Fn(Coord, Coord) -> Coord) -> Vec<Coord> {
    if subject.is_empty() {
        return Vec::new();
    }
    let mut output = Vec::new();
    for i in 0..subject.len() {
        let current = subject[i];
        let prev = subject[(i + subject.len() - 1) % subject.len()];
        let current_in = inside(current);
        let prev_in = inside(prev);
        if current_in {
            if !prev_in {
                output.push(intersect(prev, current));
            }
            output.push(current);
        } else if prev_in {
            output.push(intersect(prev, current));
        }
    }
    output
}

fn lerp_x(a: Coord, b: Coord, x: f64) -> Coord {
    let t = (x - a.x) / (b.x - a.x);
    Coord::new(x, a.y + t * (b.y - a.y))
}

fn lerp_y(a: Coord, b: Coord, y: f64) -> Coord {
    let t = (y - a.y) / (b.y - a.y);
    Coord::new(a.x + t * (b.x - a.x), y)
}

/// Even the clipped polygon stays convex (rectangle-vs-rectangle clip), so membership is just
/// "same turn direction for every edge" with `>= 0` treated as inside to pick up boundary
/// points.
fn point_in_convex_polygon(p: Coord, poly: &[Coord]) -> bool {
    let n = poly.len();
    let mut sign = 0i32;
    for i in 0..n {
        let a = poly[i];
        let b = poly[(i + 1) % n];
        let cross = (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
        if cross.abs() < 1e-9 {
            continue;
        }
        let s = if cross > 0.0 { 1 } else { -1 };
        if sign == 0 {
            sign = s;
        } else if s != sign {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Grid {
        Grid::new(Coord::new(0.0, 0.0), Coord::new(10.0, 10.0), Distance::meters(1.0))
    }

    #[test]
    fn rectangle_wholly_outside_is_empty() {
        let g = grid();
        let tiles = g.rasterize_rectangle(
            Coord::new(-100.0, -100.0),
            Angle::radians(0.0),
            Distance::meters(2.0),
            Distance::meters(1.0),
            1.0,
        );
        assert!(tiles.is_empty());
    }

    #[test]
    fn rectangle_wholly_inside_hits_expected_tiles() {
        let g = grid();
        let tiles = g.rasterize_rectangle(
            Coord::new(5.0, 5.0),
            Angle::radians(0.0),
            Distance::meters(1.0),
            Distance::meters(1.0),
            1.0,
        );
        assert!(tiles.contains(&(4, 4)) || tiles.contains(&(5, 5)));
        assert!(!tiles.is_empty());
    }

    #[test]
    fn rectangle_covering_whole_grid_hits_every_tile() {
        let g = grid();
        let tiles = g.rasterize_rectangle(
            Coord::new(5.0, 5.0),
            Angle::radians(0.0),
            Distance::meters(100.0),
            Distance::meters(100.0),
            1.0,
        );
        assert_eq!(tiles.len(), g.num_tiles());
    }
}
