//! Planar helpers for the satin border: convex hull, outward buffering
//! and polyline cleanup.
//!
//! The heavy lifting is done by `geo`. Rings handed back to callers are
//! open (the last point does not repeat the first) and counter-clockwise.

use std::f64::consts::FRAC_PI_2;

use geo::algorithm::buffer::{BufferStyle, LineJoin};
use geo::{Area, Buffer, ConvexHull, LineString, MultiPoint, Polygon, Winding};

use crate::types::{DEGENERATE_LENGTH_MM, Point};

/// Arc segments per quarter circle in round joins.
pub const ROUND_JOIN_SEGMENTS: usize = 8;

/// Hulls with less area than this (mm²) are treated as degenerate.
const MIN_HULL_AREA: f64 = 1e-9;

/// Convex hull of `points` as an open counter-clockwise ring.
///
/// Returns an empty vec when the hull has no area: fewer than three
/// points, all points coincident, or all points collinear.
#[must_use]
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    if points.len() < 3 {
        return Vec::new();
    }

    let cloud: MultiPoint<f64> = points.iter().map(|p| (p.x, p.y)).collect();
    let hull = cloud.convex_hull();
    if hull.unsigned_area() < MIN_HULL_AREA {
        return Vec::new();
    }
    open_ccw_ring(hull.exterior())
}

/// Offset a ring outward by `distance` with round joins of
/// [`ROUND_JOIN_SEGMENTS`] segments per quarter turn.
///
/// Returns the outer boundary of the buffered shape as an open
/// counter-clockwise ring, or an empty vec for a degenerate ring.
#[must_use]
pub fn buffer_ring(ring: &[Point], distance: f64) -> Vec<Point> {
    if ring.len() < 3 {
        return Vec::new();
    }

    #[allow(clippy::cast_precision_loss)]
    let join_angle = FRAC_PI_2 / ROUND_JOIN_SEGMENTS as f64;
    let style = BufferStyle::new(distance).line_join(LineJoin::Round(join_angle));
    let buffered = to_polygon(ring).buffer_with_style(style);

    buffered
        .0
        .iter()
        .max_by(|a, b| a.unsigned_area().total_cmp(&b.unsigned_area()))
        .map(|outer| dedup_consecutive(&open_ccw_ring(outer.exterior()), DEGENERATE_LENGTH_MM))
        .unwrap_or_default()
}

/// A `geo` polygon bounded by `ring`. The ring is closed automatically.
#[must_use]
pub fn to_polygon(ring: &[Point]) -> Polygon<f64> {
    let exterior: LineString<f64> = ring.iter().map(|p| (p.x, p.y)).collect();
    Polygon::new(exterior, vec![])
}

fn open_ccw_ring(ring: &LineString<f64>) -> Vec<Point> {
    let mut ring = ring.clone();
    ring.make_ccw_winding();
    let mut points: Vec<Point> = ring.coords().map(|c| Point::new(c.x, c.y)).collect();
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    points
}

/// Drop points closer than `min_distance` to the previously kept point.
#[must_use]
pub fn dedup_consecutive(points: &[Point], min_distance: f64) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for &p in points {
        match out.last() {
            Some(&last) if last.distance(p) < min_distance => {}
            _ => out.push(p),
        }
    }
    out
}

/// Total length of a polyline.
#[must_use]
pub fn path_length(points: &[Point]) -> f64 {
    points.windows(2).map(|w| w[0].distance(w[1])).sum()
}
