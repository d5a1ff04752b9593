//! Satin border: a dense zig-zag around the whole design.
//!
//! The border follows the convex hull of every stitch, pushed outward
//! by half the border thickness. The needle then swings across that
//! outline, alternating sides every offset point, so the finished
//! border covers the band between the hull and `thickness` beyond it.

use tracing::{debug, warn};

use crate::color::Argb;
use crate::geometry::{buffer_ring, convex_hull, dedup_consecutive};
use crate::types::{DEGENERATE_LENGTH_MM, Point, Thread, absolute_threads};

/// Borders are generated only for thicknesses above this.
pub const MIN_BORDER_THICKNESS_MM: f64 = 0.1;

/// Borders are generated only for zig-zag spacings above this.
pub const MIN_BORDER_DENSITY_MM: f64 = 0.05;

/// Returns `true` if a border with these parameters would be generated.
#[must_use]
pub fn border_enabled(thickness: f64, density: f64) -> bool {
    thickness > MIN_BORDER_THICKNESS_MM && density > MIN_BORDER_DENSITY_MM
}

/// Satin border thread(s) around all stitches of `threads`.
///
/// Returns an empty vec when the border is disabled (see
/// [`border_enabled`]) or when the stitches span no area. Otherwise
/// returns a single absolute thread in `color`.
#[must_use]
pub fn satin_border(threads: &[Thread], color: Argb, thickness: f64, density: f64) -> Vec<Thread> {
    if !border_enabled(thickness, density) {
        debug!(thickness, density, "satin border disabled");
        return Vec::new();
    }

    let points: Vec<Point> = absolute_threads(threads)
        .into_iter()
        .flat_map(|t| t.stitches)
        .collect();
    let hull = convex_hull(&points);
    if hull.is_empty() {
        warn!(points = points.len(), "stitches span no area, skipping satin border");
        return Vec::new();
    }

    let outline = buffer_ring(&hull, thickness / 2.0);
    let stitches = zig_zag(&outline, thickness, density);
    if stitches.is_empty() {
        warn!("satin outline produced no stitches");
        return Vec::new();
    }

    debug!(
        hull_points = hull.len(),
        outline_points = outline.len(),
        stitches = stitches.len(),
        "satin border"
    );
    vec![Thread::absolute(color, stitches)]
}

/// Zig-zag along a closed outline.
///
/// Each segment emits its start point, then offset points swinging
/// `thickness / 2` to alternating sides: one right after the start and
/// two per `density` step (at a quarter and three quarters of the
/// step). The path closes on the first outline point. Segments with a
/// degenerate direction are skipped.
#[must_use]
pub fn zig_zag(outline: &[Point], thickness: f64, density: f64) -> Vec<Point> {
    let n = outline.len();
    if n < 2 {
        return Vec::new();
    }

    let mut out = Vec::new();
    let mut side = 1.0;
    for i in 0..n {
        let current = outline[i];
        let next = outline[(i + 1) % n];
        let direction = next - current;
        let normal = direction.orthogonal().normalize();
        if direction.is_degenerate() || normal.is_degenerate() {
            warn!(?current, ?next, "skipping degenerate satin segment");
            continue;
        }

        let hump = normal * (thickness / 2.0);
        out.push(current);
        out.push(current + hump * side);
        side = -side;

        let steps = direction.length() / density;
        let step = direction / steps;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let count = steps.floor() as usize;
        for k in 0..count {
            #[allow(clippy::cast_precision_loss)]
            let base = current + step * k as f64;
            out.push(base + step * 0.25 + hump * side);
            side = -side;
            out.push(base + step * 0.75 + hump * side);
            side = -side;
        }
    }
    out.push(outline[0]);

    dedup_consecutive(&out, DEGENERATE_LENGTH_MM)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thread(points: &[(f64, f64)]) -> Thread {
        Thread::absolute(
            Argb::rgb(255, 0, 0),
            points.iter().map(|&(x, y)| Point::new(x, y)).collect(),
        )
    }

    fn square_thread() -> Thread {
        thread(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (5.0, 5.0)])
    }

    #[test]
    fn single_point_gives_no_border() {
        let border = satin_border(&[thread(&[(3.0, 3.0)])], Argb::BLACK, 2.0, 0.4);
        assert!(border.is_empty());
    }

    #[test]
    fn no_threads_gives_no_border() {
        assert!(satin_border(&[], Argb::BLACK, 2.0, 0.4).is_empty());
    }

    #[test]
    fn collinear_points_give_no_border() {
        let t = thread(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (3.0, 3.0)]);
        assert!(satin_border(&[t], Argb::BLACK, 2.0, 0.4).is_empty());
    }

    #[test]
    fn thin_or_sparse_border_is_disabled() {
        assert!(!border_enabled(0.1, 0.4));
        assert!(!border_enabled(2.0, 0.05));
        assert!(border_enabled(0.11, 0.06));
        assert!(satin_border(&[square_thread()], Argb::BLACK, 0.0, 0.4).is_empty());
    }

    #[test]
    fn border_surrounds_design() {
        let border = satin_border(&[square_thread()], Argb::BLACK, 2.0, 0.4);
        assert_eq!(border.len(), 1);
        let t = &border[0];
        assert_eq!(t.color, Argb::BLACK);
        assert!(t.absolute);
        assert!(t.stitches.len() > 100);

        // Every stitch lies in the band between the hull and
        // `thickness` beyond it.
        for p in &t.stitches {
            let ox = ((p.x - 5.0).abs() - 5.0).max(0.0);
            let oy = ((p.y - 5.0).abs() - 5.0).max(0.0);
            let d = ox.hypot(oy);
            assert!(d <= 2.0 + 1e-3, "{p:?} is {d} mm out");
        }
    }

    #[test]
    fn border_path_closes_on_start() {
        let border = satin_border(&[square_thread()], Argb::BLACK, 2.0, 0.4);
        let stitches = &border[0].stitches;
        assert_eq!(stitches.first(), stitches.last());
    }

    #[test]
    fn border_considers_relative_threads() {
        let relative = square_thread().to_relative(Point::default());
        let a = satin_border(&[relative], Argb::BLACK, 2.0, 0.4);
        let b = satin_border(&[square_thread()], Argb::BLACK, 2.0, 0.4);
        assert_eq!(a, b);
    }

    #[test]
    fn relative_thread_after_absolute_continues_from_needle() {
        let start = thread(&[(100.0, 100.0)]);
        let relative = square_thread().to_relative(Point::new(100.0, 100.0));
        let a = satin_border(&[start.clone(), relative], Argb::BLACK, 2.0, 0.4);
        let b = satin_border(&[start, square_thread()], Argb::BLACK, 2.0, 0.4);
        assert_eq!(a, b);
    }

    #[test]
    fn zig_zag_alternates_sides() {
        let outline = vec![
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(4.0, 4.0),
            Point::new(0.0, 4.0),
        ];
        let path = zig_zag(&outline, 1.0, 1.0);
        // First segment runs along +x with normal (0, -1).
        assert_eq!(path[0], Point::new(0.0, 0.0));
        assert_eq!(path[1], Point::new(0.0, -0.5));
        assert_eq!(path[2], Point::new(0.25, 0.5));
        assert_eq!(path[3], Point::new(0.75, -0.5));
        assert_eq!(path.last(), Some(&Point::new(0.0, 0.0)));
    }

    #[test]
    fn zig_zag_emits_two_points_per_step() {
        let outline = vec![Point::new(0.0, 0.0), Point::new(4.0, 0.0)];
        // Two segments (there and back), each 4 steps long: 2 + 8 each,
        // plus the closing point.
        assert_eq!(zig_zag(&outline, 1.0, 1.0).len(), 21);
    }

    #[test]
    fn zig_zag_skips_degenerate_segments() {
        let outline = vec![
            Point::new(0.0, 0.0),
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
        ];
        let path = zig_zag(&outline, 1.0, 1.0);
        assert!(path.iter().all(|p| p.x.is_finite() && p.y.is_finite()));
        assert!(!path.is_empty());
    }

    #[test]
    fn zig_zag_of_tiny_outline_is_empty() {
        assert!(zig_zag(&[Point::new(1.0, 1.0)], 1.0, 1.0).is_empty());
    }
}
