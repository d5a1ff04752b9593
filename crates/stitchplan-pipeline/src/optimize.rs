//! Strand ordering: reorder and orient strands to minimize jump travel.
//!
//! Uses a nearest-neighbor greedy heuristic on strand endpoints. Each
//! remaining strand is scored by the nearer of its two endpoints to the
//! current needle position, and is reversed when its end is strictly
//! closer than its start.
//!
//! Runs once per color, between strandizing and thread assembly.

use crate::types::{Point, Strand};

/// Reorder and orient strands to minimize total jump distance.
///
/// Empty strands are dropped and the first remaining strand is stitched
/// as-is. After that the needle always moves to the pool strand with the
/// nearest endpoint, entering it end-first when that end is strictly
/// closer. Ties go to the strand that came first in the input.
#[must_use = "returns the optimized strand ordering"]
pub fn order_strands(strands: &[Strand]) -> Vec<Strand> {
    let mut pool: Vec<Strand> = strands.iter().filter(|s| !s.is_empty()).cloned().collect();
    if pool.is_empty() {
        return Vec::new();
    }

    let mut ordered = Vec::with_capacity(pool.len());
    let first = pool.remove(0);
    let mut needle = first.last().copied().unwrap_or_default();
    ordered.push(first);

    while let Some((index, reversed)) = nearest_strand(&pool, needle) {
        let mut strand = pool.remove(index);
        if reversed {
            let mut points = strand.into_points();
            points.reverse();
            strand = Strand::new(points);
        }
        needle = strand.last().copied().unwrap_or(needle);
        ordered.push(strand);
    }

    ordered
}

/// The pool strand whose nearer endpoint is closest to `needle`, and
/// whether to enter it from its end.
fn nearest_strand(pool: &[Strand], needle: Point) -> Option<(usize, bool)> {
    pool.iter()
        .enumerate()
        .filter_map(|(i, strand)| {
            let to_start = needle.distance_squared(*strand.first()?);
            let to_end = needle.distance_squared(*strand.last()?);
            Some(if to_end < to_start {
                (i, true, to_end)
            } else {
                (i, false, to_start)
            })
        })
        // `min_by` keeps the first of equal elements.
        .min_by(|a, b| a.2.total_cmp(&b.2))
        .map(|(i, reversed, _)| (i, reversed))
}

/// Order `strands` with [`order_strands`] and flatten them into one
/// stitch sequence.
#[must_use = "returns the ordered stitch sequence"]
pub fn order_strands_minimizing_jumps(strands: &[Strand]) -> Vec<Point> {
    order_strands(strands)
        .into_iter()
        .flat_map(Strand::into_points)
        .collect()
}

/// Sum of the gaps between consecutive strands, in the given order.
#[must_use]
pub fn jump_distance(strands: &[Strand]) -> f64 {
    strands
        .iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .windows(2)
        .map(|w| match (w[0].last(), w[1].first()) {
            (Some(a), Some(b)) => a.distance(*b),
            _ => 0.0,
        })
        .sum()
}
