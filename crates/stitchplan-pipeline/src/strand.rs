//! Grid sampling: split a quantized bitmap into same-color strands.
//!
//! The physical design area is covered by a regular grid with
//! `density_x_mm` / `density_y_mm` spacing. Each cell samples the pixel
//! under its top-left corner. Samples are visited row by row, and each
//! color keeps a running strand that is cut whenever the next sample of
//! that color is too far from the previous one.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bitmap::Bitmap;
use crate::color::Argb;
use crate::histogram::Histogram;
use crate::types::{Dimensions, PlannerConfig, Point, Strand};

/// Physical sampling grid for one bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StitchGrid {
    /// Design width in millimetres.
    pub width_mm: f64,
    /// Design height in millimetres.
    pub height_mm: f64,
    /// Horizontal sample spacing.
    pub density_x_mm: f64,
    /// Vertical sample spacing.
    pub density_y_mm: f64,
    /// Samples farther apart than this start a new strand.
    pub max_stitch_distance: f64,
}

impl StitchGrid {
    /// Resolve the grid for a bitmap of the given size.
    #[must_use]
    pub fn new(config: &PlannerConfig, dimensions: Dimensions) -> Self {
        let (width_mm, height_mm) = config.physical_size(dimensions);
        Self {
            width_mm,
            height_mm,
            density_x_mm: config.density_x_mm,
            density_y_mm: config.density_y_mm,
            max_stitch_distance: config.max_stitch_distance(),
        }
    }

    /// Number of sample rows: `floor(height_mm / density_y_mm)`.
    #[must_use]
    pub fn rows(&self) -> u32 {
        cell_count(self.height_mm, self.density_y_mm)
    }

    /// Number of sample columns: `floor(width_mm / density_x_mm)`.
    #[must_use]
    pub fn cols(&self) -> u32 {
        cell_count(self.width_mm, self.density_x_mm)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn cell_count(extent: f64, spacing: f64) -> u32 {
    let n = (extent / spacing).floor();
    if n.is_finite() && n > 0.0 {
        n.min(f64::from(u32::MAX)) as u32
    } else {
        0
    }
}

/// The strands of one color, in sampling order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorStrands {
    /// Thread color.
    pub color: Argb,
    /// Non-empty strands.
    pub strands: Vec<Strand>,
}

impl ColorStrands {
    /// Total points across all strands.
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.strands.iter().map(Strand::len).sum()
    }
}

/// Sample `bitmap` on `grid` and group the samples into strands.
///
/// Cell `(x, y)` reads pixel `(floor(x / cols * width), floor(y / rows *
/// height))` and sits at `(x * density_x_mm, y * density_y_mm)`.
/// Non-opaque samples and colors missing from `histogram` are skipped.
/// Output follows histogram color order; colors that never produced a
/// sample are omitted.
#[must_use]
pub fn strandize<B: Bitmap + ?Sized>(
    bitmap: &B,
    histogram: &Histogram,
    grid: &StitchGrid,
) -> Vec<ColorStrands> {
    let mut groups: Vec<Group> = histogram
        .colors()
        .map(|color| Group {
            color,
            strands: Vec::new(),
            current: Strand::default(),
        })
        .collect();
    let slot: HashMap<Argb, usize> = groups
        .iter()
        .enumerate()
        .map(|(i, g)| (g.color, i))
        .collect();

    let (rows, cols) = (grid.rows(), grid.cols());
    if bitmap.is_empty() || rows == 0 || cols == 0 {
        debug!(rows, cols, "nothing to sample");
        return Vec::new();
    }
    let (width, height) = (u64::from(bitmap.width()), u64::from(bitmap.height()));

    for y in 0..rows {
        let py = sample_index(y, rows, height);
        for x in 0..cols {
            let px = sample_index(x, cols, width);
            let color = bitmap.pixel(px, py);
            if !color.is_opaque() {
                continue;
            }
            let Some(&i) = slot.get(&color) else {
                continue;
            };
            let point = Point::new(
                f64::from(x) * grid.density_x_mm,
                f64::from(y) * grid.density_y_mm,
            );
            groups[i].add(point, grid.max_stitch_distance);
        }
    }

    let result: Vec<ColorStrands> = groups
        .into_iter()
        .filter_map(Group::finish)
        .collect();
    debug!(
        rows,
        cols,
        colors = result.len(),
        strands = result.iter().map(|c| c.strands.len()).sum::<usize>(),
        "strandized"
    );
    result
}

/// `floor(i / n * size)` in integer arithmetic.
#[allow(clippy::cast_possible_truncation)]
fn sample_index(i: u32, n: u32, size: u64) -> u32 {
    (u64::from(i) * size / u64::from(n)) as u32
}

struct Group {
    color: Argb,
    strands: Vec<Strand>,
    current: Strand,
}

impl Group {
    fn add(&mut self, point: Point, max_distance: f64) {
        if let Some(last) = self.current.last()
            && last.distance(point) > max_distance
        {
            self.strands.push(std::mem::take(&mut self.current));
        }
        self.current.push(point);
    }

    fn finish(mut self) -> Option<ColorStrands> {
        if !self.current.is_empty() {
            self.strands.push(self.current);
        }
        (!self.strands.is_empty()).then_some(ColorStrands {
            color: self.color,
            strands: self.strands,
        })
    }
}
