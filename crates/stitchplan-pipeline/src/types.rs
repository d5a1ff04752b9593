//! Shared types for the stitchplan pipeline.

use std::ops::{Add, Div, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

use crate::color::Argb;
use crate::downsample::DownsampleFilter;
use crate::histogram::Histogram;
use crate::strand::ColorStrands;

/// Re-export `RgbaImage` so downstream crates can reference raster
/// intermediates without depending on `image` directly.
pub use image::RgbaImage;

/// Vectors shorter than this (in millimetres) count as degenerate.
pub const DEGENERATE_LENGTH_MM: f64 = 0.01;

/// A 2D point in millimetre space.
///
/// Also used as a 2D vector for segment directions and offsets.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (millimetres from the left edge).
    pub x: f64,
    /// Vertical position (millimetres from the top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Length of this point read as a vector from the origin.
    #[must_use]
    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    /// The vector rotated a quarter turn: `(y, -x)`.
    #[must_use]
    pub const fn orthogonal(self) -> Self {
        Self::new(self.y, -self.x)
    }

    /// Unit vector in the same direction.
    ///
    /// A zero vector yields NaN components, which
    /// [`is_degenerate`](Self::is_degenerate) reports.
    #[must_use]
    pub fn normalize(self) -> Self {
        self / self.length()
    }

    /// Dot product.
    #[must_use]
    pub fn dot(self, other: Self) -> f64 {
        self.x.mul_add(other.x, self.y * other.y)
    }

    /// `true` for NaN components or a length below
    /// [`DEGENERATE_LENGTH_MM`].
    #[must_use]
    pub fn is_degenerate(self) -> bool {
        self.x.is_nan() || self.y.is_nan() || self.length() < DEGENERATE_LENGTH_MM
    }
}

impl Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f64> for Point {
    type Output = Self;

    fn div(self, rhs: f64) -> Self {
        Self::new(self.x / rhs, self.y / rhs)
    }
}

impl Neg for Point {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

/// A run of same-color samples that can be stitched without a jump.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Strand(Vec<Point>);

impl Strand {
    /// Create a new strand from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the strand has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the strand.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the first point, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Point> {
        self.0.first()
    }

    /// Returns the last point, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Point> {
        self.0.last()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Append a point.
    pub fn push(&mut self, point: Point) {
        self.0.push(point);
    }

    /// Consumes the strand and returns the underlying vector of points.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }
}

/// One colored thread path.
///
/// With `absolute == true` the stitches are needle positions in
/// millimetres. With `absolute == false` each stitch is a delta from the
/// previous needle position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    /// Thread color.
    pub color: Argb,
    /// Ordered stitch points.
    pub stitches: Vec<Point>,
    /// Whether `stitches` are absolute positions or relative deltas.
    pub absolute: bool,
}

impl Thread {
    /// An absolute thread.
    #[must_use]
    pub const fn absolute(color: Argb, stitches: Vec<Point>) -> Self {
        Self {
            color,
            stitches,
            absolute: true,
        }
    }

    /// The same path as absolute positions. Relative deltas accumulate
    /// from `start`.
    #[must_use]
    pub fn to_absolute(&self, start: Point) -> Self {
        if self.absolute {
            return self.clone();
        }
        let mut needle = start;
        let stitches = self
            .stitches
            .iter()
            .map(|delta| {
                needle = needle + *delta;
                needle
            })
            .collect();
        Self::absolute(self.color, stitches)
    }

    /// The same path as deltas, the first one measured from `start`.
    #[must_use]
    pub fn to_relative(&self, start: Point) -> Self {
        if !self.absolute {
            return self.clone();
        }
        let mut previous = start;
        let stitches = self
            .stitches
            .iter()
            .map(|p| {
                let delta = *p - previous;
                previous = *p;
                delta
            })
            .collect();
        Self {
            color: self.color,
            stitches,
            absolute: false,
        }
    }
}

/// Resolve a thread sequence into absolute threads.
///
/// The needle carries over from one thread to the next: a relative
/// thread continues from the last stitch of the thread before it, and
/// the first thread starts at the origin. Threads without stitches
/// leave the needle where it was.
#[must_use]
pub fn absolute_threads(threads: &[Thread]) -> Vec<Thread> {
    let mut needle = Point::default();
    threads
        .iter()
        .map(|thread| {
            let resolved = thread.to_absolute(needle);
            if let Some(&last) = resolved.stitches.last() {
                needle = last;
            }
            resolved
        })
        .collect()
}

/// A named set of threads, stitched in order.
///
/// Built fresh for every conversion and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embroidery {
    /// Design name.
    pub name: String,
    /// Threads in stitching order.
    pub threads: Vec<Thread>,
}

impl Embroidery {
    /// Total number of stitches across all threads.
    #[must_use]
    pub fn stitch_count(&self) -> usize {
        self.threads.iter().map(|t| t.stitches.len()).sum()
    }

    /// Every thread as absolute positions. See [`absolute_threads`].
    #[must_use]
    pub fn absolute_threads(&self) -> Vec<Thread> {
        absolute_threads(&self.threads)
    }

    /// Every stitch as an absolute position, in stitching order.
    pub fn absolute_stitches(&self) -> impl Iterator<Item = Point> {
        self.absolute_threads()
            .into_iter()
            .flat_map(|t| t.stitches)
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Color quantization parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantizeConfig {
    /// Upper bound on opaque colors in the output. Must be at least 1.
    pub max_colors: usize,

    /// Starting merge tolerance in L\*a\*b\* units. Values below
    /// [`crate::quantize::MIN_TOLERANCE`] are raised to it.
    pub min_tolerance: u32,

    /// Opaque buckets with fewer pixels than this are dropped after each
    /// merge pass. `0` disables the filter.
    pub min_bucket_count: u32,
}

impl QuantizeConfig {
    /// Default color budget.
    pub const DEFAULT_MAX_COLORS: usize = 3;
    /// Default starting tolerance.
    pub const DEFAULT_MIN_TOLERANCE: u32 = 100;
    /// Default noise floor (disabled).
    pub const DEFAULT_MIN_BUCKET_COUNT: u32 = 0;
}

impl Default for QuantizeConfig {
    fn default() -> Self {
        Self {
            max_colors: Self::DEFAULT_MAX_COLORS,
            min_tolerance: Self::DEFAULT_MIN_TOLERANCE,
            min_bucket_count: Self::DEFAULT_MIN_BUCKET_COUNT,
        }
    }
}

/// Stitch planning parameters. All lengths are millimetres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Physical width. `None` derives it from `height_mm` and the
    /// bitmap's aspect ratio.
    pub width_mm: Option<f64>,

    /// Physical height.
    pub height_mm: f64,

    /// Horizontal grid spacing between samples.
    pub density_x_mm: f64,

    /// Vertical grid spacing between samples.
    pub density_y_mm: f64,

    /// A new strand starts when the next same-color sample is farther
    /// than `jump_factor` grid-cell diagonals from the last one.
    pub jump_factor: f64,

    /// Satin border width. Borders are only generated above
    /// [`crate::satin::MIN_BORDER_THICKNESS_MM`].
    pub border_thickness_mm: f64,

    /// Satin zig-zag spacing. Borders are only generated above
    /// [`crate::satin::MIN_BORDER_DENSITY_MM`].
    pub border_density_mm: f64,

    /// Satin border thread color.
    pub border_color: Argb,
}

impl PlannerConfig {
    /// Default physical height.
    pub const DEFAULT_HEIGHT_MM: f64 = 50.0;
    /// Default horizontal density.
    pub const DEFAULT_DENSITY_X_MM: f64 = 0.5;
    /// Default vertical density.
    pub const DEFAULT_DENSITY_Y_MM: f64 = 0.2;
    /// Default strand break multiplier.
    pub const DEFAULT_JUMP_FACTOR: f64 = 2.0;
    /// Default satin border width.
    pub const DEFAULT_BORDER_THICKNESS_MM: f64 = 2.0;
    /// Default satin zig-zag spacing.
    pub const DEFAULT_BORDER_DENSITY_MM: f64 = 0.4;

    /// Resolve the physical `(width, height)` for a bitmap.
    ///
    /// A zero-height bitmap keeps a zero width rather than dividing by
    /// zero.
    #[must_use]
    pub fn physical_size(&self, dimensions: Dimensions) -> (f64, f64) {
        let width = self.width_mm.unwrap_or_else(|| {
            if dimensions.height == 0 {
                0.0
            } else {
                self.height_mm * f64::from(dimensions.width) / f64::from(dimensions.height)
            }
        });
        (width, self.height_mm)
    }

    /// The strand break distance for this grid.
    #[must_use]
    pub fn max_stitch_distance(&self) -> f64 {
        self.density_x_mm.hypot(self.density_y_mm) * self.jump_factor
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            width_mm: None,
            height_mm: Self::DEFAULT_HEIGHT_MM,
            density_x_mm: Self::DEFAULT_DENSITY_X_MM,
            density_y_mm: Self::DEFAULT_DENSITY_Y_MM,
            jump_factor: Self::DEFAULT_JUMP_FACTOR,
            border_thickness_mm: Self::DEFAULT_BORDER_THICKNESS_MM,
            border_density_mm: Self::DEFAULT_BORDER_DENSITY_MM,
            border_color: Argb::BLACK,
        }
    }
}

/// Configuration for the full image-to-embroidery pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Embroidery name carried into the output.
    pub name: String,

    /// Decoded images taller than this are scaled down to it (aspect
    /// ratio preserved) before quantization.
    pub working_height: u32,

    /// Resampling filter for the downsample step.
    pub downsample_filter: DownsampleFilter,

    /// Color quantization parameters.
    pub quantize: QuantizeConfig,

    /// Stitch planning parameters.
    pub planner: PlannerConfig,
}

impl PipelineConfig {
    /// Default embroidery name.
    pub const DEFAULT_NAME: &'static str = "embroidery";
    /// Default working height in pixels.
    pub const DEFAULT_WORKING_HEIGHT: u32 = 512;
    /// Default downsample filter.
    pub const DEFAULT_DOWNSAMPLE_FILTER: DownsampleFilter = DownsampleFilter::Nearest;

    /// Check every invariant the pipeline relies on.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first
    /// offending field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.working_height == 0 {
            return Err(PipelineError::InvalidConfig(
                "working_height must be at least 1".to_string(),
            ));
        }
        validate_quantize(&self.quantize)?;
        validate_planner(&self.planner)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: Self::DEFAULT_NAME.to_string(),
            working_height: Self::DEFAULT_WORKING_HEIGHT,
            downsample_filter: Self::DEFAULT_DOWNSAMPLE_FILTER,
            quantize: QuantizeConfig::default(),
            planner: PlannerConfig::default(),
        }
    }
}

/// Check the quantizer preconditions.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `max_colors` is zero.
pub fn validate_quantize(config: &QuantizeConfig) -> Result<(), PipelineError> {
    if config.max_colors == 0 {
        return Err(PipelineError::InvalidConfig(
            "max_colors must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Check the planner preconditions.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] for non-finite or
/// non-positive sizes, densities or jump factor, and for negative or
/// non-finite border parameters.
pub fn validate_planner(config: &PlannerConfig) -> Result<(), PipelineError> {
    let positive = [
        ("height_mm", config.height_mm),
        ("density_x_mm", config.density_x_mm),
        ("density_y_mm", config.density_y_mm),
        ("jump_factor", config.jump_factor),
    ];
    for (field, value) in positive {
        if !value.is_finite() || value <= 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "{field} must be finite and positive, got {value}"
            )));
        }
    }
    if let Some(width) = config.width_mm
        && (!width.is_finite() || width <= 0.0)
    {
        return Err(PipelineError::InvalidConfig(format!(
            "width_mm must be finite and positive, got {width}"
        )));
    }
    let non_negative = [
        ("border_thickness_mm", config.border_thickness_mm),
        ("border_density_mm", config.border_density_mm),
    ];
    for (field, value) in non_negative {
        if !value.is_finite() || value < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "{field} must be finite and non-negative, got {value}"
            )));
        }
    }
    Ok(())
}

/// Result of running the full pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessResult {
    /// The stitch plan.
    pub embroidery: Embroidery,

    /// Histogram of the quantized working image.
    pub histogram: Histogram,

    /// Dimensions of the working (downsampled) image in pixels.
    pub dimensions: Dimensions,
}

/// Result of running the pipeline with all intermediate stage outputs
/// preserved.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// Original decoded RGBA image.
    pub original: RgbaImage,
    /// Working-resolution image.
    pub downsampled: RgbaImage,
    /// Quantized working image.
    pub quantized: RgbaImage,
    /// Histogram of `quantized`.
    pub histogram: Histogram,
    /// Per-color strands in sampling order.
    pub strands: Vec<ColorStrands>,
    /// Final stitch plan.
    pub embroidery: Embroidery,
    /// Working image dimensions in pixels.
    pub dimensions: Dimensions,
}

/// Errors that can occur during pipeline processing.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}
