//! Color quantization: reduce a bitmap to a bounded thread palette.
//!
//! Quantization runs on the histogram, not on pixels. Merge passes fold
//! perceptually close buckets together until at most `max_colors`
//! opaque buckets remain, widening the tolerance if the base passes are
//! not enough. A pass stops folding as soon as the budget is met, so a
//! wide tolerance never collapses the palette below `max_colors`. If the passes still leave too many buckets, the palette
//! is cut to the most frequent colors. Finally every opaque pixel is
//! repainted with its nearest retained color.

use std::collections::HashMap;

use image::RgbaImage;
use palette::Lab;
use palette::white_point::D65;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bitmap::{Bitmap, to_rgba_image};
use crate::color::{Argb, lab_distance};
use crate::histogram::{Histogram, compute_histogram};
use crate::types::{PipelineError, QuantizeConfig, validate_quantize};

/// Smallest usable merge tolerance. Lower values are raised to this.
pub const MIN_TOLERANCE: u32 = 4;

/// Merge passes run at the starting tolerance.
pub const BASE_PASSES: usize = 3;

/// Additional passes with a widening tolerance.
pub const ESCALATION_PASSES: usize = 10;

/// Tolerance multiplier applied before each escalation pass.
pub const ESCALATION_FACTOR: f32 = 1.5;

/// Output of [`reduce_colors`].
#[derive(Debug, Clone)]
pub struct Reduction {
    /// The repainted bitmap.
    pub image: RgbaImage,
    /// Histogram of `image`.
    pub histogram: Histogram,
    /// How the palette was reached.
    pub stats: QuantizeStats,
}

/// Bookkeeping from one quantization run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantizeStats {
    /// Distinct opaque colors in the input.
    pub input_colors: usize,
    /// Opaque colors after quantization.
    pub output_colors: usize,
    /// Merge passes actually executed.
    pub merge_passes: usize,
    /// Tolerance the run started from (after clamping).
    pub start_tolerance: f32,
    /// Tolerance of the last merge pass (the start tolerance if none ran).
    pub final_tolerance: f32,
    /// Whether the palette had to be cut to the most frequent colors.
    pub truncated: bool,
}

/// Reduce `bitmap` to at most `config.max_colors` opaque colors.
///
/// Non-opaque pixels come out as `0x00000000`. The returned histogram is
/// taken from the repainted image, so its counts still sum to the pixel
/// count and its opaque keys are exactly the retained palette.
///
/// A zero-area bitmap yields an empty copy and an empty histogram. A
/// bitmap without opaque pixels yields a copy and a transparent-only
/// histogram.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config.max_colors` is
/// zero.
pub fn reduce_colors<B: Bitmap + ?Sized>(
    bitmap: &B,
    config: &QuantizeConfig,
) -> Result<Reduction, PipelineError> {
    validate_quantize(config)?;

    let tolerance = if config.min_tolerance < MIN_TOLERANCE {
        warn!(
            requested = config.min_tolerance,
            used = MIN_TOLERANCE,
            "merge tolerance too small, raising it"
        );
        MIN_TOLERANCE
    } else {
        config.min_tolerance
    };
    #[allow(clippy::cast_precision_loss)]
    let start_tolerance = tolerance as f32;

    if bitmap.is_empty() {
        debug!("empty bitmap, nothing to quantize");
        return Ok(Reduction {
            image: to_rgba_image(bitmap),
            histogram: Histogram::default(),
            stats: QuantizeStats::unchanged(0, start_tolerance),
        });
    }

    let histogram = compute_histogram(bitmap);
    let input_colors = histogram.opaque_len();
    if input_colors == 0 {
        debug!("no opaque pixels, nothing to quantize");
        return Ok(Reduction {
            image: to_rgba_image(bitmap),
            histogram,
            stats: QuantizeStats::unchanged(0, start_tolerance),
        });
    }

    let max_colors = config.max_colors;
    let floor = u64::from(config.min_bucket_count);
    let pass = |h: &Histogram, tolerance: f32| {
        let merged = h.merge_similar_to(tolerance, max_colors);
        if floor > 0 {
            merged.without_low_counts(floor)
        } else {
            merged
        }
    };

    let mut current = histogram;
    let mut tolerance = start_tolerance;
    let mut merge_passes = 0;

    for _ in 0..BASE_PASSES {
        if current.opaque_len() <= max_colors {
            break;
        }
        current = pass(&current, tolerance);
        merge_passes += 1;
        debug!(pass = merge_passes, tolerance, colors = current.opaque_len(), "merge pass");
    }

    for _ in 0..ESCALATION_PASSES {
        if current.opaque_len() <= max_colors {
            break;
        }
        tolerance *= ESCALATION_FACTOR;
        current = pass(&current, tolerance);
        merge_passes += 1;
        debug!(pass = merge_passes, tolerance, colors = current.opaque_len(), "merge pass");
    }

    let truncated = current.opaque_len() > max_colors;
    if truncated {
        warn!(
            colors = current.opaque_len(),
            max_colors, "merge passes did not converge, keeping the most frequent colors"
        );
        current = current.top(max_colors);
    }

    let image = repaint(bitmap, &current);
    let histogram = compute_histogram(&image);
    let output_colors = histogram.opaque_len();
    info!(input_colors, output_colors, merge_passes, truncated, "quantized");

    Ok(Reduction {
        image,
        histogram,
        stats: QuantizeStats {
            input_colors,
            output_colors,
            merge_passes,
            start_tolerance,
            final_tolerance: tolerance,
            truncated,
        },
    })
}

impl QuantizeStats {
    const fn unchanged(input_colors: usize, tolerance: f32) -> Self {
        Self {
            input_colors,
            output_colors: input_colors,
            merge_passes: 0,
            start_tolerance: tolerance,
            final_tolerance: tolerance,
            truncated: false,
        }
    }
}

/// Repaint every opaque pixel with its perceptually nearest palette
/// color and every other pixel with [`Argb::TRANSPARENT`].
fn repaint<B: Bitmap + ?Sized>(bitmap: &B, palette: &Histogram) -> RgbaImage {
    let palette: Vec<(Argb, Lab<D65, f32>)> =
        palette.colors().map(|c| (c, c.to_lab())).collect();
    let mut nearest_cache: HashMap<Argb, Argb> = HashMap::new();

    RgbaImage::from_fn(bitmap.width(), bitmap.height(), |x, y| {
        let color = bitmap.pixel(x, y);
        if !color.is_opaque() {
            return Argb::TRANSPARENT.to_rgba();
        }
        nearest_cache
            .entry(color)
            .or_insert_with(|| nearest(color, &palette))
            .to_rgba()
    })
}

/// The palette color closest to `color`. Ties go to the earlier entry.
fn nearest(color: Argb, palette: &[(Argb, Lab<D65, f32>)]) -> Argb {
    let lab = color.to_lab();
    palette
        .iter()
        .map(|(c, key)| (*c, lab_distance(*key, lab)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map_or(Argb::TRANSPARENT, |(c, _)| c)
}
