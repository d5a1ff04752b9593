//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::process`] which runs everything in one call,
//! [`Pipeline`] lets the caller drive execution one step at a time and
//! stop between phases:
//!
//! ```rust
//! # use stitchplan_pipeline::{Pipeline, PipelineConfig, PipelineError};
//! # fn run(png: Vec<u8>) -> Result<(), PipelineError> {
//! let planned = Pipeline::new(png, PipelineConfig::default())
//!     .decode()?
//!     .downsample()
//!     .quantize()?
//!     .strandize()
//!     .order()
//!     .border();
//!
//! let staged = planned.into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline
//! state (or `Result` for fallible stages), carrying all previously
//! computed intermediates. The configuration is validated once, when
//! the source is decoded.
//!
//! # Memory
//!
//! Every stage from [`Quantized`] onward keeps the original, working
//! and quantized rasters alive until [`Planned::into_result`] consumes
//! the final stage. Callers that only need the embroidery should prefer
//! [`crate::process`].

use image::DynamicImage;

use crate::diagnostics::StageMetrics;
use crate::histogram::Histogram;
use crate::optimize::{jump_distance, order_strands};
use crate::quantize::{QuantizeStats, reduce_colors};
use crate::satin::{border_enabled, satin_border};
use crate::strand::{ColorStrands, StitchGrid, strandize};
use crate::types::{
    Dimensions, Embroidery, PipelineConfig, PipelineError, RgbaImage, StagedResult, Strand, Thread,
};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// Call [`decode`](Self::decode) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing, call .decode() to continue"]
pub struct Pending {
    config: PipelineConfig,
    source: Vec<u8>,
}

impl Pending {
    /// The raw source image bytes.
    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Validate the configuration, decode the source image and advance
    /// to the [`Decoded`] stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the configuration is
    /// invalid, [`PipelineError::EmptyInput`] if the source bytes are
    /// empty, and [`PipelineError::ImageDecode`] if the image format is
    /// unrecognized or the data is corrupt.
    pub fn decode(self) -> Result<Decoded, PipelineError> {
        self.config.validate()?;
        let source_len = self.source.len();
        let image = crate::bitmap::decode(&self.source)?;
        let original = image.to_rgba8();
        Ok(Decoded {
            config: self.config,
            image,
            original,
            source_len,
        })
    }
}

// ───────────────────────── Stage 1: Decoded ──────────────────────────

/// Pipeline state after decoding the source image.
#[must_use = "pipeline stages are consumed by advancing, call .downsample() to continue"]
pub struct Decoded {
    config: PipelineConfig,
    image: DynamicImage,
    original: RgbaImage,
    source_len: usize,
}

impl Decoded {
    /// The original decoded RGBA image.
    #[must_use]
    pub const fn original(&self) -> &RgbaImage {
        &self.original
    }

    /// Advance to the downsample stage.
    pub fn downsample(self) -> Downsampled {
        let (downsampled, applied) = crate::downsample::downsample(
            &self.image,
            self.config.working_height,
            self.config.downsample_filter,
        );
        Downsampled {
            config: self.config,
            original: self.original,
            rgba: downsampled.to_rgba8(),
            applied,
        }
    }
}

// ───────────────────────── Stage 2: Downsampled ──────────────────────

/// Pipeline state after scaling to the working height.
#[must_use = "pipeline stages are consumed by advancing, call .quantize() to continue"]
#[allow(clippy::struct_field_names)]
pub struct Downsampled {
    config: PipelineConfig,
    original: RgbaImage,
    rgba: RgbaImage,
    applied: bool,
}

impl Downsampled {
    /// The working-resolution RGBA image.
    #[must_use]
    pub const fn downsampled(&self) -> &RgbaImage {
        &self.rgba
    }

    /// Whether downsampling was actually applied.
    #[must_use]
    pub const fn applied(&self) -> bool {
        self.applied
    }

    /// Advance to the quantize stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the quantizer
    /// settings are invalid.
    pub fn quantize(self) -> Result<Quantized, PipelineError> {
        let dimensions = Dimensions {
            width: self.rgba.width(),
            height: self.rgba.height(),
        };
        let reduction = reduce_colors(&self.rgba, &self.config.quantize)?;
        Ok(Quantized {
            config: self.config,
            original: self.original,
            downsampled: self.rgba,
            quantized: reduction.image,
            histogram: reduction.histogram,
            stats: reduction.stats,
            dimensions,
        })
    }
}

// ───────────────────────── Stage 3: Quantized ────────────────────────

/// Pipeline state after color quantization.
#[must_use = "pipeline stages are consumed by advancing, call .strandize() to continue"]
pub struct Quantized {
    config: PipelineConfig,
    original: RgbaImage,
    downsampled: RgbaImage,
    quantized: RgbaImage,
    histogram: Histogram,
    stats: QuantizeStats,
    dimensions: Dimensions,
}

impl Quantized {
    /// The quantized working image.
    #[must_use]
    pub const fn quantized(&self) -> &RgbaImage {
        &self.quantized
    }

    /// Histogram of the quantized image.
    #[must_use]
    pub const fn histogram(&self) -> &Histogram {
        &self.histogram
    }

    /// How the palette was reached.
    #[must_use]
    pub const fn stats(&self) -> &QuantizeStats {
        &self.stats
    }

    /// Advance to the strandize stage.
    pub fn strandize(self) -> Strandized {
        let grid = StitchGrid::new(&self.config.planner, self.dimensions);
        let strands = strandize(&self.quantized, &self.histogram, &grid);
        Strandized {
            config: self.config,
            original: self.original,
            downsampled: self.downsampled,
            quantized: self.quantized,
            histogram: self.histogram,
            dimensions: self.dimensions,
            grid,
            strands,
        }
    }
}

// ───────────────────────── Stage 4: Strandized ───────────────────────

/// Pipeline state after grid sampling.
#[must_use = "pipeline stages are consumed by advancing, call .order() to continue"]
pub struct Strandized {
    config: PipelineConfig,
    original: RgbaImage,
    downsampled: RgbaImage,
    quantized: RgbaImage,
    histogram: Histogram,
    dimensions: Dimensions,
    grid: StitchGrid,
    strands: Vec<ColorStrands>,
}

impl Strandized {
    /// Per-color strands in sampling order.
    #[must_use]
    pub fn strands(&self) -> &[ColorStrands] {
        &self.strands
    }

    /// The sampling grid.
    #[must_use]
    pub const fn grid(&self) -> &StitchGrid {
        &self.grid
    }

    /// Advance to the order stage: one thread per color with strands
    /// reordered to minimize jumps.
    pub fn order(self) -> Ordered {
        let mut jump_before_mm = 0.0;
        let mut jump_after_mm = 0.0;
        let threads: Vec<Thread> = self
            .strands
            .iter()
            .filter_map(|group| {
                let ordered = order_strands(&group.strands);
                jump_before_mm += jump_distance(&group.strands);
                jump_after_mm += jump_distance(&ordered);
                let stitches: Vec<_> = ordered.into_iter().flat_map(Strand::into_points).collect();
                (!stitches.is_empty()).then(|| Thread::absolute(group.color, stitches))
            })
            .collect();
        Ordered {
            config: self.config,
            original: self.original,
            downsampled: self.downsampled,
            quantized: self.quantized,
            histogram: self.histogram,
            dimensions: self.dimensions,
            strands: self.strands,
            threads,
            jump_before_mm,
            jump_after_mm,
        }
    }
}

// ───────────────────────── Stage 5: Ordered ──────────────────────────

/// Pipeline state after strand ordering.
#[must_use = "pipeline stages are consumed by advancing, call .border() to continue"]
pub struct Ordered {
    config: PipelineConfig,
    original: RgbaImage,
    downsampled: RgbaImage,
    quantized: RgbaImage,
    histogram: Histogram,
    dimensions: Dimensions,
    strands: Vec<ColorStrands>,
    threads: Vec<Thread>,
    jump_before_mm: f64,
    jump_after_mm: f64,
}

impl Ordered {
    /// One thread per color, without the border.
    #[must_use]
    pub fn threads(&self) -> &[Thread] {
        &self.threads
    }

    /// Advance to the final stage, appending the satin border when it is
    /// enabled.
    pub fn border(self) -> Planned {
        let planner = &self.config.planner;
        let border = satin_border(
            &self.threads,
            planner.border_color,
            planner.border_thickness_mm,
            planner.border_density_mm,
        );
        let border_stitches = border.iter().map(|t| t.stitches.len()).sum();
        let mut threads = self.threads;
        threads.extend(border);
        let embroidery = Embroidery {
            name: self.config.name.clone(),
            threads,
        };
        tracing::info!(
            threads = embroidery.threads.len(),
            stitches = embroidery.stitch_count(),
            "planned embroidery"
        );
        Planned {
            config: self.config,
            original: self.original,
            downsampled: self.downsampled,
            quantized: self.quantized,
            histogram: self.histogram,
            dimensions: self.dimensions,
            strands: self.strands,
            embroidery,
            border_stitches,
        }
    }
}

// ───────────────────────── Stage 6: Planned ──────────────────────────

/// Pipeline state after planning, the final stage.
///
/// Call [`into_result`](Self::into_result) to extract the
/// [`StagedResult`] containing all intermediates.
#[must_use = "call .into_result() to extract the StagedResult"]
pub struct Planned {
    config: PipelineConfig,
    original: RgbaImage,
    downsampled: RgbaImage,
    quantized: RgbaImage,
    histogram: Histogram,
    dimensions: Dimensions,
    strands: Vec<ColorStrands>,
    embroidery: Embroidery,
    border_stitches: usize,
}

impl Planned {
    /// The finished stitch plan.
    #[must_use]
    pub const fn embroidery(&self) -> &Embroidery {
        &self.embroidery
    }

    /// Working image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Consume the pipeline and return the full [`StagedResult`].
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        StagedResult {
            original: self.original,
            downsampled: self.downsampled,
            quantized: self.quantized,
            histogram: self.histogram,
            strands: self.strands,
            embroidery: self.embroidery,
            dimensions: self.dimensions,
        }
    }
}

// ──────────────────── PipelineStage trait + Stage enum ────────────────

/// Total number of stages in the pipeline.
pub const STAGE_COUNT: usize = 7;

/// The output produced by a single pipeline stage.
#[must_use]
pub enum StageOutput<'a> {
    /// Source image bytes (not yet decoded).
    Source {
        /// The raw image bytes.
        bytes: &'a [u8],
    },
    /// Decoded RGBA image.
    Decoded {
        /// The original image.
        original: &'a RgbaImage,
    },
    /// Working-resolution RGBA image.
    Downsampled {
        /// The downsampled image.
        downsampled: &'a RgbaImage,
    },
    /// Quantized image and its histogram.
    Quantized {
        /// The quantized image.
        quantized: &'a RgbaImage,
        /// Its histogram.
        histogram: &'a Histogram,
    },
    /// Per-color strands.
    Strandized {
        /// The strands.
        strands: &'a [ColorStrands],
    },
    /// Ordered per-color threads.
    Ordered {
        /// The threads.
        threads: &'a [Thread],
    },
    /// The finished embroidery.
    Planned {
        /// The stitch plan.
        embroidery: &'a Embroidery,
        /// Working image dimensions.
        dimensions: Dimensions,
    },
}

/// Trait implemented by every pipeline stage, enabling uniform iteration.
///
/// ```rust
/// # use stitchplan_pipeline::{Pipeline, PipelineConfig, PipelineError};
/// # use stitchplan_pipeline::pipeline::{Stage, Advance};
/// # fn run(png: Vec<u8>) -> Result<(), PipelineError> {
/// let mut stage: Stage = Pipeline::new(png, PipelineConfig::default()).into();
/// loop {
///     match stage.advance()? {
///         Advance::Next(next) => stage = next,
///         Advance::Complete(done) => { stage = done; break; }
///     }
/// }
/// let result = stage.complete()?;
/// # Ok(())
/// # }
/// ```
pub trait PipelineStage: Sized {
    /// Human-readable name of this stage (e.g. `"source"`, `"quantize"`).
    const NAME: &str;

    /// Zero-based index of this stage (`0` for Pending through `6` for
    /// Planned).
    const INDEX: usize;

    /// The output this stage produced.
    fn output(&self) -> StageOutput<'_>;

    /// Stage-specific metrics for diagnostics.
    ///
    /// Returns `None` for [`Pending`], which has not done any work yet.
    fn metrics(&self) -> Option<StageMetrics>;

    /// Advance to the next stage.
    ///
    /// Returns `Ok(Some(stage))` on success, `Ok(None)` if already at
    /// the final stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when decoding or quantization fails.
    fn next(self) -> Result<Option<Stage>, PipelineError>;

    /// Run all remaining stages and return the final [`StagedResult`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any remaining fallible stage fails.
    fn complete(self) -> Result<StagedResult, PipelineError>;
}

impl PipelineStage for Pending {
    const NAME: &str = "source";
    const INDEX: usize = 0;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Source {
            bytes: &self.source,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        None
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Decoded(self.decode()?)))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.decode()?.complete()
    }
}

impl PipelineStage for Decoded {
    const NAME: &str = "decode";
    const INDEX: usize = 1;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Decoded {
            original: &self.original,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Decode {
            input_bytes: self.source_len,
            width: self.original.width(),
            height: self.original.height(),
            pixel_count: u64::from(self.original.width()) * u64::from(self.original.height()),
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Downsampled(self.downsample())))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.downsample().complete()
    }
}

impl PipelineStage for Downsampled {
    const NAME: &str = "downsample";
    const INDEX: usize = 2;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Downsampled {
            downsampled: &self.rgba,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Downsample {
            original_width: self.original.width(),
            original_height: self.original.height(),
            width: self.rgba.width(),
            height: self.rgba.height(),
            working_height: self.config.working_height,
            filter: self.config.downsample_filter.to_string(),
            applied: self.applied,
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Quantized(self.quantize()?)))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.quantize()?.complete()
    }
}

impl PipelineStage for Quantized {
    const NAME: &str = "quantize";
    const INDEX: usize = 3;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Quantized {
            quantized: &self.quantized,
            histogram: &self.histogram,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Quantize {
            max_colors: self.config.quantize.max_colors,
            input_colors: self.stats.input_colors,
            output_colors: self.stats.output_colors,
            merge_passes: self.stats.merge_passes,
            start_tolerance: self.stats.start_tolerance,
            final_tolerance: self.stats.final_tolerance,
            truncated: self.stats.truncated,
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Strandized(self.strandize())))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.strandize().complete()
    }
}

impl PipelineStage for Strandized {
    const NAME: &str = "strandize";
    const INDEX: usize = 4;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Strandized {
            strands: &self.strands,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Strandize {
            width_mm: self.grid.width_mm,
            height_mm: self.grid.height_mm,
            rows: self.grid.rows(),
            cols: self.grid.cols(),
            color_count: self.strands.len(),
            strand_count: self.strands.iter().map(|c| c.strands.len()).sum(),
            point_count: self.strands.iter().map(ColorStrands::point_count).sum(),
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Ordered(self.order())))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.order().complete()
    }
}

impl PipelineStage for Ordered {
    const NAME: &str = "order";
    const INDEX: usize = 5;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Ordered {
            threads: &self.threads,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Order {
            thread_count: self.threads.len(),
            stitch_count: self.threads.iter().map(|t| t.stitches.len()).sum(),
            jump_before_mm: self.jump_before_mm,
            jump_after_mm: self.jump_after_mm,
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Planned(self.border())))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.border().complete()
    }
}

impl PipelineStage for Planned {
    const NAME: &str = "border";
    const INDEX: usize = 6;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Planned {
            embroidery: &self.embroidery,
            dimensions: self.dimensions,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        let planner = &self.config.planner;
        Some(StageMetrics::Border {
            enabled: border_enabled(planner.border_thickness_mm, planner.border_density_mm),
            thickness_mm: planner.border_thickness_mm,
            density_mm: planner.border_density_mm,
            stitch_count: self.border_stitches,
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(None)
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        Ok(self.into_result())
    }
}

/// Enum wrapping all pipeline stages for uniform, loopable access.
#[must_use]
pub enum Stage {
    /// See [`Pending`].
    Pending(Pending),
    /// See [`Decoded`].
    Decoded(Decoded),
    /// See [`Downsampled`].
    Downsampled(Downsampled),
    /// See [`Quantized`].
    Quantized(Quantized),
    /// See [`Strandized`].
    Strandized(Strandized),
    /// See [`Ordered`].
    Ordered(Ordered),
    /// See [`Planned`].
    Planned(Planned),
}

/// Compile-time guard: adding a [`Stage`] variant breaks this match,
/// a reminder to bump [`STAGE_COUNT`].
#[allow(dead_code, clippy::match_same_arms)]
const fn _stage_count_guard(s: &Stage) {
    match s {
        Stage::Pending(_)
        | Stage::Decoded(_)
        | Stage::Downsampled(_)
        | Stage::Quantized(_)
        | Stage::Strandized(_)
        | Stage::Ordered(_)
        | Stage::Planned(_) => {}
    }
}

/// Result of [`Stage::advance`]: either the next stage or the
/// completed final stage returned unchanged.
#[must_use]
pub enum Advance {
    /// The pipeline advanced to this next stage.
    Next(Stage),
    /// The pipeline was already at the final stage.
    Complete(Stage),
}

/// Delegate a method call to whichever `Stage` variant is active.
macro_rules! delegate {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            Self::Pending(s) => s.$method($($arg),*),
            Self::Decoded(s) => s.$method($($arg),*),
            Self::Downsampled(s) => s.$method($($arg),*),
            Self::Quantized(s) => s.$method($($arg),*),
            Self::Strandized(s) => s.$method($($arg),*),
            Self::Ordered(s) => s.$method($($arg),*),
            Self::Planned(s) => s.$method($($arg),*),
        }
    };
}

impl Stage {
    /// Human-readable name of the current stage.
    #[must_use]
    pub fn name(&self) -> &'static str {
        delegate!(self, name)
    }

    /// Zero-based index of the current stage.
    #[must_use]
    pub fn index(&self) -> usize {
        delegate!(self, index)
    }

    /// The output this stage produced.
    pub fn output(&self) -> StageOutput<'_> {
        delegate!(self, output)
    }

    /// Stage-specific metrics for diagnostics.
    #[must_use]
    pub fn metrics(&self) -> Option<StageMetrics> {
        delegate!(self, metrics)
    }

    /// Whether the pipeline is at the final stage.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Planned(_))
    }

    /// Advance to the next stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if a fallible stage transition fails.
    pub fn next(self) -> Result<Option<Self>, PipelineError> {
        delegate!(self, next)
    }

    /// Advance to the next stage, returning `self` unchanged if
    /// already complete.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if a fallible stage transition fails.
    pub fn advance(self) -> Result<Advance, PipelineError> {
        if self.is_complete() {
            return Ok(Advance::Complete(self));
        }
        #[allow(clippy::unreachable)]
        let next = self
            .next()?
            .unwrap_or_else(|| unreachable!("non-complete stage returned None from next()"));
        Ok(Advance::Next(next))
    }

    /// Run all remaining stages to completion.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any remaining fallible stage fails.
    pub fn complete(self) -> Result<StagedResult, PipelineError> {
        delegate!(self, complete)
    }
}

// `PipelineStage`'s associated constants are not callable as `self.NAME`,
// so the macro goes through this helper trait.
trait StageMetadata {
    fn name(&self) -> &'static str;
    fn index(&self) -> usize;
}

impl<T: PipelineStage> StageMetadata for T {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn index(&self) -> usize {
        T::INDEX
    }
}

impl From<Pending> for Stage {
    fn from(s: Pending) -> Self {
        Self::Pending(s)
    }
}

impl From<Decoded> for Stage {
    fn from(s: Decoded) -> Self {
        Self::Decoded(s)
    }
}

impl From<Downsampled> for Stage {
    fn from(s: Downsampled) -> Self {
        Self::Downsampled(s)
    }
}

impl From<Quantized> for Stage {
    fn from(s: Quantized) -> Self {
        Self::Quantized(s)
    }
}

impl From<Strandized> for Stage {
    fn from(s: Strandized) -> Self {
        Self::Strandized(s)
    }
}

impl From<Ordered> for Stage {
    fn from(s: Ordered) -> Self {
        Self::Ordered(s)
    }
}

impl From<Planned> for Stage {
    fn from(s: Planned) -> Self {
        Self::Planned(s)
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental image-to-embroidery pipeline.
///
/// Created via [`Pipeline::new`], which stores the source image and
/// config without doing any processing. Each stage method consumes the
/// current state and returns the next, making it a compile-time error
/// to skip stages or call them out of order.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline from source image bytes and config.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(image_bytes: Vec<u8>, config: PipelineConfig) -> Pending {
        Pending {
            config,
            source: image_bytes,
        }
    }
}
