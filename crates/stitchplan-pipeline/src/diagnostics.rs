//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation for parameter
//! tuning. [`process_staged_with_diagnostics`] drives the staged
//! pipeline and records a [`StageDiagnostics`] for every stage it
//! advances through.
//!
//! Timestamps come from a caller-supplied [`Clock`], so the library
//! itself never touches a platform time source.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::{Advance, Pipeline, Stage};
use crate::types::{PipelineConfig, PipelineError, StagedResult};

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque timestamp type.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// One entry per executed stage, in execution order.
    pub stages: Vec<StageDiagnostics>,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Stage name (`"decode"`, `"quantize"`, ...).
    pub name: String,
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics (counts, sizes, etc.).
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Image decoding metrics.
    Decode {
        /// Size of the input image bytes.
        input_bytes: usize,
        /// Decoded image width in pixels.
        width: u32,
        /// Decoded image height in pixels.
        height: u32,
        /// Total pixel count (`width * height`).
        pixel_count: u64,
    },
    /// Downsampling metrics.
    Downsample {
        /// Width before downsampling.
        original_width: u32,
        /// Height before downsampling.
        original_height: u32,
        /// Width after downsampling.
        width: u32,
        /// Height after downsampling.
        height: u32,
        /// Configured working height.
        working_height: u32,
        /// Resampling filter name.
        filter: String,
        /// Whether the image was actually resized.
        applied: bool,
    },
    /// Color quantization metrics.
    Quantize {
        /// Configured color budget.
        max_colors: usize,
        /// Distinct opaque colors before quantization.
        input_colors: usize,
        /// Opaque colors after quantization.
        output_colors: usize,
        /// Merge passes executed.
        merge_passes: usize,
        /// Starting tolerance after clamping.
        start_tolerance: f32,
        /// Tolerance after the last escalation.
        final_tolerance: f32,
        /// Whether the palette was cut to the most frequent colors.
        truncated: bool,
    },
    /// Grid sampling metrics.
    Strandize {
        /// Design width in millimetres.
        width_mm: f64,
        /// Design height in millimetres.
        height_mm: f64,
        /// Sample rows.
        rows: u32,
        /// Sample columns.
        cols: u32,
        /// Colors that produced at least one sample.
        color_count: usize,
        /// Strands across all colors.
        strand_count: usize,
        /// Samples across all strands.
        point_count: usize,
    },
    /// Strand ordering metrics.
    Order {
        /// Threads produced.
        thread_count: usize,
        /// Stitches across those threads.
        stitch_count: usize,
        /// Jump distance with strands in sampling order.
        jump_before_mm: f64,
        /// Jump distance after reordering.
        jump_after_mm: f64,
    },
    /// Satin border metrics.
    Border {
        /// Whether the border parameters enable a border.
        enabled: bool,
        /// Configured thickness.
        thickness_mm: f64,
        /// Configured zig-zag spacing.
        density_mm: f64,
        /// Border stitches generated (0 when skipped).
        stitch_count: usize,
    },
}

/// High-level summary counts for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Working image width in pixels.
    pub image_width: u32,
    /// Working image height in pixels.
    pub image_height: u32,
    /// Working image pixel count.
    pub pixel_count: u64,
    /// Opaque colors after quantization.
    pub color_count: usize,
    /// Threads in the embroidery, border included.
    pub thread_count: usize,
    /// Stitches in the embroidery, border included.
    pub stitch_count: usize,
}

impl PipelineDiagnostics {
    /// Diagnostics for the stage called `name`, if it ran.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageDiagnostics> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for stage in &self.stages {
            let ms = duration_ms(stage.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&stage.metrics);
            lines.push(format!("{:<24} {ms:>8.3}ms {pct:>9.1}%  {details}", stage.name));
        }

        lines.push(String::new());
        lines.push(format!(
            "Colors: {}  |  Threads: {}  |  Stitches: {}",
            self.summary.color_count, self.summary.thread_count, self.summary.stitch_count,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
            ..
        } => format!("{input_bytes} bytes -> {width}x{height}"),
        StageMetrics::Downsample {
            original_width,
            original_height,
            width,
            height,
            filter,
            applied,
            ..
        } => {
            if *applied {
                format!("{original_width}x{original_height} -> {width}x{height} ({filter})")
            } else {
                format!("{width}x{height} (unchanged)")
            }
        }
        StageMetrics::Quantize {
            max_colors,
            input_colors,
            output_colors,
            merge_passes,
            final_tolerance,
            truncated,
            ..
        } => {
            let cut = if *truncated { " truncated" } else { "" };
            format!(
                "{input_colors}->{output_colors} colors (max {max_colors}) passes={merge_passes} tol={final_tolerance:.1}{cut}",
            )
        }
        StageMetrics::Strandize {
            width_mm,
            height_mm,
            rows,
            cols,
            strand_count,
            point_count,
            ..
        } => format!(
            "{width_mm:.1}x{height_mm:.1}mm grid={cols}x{rows} {strand_count} strands, {point_count} pts",
        ),
        StageMetrics::Order {
            thread_count,
            stitch_count,
            jump_before_mm,
            jump_after_mm,
        } => format!(
            "{thread_count} threads, {stitch_count} stitches, jumps {jump_before_mm:.1}->{jump_after_mm:.1}mm",
        ),
        StageMetrics::Border {
            enabled,
            thickness_mm,
            density_mm,
            stitch_count,
        } => {
            if *enabled {
                format!("t={thickness_mm:.2}mm d={density_mm:.2}mm {stitch_count} stitches")
            } else {
                "disabled".to_string()
            }
        }
    }
}

/// Run the full pipeline, timing every stage with `clock`.
///
/// # Errors
///
/// Returns the same errors as [`crate::process`].
pub fn process_staged_with_diagnostics<C: Clock>(
    image_bytes: &[u8],
    config: &PipelineConfig,
    clock: &C,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    let total_start = clock.now();
    let mut stages = Vec::new();
    let mut stage: Stage = Pipeline::new(image_bytes.to_vec(), config.clone()).into();

    loop {
        let start = clock.now();
        match stage.advance()? {
            Advance::Next(next) => {
                let duration = clock.elapsed(&start);
                if let Some(metrics) = next.metrics() {
                    stages.push(StageDiagnostics {
                        name: next.name().to_string(),
                        duration,
                        metrics,
                    });
                }
                stage = next;
            }
            Advance::Complete(done) => {
                stage = done;
                break;
            }
        }
    }

    let staged = stage.complete()?;
    let total_duration = clock.elapsed(&total_start);

    let summary = PipelineSummary {
        image_width: staged.dimensions.width,
        image_height: staged.dimensions.height,
        pixel_count: u64::from(staged.dimensions.width) * u64::from(staged.dimensions.height),
        color_count: staged.histogram.opaque_len(),
        thread_count: staged.embroidery.threads.len(),
        stitch_count: staged.embroidery.stitch_count(),
    };

    Ok((
        staged,
        PipelineDiagnostics {
            stages,
            total_duration,
            summary,
        },
    ))
}
