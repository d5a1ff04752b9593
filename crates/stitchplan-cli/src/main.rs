//! stitchplan: convert an image into an embroidery stitch plan.
//!
//! Runs the pipeline on a given image file with configurable parameters,
//! prints per-stage diagnostics and optionally writes the results:
//!
//! - `--out`: the embroidery data model as JSON
//! - `--program`: the lowered stitch program (0.1 mm units) as JSON
//! - `--svg`: an SVG preview at physical size
//! - `--quantized`: the quantized working image as PNG
//!
//! Log verbosity follows `RUST_LOG` (default `info`).
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin stitchplan -- [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use stitchplan_export::{EmbroideryEncoder, JsonEncoder, ProgramEncoder, SvgEncoder};
use stitchplan_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use stitchplan_pipeline::{
    Argb, DownsampleFilter, Embroidery, PipelineConfig, PlannerConfig, QuantizeConfig,
};
use tracing::{info, warn};

/// Convert an image into an embroidery stitch plan.
///
/// Quantizes the image to a small thread palette, samples it on a stitch
/// grid, orders the stitches to minimize jumps and adds an optional satin
/// border. Prints per-stage timing and count diagnostics.
#[derive(Parser)]
#[command(name = "stitchplan", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Design name. Defaults to the image file stem.
    #[arg(long)]
    name: Option<String>,

    /// Working height in pixels; taller images are scaled down to it.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_WORKING_HEIGHT, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    working_height: u32,

    /// Downsample filter (disabled, nearest, triangle, catmull-rom, gaussian, lanczos3).
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_FILTER)]
    downsample_filter: Filter,

    /// Maximum number of thread colors.
    #[arg(long, default_value_t = QuantizeConfig::DEFAULT_MAX_COLORS, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    max_colors: usize,

    /// Starting color merge tolerance (CIE Lab units, at least 4).
    #[arg(long, default_value_t = QuantizeConfig::DEFAULT_MIN_TOLERANCE)]
    min_tolerance: u32,

    /// Drop colors covering fewer pixels than this (0 keeps all).
    #[arg(long, default_value_t = QuantizeConfig::DEFAULT_MIN_BUCKET_COUNT)]
    min_bucket_count: u32,

    /// Design width in mm. Derived from the height and aspect ratio if omitted.
    #[arg(long)]
    width_mm: Option<f64>,

    /// Design height in mm.
    #[arg(long, default_value_t = PlannerConfig::DEFAULT_HEIGHT_MM)]
    height_mm: f64,

    /// Horizontal stitch spacing in mm.
    #[arg(long, default_value_t = PlannerConfig::DEFAULT_DENSITY_X_MM)]
    density_x_mm: f64,

    /// Vertical stitch spacing in mm.
    #[arg(long, default_value_t = PlannerConfig::DEFAULT_DENSITY_Y_MM)]
    density_y_mm: f64,

    /// Break a strand when the next stitch is farther than this many grid
    /// cell diagonals.
    #[arg(long, default_value_t = PlannerConfig::DEFAULT_JUMP_FACTOR)]
    jump_factor: f64,

    /// Satin border width in mm (0 disables the border).
    #[arg(long, default_value_t = PlannerConfig::DEFAULT_BORDER_THICKNESS_MM)]
    border_thickness_mm: f64,

    /// Satin border zig-zag spacing in mm.
    #[arg(long, default_value_t = PlannerConfig::DEFAULT_BORDER_DENSITY_MM)]
    border_density_mm: f64,

    /// Satin border color as `#RRGGBB`.
    #[arg(long, default_value = "#000000", value_parser = parse_color)]
    border_color: Argb,

    /// Write the embroidery as JSON to file.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Write the lowered stitch program as JSON to file.
    #[arg(long)]
    program: Option<PathBuf>,

    /// Write an SVG preview to file.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Write the quantized working image as PNG to file.
    #[arg(long)]
    quantized: Option<PathBuf>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// Missing fields take their default values.
    #[arg(long)]
    config_json: Option<String>,
}

/// Downsample resampling filter selection.
#[derive(Clone, Copy, ValueEnum)]
enum Filter {
    /// Disabled: skip downsampling regardless of image size.
    Disabled,
    /// Nearest-neighbor (fastest, introduces no new colors).
    Nearest,
    /// Bilinear interpolation.
    Triangle,
    /// Bicubic Catmull-Rom.
    CatmullRom,
    /// Gaussian.
    Gaussian,
    /// Lanczos with 3 lobes.
    Lanczos3,
}

/// Maps a [`DownsampleFilter`] to the local CLI [`Filter`] enum.
const fn filter_from_pipeline(f: DownsampleFilter) -> Filter {
    match f {
        DownsampleFilter::Disabled => Filter::Disabled,
        DownsampleFilter::Nearest => Filter::Nearest,
        DownsampleFilter::Triangle => Filter::Triangle,
        DownsampleFilter::CatmullRom => Filter::CatmullRom,
        DownsampleFilter::Gaussian => Filter::Gaussian,
        DownsampleFilter::Lanczos3 => Filter::Lanczos3,
    }
}

const fn filter_to_pipeline(f: Filter) -> DownsampleFilter {
    match f {
        Filter::Disabled => DownsampleFilter::Disabled,
        Filter::Nearest => DownsampleFilter::Nearest,
        Filter::Triangle => DownsampleFilter::Triangle,
        Filter::CatmullRom => DownsampleFilter::CatmullRom,
        Filter::Gaussian => DownsampleFilter::Gaussian,
        Filter::Lanczos3 => DownsampleFilter::Lanczos3,
    }
}

/// The CLI default filter, derived from [`PipelineConfig::DEFAULT_DOWNSAMPLE_FILTER`].
const CLI_DEFAULT_FILTER: Filter = filter_from_pipeline(PipelineConfig::DEFAULT_DOWNSAMPLE_FILTER);

/// Parse `#RRGGBB` (the `#` is optional) into an opaque color.
fn parse_color(s: &str) -> Result<Argb, String> {
    let hex = s.strip_prefix('#').unwrap_or(s);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("expected a color like #RRGGBB, got {s:?}"));
    }
    u32::from_str_radix(hex, 16)
        .map(|rgb| Argb(0xFF00_0000 | rgb))
        .map_err(|e| e.to_string())
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    let name = cli.name.clone().unwrap_or_else(|| {
        cli.image_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(PipelineConfig::DEFAULT_NAME)
            .to_string()
    });

    Ok(PipelineConfig {
        name,
        working_height: cli.working_height,
        downsample_filter: filter_to_pipeline(cli.downsample_filter),
        quantize: QuantizeConfig {
            max_colors: cli.max_colors,
            min_tolerance: cli.min_tolerance,
            min_bucket_count: cli.min_bucket_count,
        },
        planner: PlannerConfig {
            width_mm: cli.width_mm,
            height_mm: cli.height_mm,
            density_x_mm: cli.density_x_mm,
            density_y_mm: cli.density_y_mm,
            jump_factor: cli.jump_factor,
            border_thickness_mm: cli.border_thickness_mm,
            border_density_mm: cli.border_density_mm,
            border_color: cli.border_color,
        },
    })
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&cli.image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    info!(
        image = %cli.image_path.display(),
        bytes = image_bytes.len(),
        runs = cli.runs,
        "starting"
    );
    tracing::debug!(?config, "pipeline config");

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        match stitchplan_pipeline::diagnostics::process_staged_with_diagnostics(
            &image_bytes,
            &config,
            &StdClock,
        ) {
            Ok((staged, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                // Write outputs on the first run only.
                if run == 0 && !write_outputs(&cli, &config, &staged) {
                    return ExitCode::FAILURE;
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// Write every requested output file. Returns `false` after the first
/// failure.
fn write_outputs(
    cli: &Cli,
    config: &PipelineConfig,
    staged: &stitchplan_pipeline::StagedResult,
) -> bool {
    let embroidery = &staged.embroidery;

    if let Some(ref path) = cli.out
        && !write_encoded(path, &JsonEncoder { pretty: true }, embroidery)
    {
        return false;
    }

    if let Some(ref path) = cli.program
        && !write_encoded(path, &ProgramEncoder { pretty: true }, embroidery)
    {
        return false;
    }

    if let Some(ref path) = cli.svg {
        let encoder = SvgEncoder {
            description: Some(format!(
                "{} colors, {} stitches",
                staged.histogram.opaque_len(),
                embroidery.stitch_count(),
            )),
            config_json: serde_json::to_string(config).ok(),
        };
        if !write_encoded(path, &encoder, embroidery) {
            return false;
        }
    }

    if let Some(ref path) = cli.quantized {
        match staged
            .quantized
            .save_with_format(path, image::ImageFormat::Png)
        {
            Ok(()) => eprintln!("Quantized image written to {}", path.display()),
            Err(e) => {
                eprintln!("Error writing quantized image to {}: {e}", path.display());
                return false;
            }
        }
    }

    true
}

/// Encode `embroidery` and write it to `path`.
fn write_encoded(path: &Path, encoder: &dyn EmbroideryEncoder, embroidery: &Embroidery) -> bool {
    let bytes = match encoder.encode(embroidery) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error encoding {}: {e}", path.display());
            return false;
        }
    };
    if path.extension().and_then(|e| e.to_str()) != Some(encoder.extension()) {
        warn!(
            path = %path.display(),
            expected = encoder.extension(),
            "output file extension does not match its format"
        );
    }
    match std::fs::write(path, &bytes) {
        Ok(()) => {
            eprintln!("Written to {} ({} bytes)", path.display(), bytes.len());
            true
        }
        Err(e) => {
            eprintln!("Error writing {}: {e}", path.display());
            false
        }
    }
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    let Some(first) = all_diagnostics.first() else {
        println!("Warning: no diagnostics to summarize");
        return;
    };

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    // Per-stage means, in the order the stages ran.
    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    for stage in &first.stages {
        let stage_durations: Vec<f64> = all_diagnostics
            .iter()
            .filter_map(|d| d.stage(&stage.name))
            .map(|s| s.duration.as_secs_f64() * 1000.0)
            .collect();

        if stage_durations.is_empty() {
            continue;
        }

        let stage_mean = stage_durations.iter().sum::<f64>() / stage_durations.len() as f64;
        println!("{:<24} {stage_mean:>10.3}ms", stage.name);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn default_flags_match_default_config() {
        let cli = Cli::parse_from(["stitchplan", "logo.png"]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(
            config,
            PipelineConfig {
                name: "logo".to_string(),
                ..PipelineConfig::default()
            }
        );
    }

    #[test]
    fn flags_fill_nested_config() {
        let cli = Cli::parse_from([
            "stitchplan",
            "logo.png",
            "--max-colors",
            "5",
            "--width-mm",
            "80",
            "--border-color",
            "#FF8000",
            "--downsample-filter",
            "lanczos3",
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.quantize.max_colors, 5);
        assert_eq!(config.planner.width_mm, Some(80.0));
        assert_eq!(config.planner.border_color, Argb::rgb(255, 128, 0));
        assert_eq!(config.downsample_filter, DownsampleFilter::Lanczos3);
    }

    #[test]
    fn config_json_overrides_flags() {
        let cli = Cli::parse_from([
            "stitchplan",
            "logo.png",
            "--max-colors",
            "5",
            "--config-json",
            r#"{"name":"patch","quantize":{"max_colors":2}}"#,
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.name, "patch");
        assert_eq!(config.quantize.max_colors, 2);
        assert_eq!(config.working_height, PipelineConfig::DEFAULT_WORKING_HEIGHT);
    }

    #[test]
    fn bad_config_json_is_reported() {
        let cli = Cli::parse_from(["stitchplan", "x.png", "--config-json", "{"]);
        assert!(config_from_cli(&cli).unwrap_err().contains("--config-json"));
    }

    #[test]
    fn zero_max_colors_is_rejected_by_clap() {
        assert!(Cli::try_parse_from(["stitchplan", "x.png", "--max-colors", "0"]).is_err());
    }

    #[test]
    fn parse_color_accepts_hex() {
        assert_eq!(parse_color("#00FF00").unwrap(), Argb::rgb(0, 255, 0));
        assert_eq!(parse_color("0000ff").unwrap(), Argb::rgb(0, 0, 255));
        assert!(parse_color("#12345").is_err());
        assert!(parse_color("#GG0000").is_err());
    }

    #[test]
    fn filter_mapping_round_trips() {
        for f in [
            DownsampleFilter::Disabled,
            DownsampleFilter::Nearest,
            DownsampleFilter::Triangle,
            DownsampleFilter::CatmullRom,
            DownsampleFilter::Gaussian,
            DownsampleFilter::Lanczos3,
        ] {
            assert_eq!(filter_to_pipeline(filter_from_pipeline(f)), f);
        }
    }
}
