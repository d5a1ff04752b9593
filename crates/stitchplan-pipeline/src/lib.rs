//! stitchplan-pipeline: Pure image-to-embroidery pipeline (sans-IO).
//!
//! Converts raster images into embroidery stitch plans through:
//! decode -> downsample -> color quantization -> grid strandizing ->
//! strand ordering -> optional satin border.
//!
//! This crate has **no I/O dependencies**. It operates on in-memory
//! byte slices and bitmaps and returns structured data. Encoding the
//! result into files lives in `stitchplan-export`.

pub mod bitmap;
pub mod color;
pub mod diagnostics;
pub mod downsample;
pub mod geometry;
pub mod histogram;
pub mod optimize;
pub mod pipeline;
pub mod planner;
pub mod quantize;
pub mod satin;
pub mod strand;
pub mod types;

pub use bitmap::{ArgbBitmap, Bitmap};
pub use color::Argb;
pub use downsample::DownsampleFilter;
pub use histogram::{Histogram, HistogramEntry, compute_histogram};
pub use optimize::order_strands_minimizing_jumps;
pub use pipeline::Pipeline;
pub use planner::create_embroidery_from_bitmap;
pub use quantize::reduce_colors;
pub use satin::satin_border;
pub use strand::{ColorStrands, StitchGrid, strandize};
pub use types::{
    Dimensions, Embroidery, PipelineConfig, PipelineError, PlannerConfig, Point, ProcessResult,
    QuantizeConfig, StagedResult, Strand, Thread,
};

/// Run the full image-to-embroidery pipeline.
///
/// Takes raw image bytes (PNG, JPEG, BMP, WebP) and a configuration,
/// then produces a [`ProcessResult`] with the stitch plan, the final
/// color histogram and the working image dimensions.
///
/// # Pipeline steps
///
/// 1. Validate the configuration and decode the image
/// 2. Downsample to the working height
/// 3. Quantize to at most `max_colors` opaque colors
/// 4. Sample the design grid into per-color strands
/// 5. Order each color's strands to minimize jumps
/// 6. Append the satin border, if enabled
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` is invalid.
/// Returns [`PipelineError::EmptyInput`] if `image_bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is unrecognized.
pub fn process(
    image_bytes: &[u8],
    config: &PipelineConfig,
) -> Result<ProcessResult, PipelineError> {
    config.validate()?;

    // 1. Decode.
    let image = bitmap::decode(image_bytes)?;

    // 2. Downsample to the working height.
    let (working, _) =
        downsample::downsample(&image, config.working_height, config.downsample_filter);
    let working = working.to_rgba8();
    let dimensions = Dimensions {
        width: working.width(),
        height: working.height(),
    };

    // 3. Quantize.
    let reduction = quantize::reduce_colors(&working, &config.quantize)?;

    // 4-6. Strandize, order, border.
    let embroidery = planner::create_embroidery_from_bitmap(
        &config.name,
        &reduction.image,
        &reduction.histogram,
        &config.planner,
    )?;

    Ok(ProcessResult {
        embroidery,
        histogram: reduction.histogram,
        dimensions,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn encode_png(img: &image::RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    /// Three vertical bands with slight per-pixel noise.
    fn banded_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_fn(width, height, |x, y| {
            let jitter = u8::try_from((x + y) % 4).unwrap();
            match x * 3 / width {
                0 => image::Rgba([220 + jitter, 20, 20, 255]),
                1 => image::Rgba([20, 200 + jitter, 20, 255]),
                _ => image::Rgba([20, 20, 210 + jitter, 255]),
            }
        });
        encode_png(&img)
    }

    #[test]
    fn process_empty_input() {
        let result = process(&[], &PipelineConfig::default());
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn process_corrupt_input() {
        let result = process(&[0xFF, 0x00], &PipelineConfig::default());
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn process_invalid_config() {
        let config = PipelineConfig {
            quantize: QuantizeConfig {
                max_colors: 0,
                ..QuantizeConfig::default()
            },
            ..PipelineConfig::default()
        };
        let result = process(&banded_png(9, 9), &config);
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn process_banded_image_yields_one_thread_per_band() {
        let config = PipelineConfig {
            planner: PlannerConfig {
                height_mm: 20.0,
                density_x_mm: 1.0,
                density_y_mm: 1.0,
                border_thickness_mm: 0.0,
                ..PlannerConfig::default()
            },
            ..PipelineConfig::default()
        };
        let result = process(&banded_png(30, 30), &config).unwrap();

        assert_eq!(result.dimensions, Dimensions { width: 30, height: 30 });
        assert_eq!(result.histogram.opaque_len(), 3);
        assert_eq!(result.histogram.total(), 900);
        assert_eq!(result.embroidery.threads.len(), 3);
        // 20 x 20 grid, every sample opaque.
        assert_eq!(result.embroidery.stitch_count(), 400);
        for thread in &result.embroidery.threads {
            assert!(result.histogram.contains(thread.color));
        }
    }

    #[test]
    fn process_default_config_adds_border_last() {
        let result = process(&banded_png(12, 12), &PipelineConfig::default()).unwrap();
        let last = result.embroidery.threads.last().unwrap();
        assert_eq!(last.color, Argb::BLACK);
        assert_eq!(result.embroidery.name, "embroidery");
    }

    #[test]
    fn process_tall_image_is_downsampled() {
        let img = image::RgbaImage::from_pixel(10, 1000, image::Rgba([0, 0, 0, 255]));
        let config = PipelineConfig {
            working_height: 100,
            ..PipelineConfig::default()
        };
        let result = process(&encode_png(&img), &config).unwrap();
        assert_eq!(result.dimensions, Dimensions { width: 1, height: 100 });
    }

    #[test]
    fn process_transparent_image_gives_empty_embroidery() {
        let img = image::RgbaImage::from_pixel(8, 8, image::Rgba([255, 255, 255, 0]));
        let result = process(&encode_png(&img), &PipelineConfig::default()).unwrap();
        assert!(result.embroidery.threads.is_empty());
        assert_eq!(result.histogram.opaque_len(), 0);
    }
}
