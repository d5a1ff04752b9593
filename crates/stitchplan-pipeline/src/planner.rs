//! Stitch planning: quantized bitmap to [`Embroidery`].

use tracing::info;

use crate::bitmap::Bitmap;
use crate::histogram::Histogram;
use crate::optimize::order_strands_minimizing_jumps;
use crate::satin::satin_border;
use crate::strand::{ColorStrands, StitchGrid, strandize};
use crate::types::{Dimensions, Embroidery, PipelineError, PlannerConfig, Thread, validate_planner};

/// One absolute thread per color, strands ordered to minimize jumps.
///
/// Colors without stitches produce no thread.
#[must_use]
pub fn order_threads(strands: &[ColorStrands]) -> Vec<Thread> {
    strands
        .iter()
        .filter_map(|group| {
            let stitches = order_strands_minimizing_jumps(&group.strands);
            (!stitches.is_empty()).then(|| Thread::absolute(group.color, stitches))
        })
        .collect()
}

/// Plan a full embroidery for a quantized bitmap.
///
/// Strandizes on the grid described by `config`, orders each color's
/// strands, and appends the satin border thread last when the border is
/// enabled. Geometry problems are logged and skipped; only an invalid
/// `config` fails.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails
/// [`validate_planner`].
pub fn create_embroidery_from_bitmap<B: Bitmap + ?Sized>(
    name: &str,
    bitmap: &B,
    histogram: &Histogram,
    config: &PlannerConfig,
) -> Result<Embroidery, PipelineError> {
    validate_planner(config)?;

    let grid = StitchGrid::new(
        config,
        Dimensions {
            width: bitmap.width(),
            height: bitmap.height(),
        },
    );
    let strands = strandize(bitmap, histogram, &grid);
    let mut threads = order_threads(&strands);
    let border = satin_border(
        &threads,
        config.border_color,
        config.border_thickness_mm,
        config.border_density_mm,
    );
    threads.extend(border);

    let embroidery = Embroidery {
        name: name.to_string(),
        threads,
    };
    info!(
        name,
        threads = embroidery.threads.len(),
        stitches = embroidery.stitch_count(),
        "planned embroidery"
    );
    Ok(embroidery)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::bitmap::ArgbBitmap;
    use crate::color::Argb;
    use crate::histogram::compute_histogram;
    use crate::types::Point;

    const RED: Argb = Argb::rgb(255, 0, 0);
    const BLUE: Argb = Argb::rgb(0, 0, 255);

    fn config(size: f64, density: f64, border: f64) -> PlannerConfig {
        PlannerConfig {
            width_mm: Some(size),
            height_mm: size,
            density_x_mm: density,
            density_y_mm: density,
            border_thickness_mm: border,
            ..PlannerConfig::default()
        }
    }

    #[test]
    fn solid_two_by_two_gives_four_row_major_stitches() {
        let bmp = ArgbBitmap::filled(2, 2, RED);
        let h = compute_histogram(&bmp);
        let e = create_embroidery_from_bitmap("red", &bmp, &h, &config(10.0, 5.0, 0.0)).unwrap();

        assert_eq!(e.name, "red");
        assert_eq!(e.threads.len(), 1);
        let t = &e.threads[0];
        assert_eq!(t.color, RED);
        assert!(t.absolute);
        assert_eq!(
            t.stitches,
            vec![
                Point::new(0.0, 0.0),
                Point::new(5.0, 0.0),
                Point::new(0.0, 5.0),
                Point::new(5.0, 5.0),
            ]
        );
    }

    #[test]
    fn border_thread_is_appended_last() {
        let bmp = ArgbBitmap::from_pixels(2, 2, vec![RED, BLUE, BLUE, RED]).unwrap();
        let h = compute_histogram(&bmp);
        let e = create_embroidery_from_bitmap("b", &bmp, &h, &config(10.0, 1.0, 2.0)).unwrap();
        assert_eq!(e.threads.len(), 3);
        assert_eq!(e.threads[0].color, RED);
        assert_eq!(e.threads[1].color, BLUE);
        assert_eq!(e.threads[2].color, Argb::BLACK);
    }

    #[test]
    fn transparent_bitmap_gives_empty_embroidery() {
        let bmp = ArgbBitmap::filled(4, 4, Argb::TRANSPARENT);
        let h = compute_histogram(&bmp);
        let e = create_embroidery_from_bitmap("t", &bmp, &h, &PlannerConfig::default()).unwrap();
        assert!(e.threads.is_empty());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let bmp = ArgbBitmap::filled(2, 2, RED);
        let h = compute_histogram(&bmp);
        let bad = PlannerConfig {
            jump_factor: 0.0,
            ..PlannerConfig::default()
        };
        assert!(matches!(
            create_embroidery_from_bitmap("x", &bmp, &h, &bad),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn colors_without_stitches_produce_no_thread() {
        let strands = vec![
            ColorStrands {
                color: RED,
                strands: vec![crate::types::Strand::new(vec![Point::new(1.0, 1.0)])],
            },
            ColorStrands {
                color: BLUE,
                strands: vec![crate::types::Strand::default()],
            },
        ];
        let threads = order_threads(&strands);
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].color, RED);
    }
}
