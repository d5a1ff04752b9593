//! Integration test: run an in-memory image through the full pipeline and
//! export it to every supported format.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use stitchplan_export::{
    Command, EmbroideryEncoder, JsonEncoder, ProgramEncoder, StitchProgram, SvgEncoder,
};
use stitchplan_pipeline::{Argb, Embroidery, PipelineConfig, PlannerConfig, QuantizeConfig};

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

/// A red disc with a blue centre on a transparent background.
fn target_png(size: u32) -> Vec<u8> {
    let c = f64::from(size) / 2.0;
    let img = image::RgbaImage::from_fn(size, size, |x, y| {
        let r = (f64::from(x) + 0.5 - c).hypot(f64::from(y) + 0.5 - c);
        if r < c * 0.4 {
            image::Rgba([30, 40, 220, 255])
        } else if r < c * 0.9 {
            image::Rgba([220, 30, 30, 255])
        } else {
            image::Rgba([0, 0, 0, 0])
        }
    });
    encode_png(&img)
}

fn config() -> PipelineConfig {
    PipelineConfig {
        name: "target".to_string(),
        quantize: QuantizeConfig {
            max_colors: 2,
            ..QuantizeConfig::default()
        },
        planner: PlannerConfig {
            height_mm: 20.0,
            density_x_mm: 0.5,
            density_y_mm: 0.5,
            ..PlannerConfig::default()
        },
        ..PipelineConfig::default()
    }
}

fn plan() -> Embroidery {
    stitchplan_pipeline::process(&target_png(40), &config())
        .expect("pipeline should succeed")
        .embroidery
}

#[test]
fn target_pipeline_plans_two_colors_and_border() {
    let embroidery = plan();
    let colors: Vec<Argb> = embroidery.threads.iter().map(|t| t.color).collect();
    assert_eq!(colors.len(), 3, "two fills plus the border: {colors:?}");
    assert_eq!(colors.last(), Some(&Argb::BLACK));
    assert!(embroidery.threads.iter().all(|t| t.absolute));
}

#[test]
fn target_pipeline_to_svg() {
    let embroidery = plan();
    let bytes = SvgEncoder {
        description: Some("two colors".to_string()),
        config_json: Some(serde_json::to_string(&config()).unwrap()),
    }
    .encode(&embroidery)
    .unwrap();
    let svg = String::from_utf8(bytes).unwrap();

    assert!(svg.contains("<svg"));
    assert!(svg.contains("<title>target</title>"));
    assert_eq!(svg.matches("<path").count(), embroidery.threads.len());
    assert!(svg.contains(r##"stroke="#000000""##));
    assert!(svg.contains("</svg>"));
}

#[test]
fn target_pipeline_to_program() {
    let embroidery = plan();
    let program = StitchProgram::from_embroidery(&embroidery);

    assert_eq!(program.stitch_count(), embroidery.stitch_count());
    assert_eq!(program.color_change_count(), embroidery.threads.len() - 1);
    assert_eq!(program.commands.last(), Some(&Command::End));
    // Centred: the extents on either side of the origin differ by at most
    // one unit.
    assert!((program.bounds.min_x + program.bounds.max_x).abs() <= 1);
    assert!((program.bounds.min_y + program.bounds.max_y).abs() <= 1);

    let bytes = ProgramEncoder::default().encode(&embroidery).unwrap();
    let decoded: StitchProgram = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(decoded, program);
}

#[test]
fn target_pipeline_to_json() {
    let embroidery = plan();
    let bytes = JsonEncoder { pretty: true }.encode(&embroidery).unwrap();
    let decoded: Embroidery = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(decoded, embroidery);
}

#[test]
fn transparent_image_cannot_be_exported_as_svg() {
    let img = image::RgbaImage::from_pixel(8, 8, image::Rgba([0, 0, 0, 0]));
    let result = stitchplan_pipeline::process(&encode_png(&img), &config()).unwrap();
    assert!(result.embroidery.threads.is_empty());
    assert!(SvgEncoder::default().encode(&result.embroidery).is_err());
    assert!(JsonEncoder::default().encode(&result.embroidery).is_ok());
}
