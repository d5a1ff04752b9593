//! SVG preview serializer.
//!
//! Renders an [`Embroidery`] as an SVG document built with the [`svg`]
//! crate. Each thread with two or more stitches becomes one `<path>`
//! stroked in the thread color. The `viewBox` is in millimetres and
//! wraps the stitches with a small margin, so the preview prints at
//! physical size.
//!
//! Optional [`SvgMetadata`] embeds `<title>`, `<desc>` and a
//! `<metadata>` element carrying the pipeline configuration.
//!
//! This is a pure function with no I/O -- it returns a `String`.

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Description, Element, Path, Title};
use svg::node::{Node, Text, Value};

use stitchplan_pipeline::{Embroidery, Point};

use crate::encoder::{EmbroideryEncoder, ExportError};

/// Blank space around the stitches, in millimetres.
const MARGIN_MM: f64 = 1.0;

/// Preview stroke width, in millimetres. Roughly a 40 wt thread.
const STROKE_WIDTH_MM: f64 = 0.4;

/// Metadata to embed in the SVG document.
///
/// All fields are optional. Text values are XML-escaped automatically by
/// the `svg` crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, emitted as `<title>`.
    ///
    /// Typically the design name or source image filename.
    pub title: Option<&'a str>,

    /// Document description, emitted as `<desc>`.
    pub description: Option<&'a str>,

    /// Serialized pipeline configuration, emitted inside `<metadata>` in
    /// a namespaced `<stitchplan:pipeline>` element.
    pub config_json: Option<&'a str>,
}

/// Build an SVG path `d` attribute string from stitch positions.
///
/// Uses `M` for the first point and `L` for the rest. Returns an empty
/// string for fewer than 2 points.
///
/// # Examples
///
/// ```
/// use stitchplan_pipeline::Point;
/// use stitchplan_export::build_path_data;
///
/// let d = build_path_data(&[Point::new(10.0, 20.0), Point::new(30.0, 40.0)]);
/// assert_eq!(d, "M10,20 L30,40");
/// ```
#[must_use]
pub fn build_path_data(points: &[Point]) -> String {
    let [first, rest @ ..] = points else {
        return String::new();
    };
    if rest.is_empty() {
        return String::new();
    }

    let mut data = Data::new().move_to((first.x, first.y));
    for p in rest {
        data = data.line_to((p.x, p.y));
    }
    String::from(Value::from(data))
}

/// Serialize an embroidery into an SVG document string.
///
/// Relative threads are resolved with [`Embroidery::absolute_threads`].
/// Threads with fewer than 2 stitches are skipped. An embroidery without
/// stitches still yields a valid, empty document.
///
/// # Examples
///
/// ```
/// use stitchplan_pipeline::{Argb, Embroidery, Point, Thread};
/// use stitchplan_export::{SvgMetadata, to_svg};
///
/// let embroidery = Embroidery {
///     name: "dash".to_string(),
///     threads: vec![Thread::absolute(
///         Argb::rgb(255, 0, 0),
///         vec![Point::new(1.0, 1.0), Point::new(4.0, 1.0)],
///     )],
/// };
/// let metadata = SvgMetadata {
///     title: Some("dash"),
///     ..SvgMetadata::default()
/// };
/// let svg = to_svg(&embroidery, &metadata);
/// assert!(svg.contains("<title>dash</title>"));
/// assert!(svg.contains(r##"stroke="#FF0000""##));
/// assert!(svg.contains("M1,1 L4,1"));
/// ```
#[must_use]
pub fn to_svg(embroidery: &Embroidery, metadata: &SvgMetadata<'_>) -> String {
    let threads = embroidery.absolute_threads();
    let (min, max) = extent(threads.iter().flat_map(|t| t.stitches.iter().copied()));

    let x = min.x - MARGIN_MM;
    let y = min.y - MARGIN_MM;
    let width = 2.0f64.mul_add(MARGIN_MM, max.x - min.x);
    let height = 2.0f64.mul_add(MARGIN_MM, max.y - min.y);

    let mut doc = Document::new()
        .set("width", format!("{width}mm"))
        .set("height", format!("{height}mm"))
        .set("viewBox", format!("{x} {y} {width} {height}"));

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }

    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }

    if let Some(config_json) = metadata.config_json {
        let mut pipeline_el = Element::new("stitchplan:pipeline");
        pipeline_el.assign("xmlns:stitchplan", "urn:stitchplan:pipeline:1");
        pipeline_el.append(Text::new(config_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(pipeline_el);
        doc = doc.add(metadata_el);
    }

    for thread in &threads {
        let d = build_path_data(&thread.stitches);
        if d.is_empty() {
            continue;
        }
        let path = Path::new()
            .set("d", d)
            .set("fill", "none")
            .set("stroke", thread.color.hex())
            .set("stroke-width", STROKE_WIDTH_MM)
            .set("stroke-linejoin", "round");
        doc = doc.add(path);
    }

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}

/// Bounding box of `points`. Empty input gives a zero box at the origin.
fn extent(points: impl Iterator<Item = Point>) -> (Point, Point) {
    points
        .fold(None, |acc: Option<(Point, Point)>, p| {
            Some(acc.map_or((p, p), |(lo, hi)| {
                (
                    Point::new(lo.x.min(p.x), lo.y.min(p.y)),
                    Point::new(hi.x.max(p.x), hi.y.max(p.y)),
                )
            }))
        })
        .unwrap_or_default()
}

/// [`to_svg`] behind the [`EmbroideryEncoder`] seam.
///
/// The design name becomes the document title.
#[derive(Debug, Clone, Default)]
pub struct SvgEncoder {
    /// Optional `<desc>` text.
    pub description: Option<String>,
    /// Optional pipeline configuration JSON for `<metadata>`.
    pub config_json: Option<String>,
}

impl EmbroideryEncoder for SvgEncoder {
    fn extension(&self) -> &'static str {
        "svg"
    }

    fn encode(&self, embroidery: &Embroidery) -> Result<Vec<u8>, ExportError> {
        if embroidery.stitch_count() == 0 {
            return Err(ExportError::EmptyEmbroidery);
        }
        let metadata = SvgMetadata {
            title: Some(&embroidery.name),
            description: self.description.as_deref(),
            config_json: self.config_json.as_deref(),
        };
        Ok(to_svg(embroidery, &metadata).into_bytes())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use stitchplan_pipeline::{Argb, Thread};

    use super::*;

    const RED: Argb = Argb::rgb(255, 0, 0);
    const BLUE: Argb = Argb::rgb(0, 0, 255);

    fn no_meta() -> SvgMetadata<'static> {
        SvgMetadata::default()
    }

    fn embroidery(threads: Vec<Thread>) -> Embroidery {
        Embroidery {
            name: "test".to_string(),
            threads,
        }
    }

    fn two_threads() -> Embroidery {
        embroidery(vec![
            Thread::absolute(RED, vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)]),
            Thread::absolute(BLUE, vec![Point::new(0.0, 5.0), Point::new(10.0, 5.0)]),
        ])
    }

    // --- build_path_data ---

    #[test]
    fn build_path_data_empty() {
        assert_eq!(build_path_data(&[]), "");
    }

    #[test]
    fn build_path_data_single_point() {
        assert_eq!(build_path_data(&[Point::new(1.0, 2.0)]), "");
    }

    #[test]
    fn build_path_data_three_points() {
        let d = build_path_data(&[
            Point::new(0.0, 0.0),
            Point::new(1.5, 0.0),
            Point::new(1.5, 2.25),
        ]);
        assert_eq!(d, "M0,0 L1.5,0 L1.5,2.25");
    }

    // --- to_svg ---

    #[test]
    fn svg_has_xml_declaration_and_closing_tag() {
        let svg = to_svg(&two_threads(), &no_meta());
        assert!(svg.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert!(svg.contains("xmlns=\"http://www.w3.org/2000/svg\""));
    }

    #[test]
    fn one_path_per_thread_in_thread_color() {
        let svg = to_svg(&two_threads(), &no_meta());
        assert_eq!(svg.matches("<path").count(), 2);
        assert!(svg.contains(r##"stroke="#FF0000""##));
        assert!(svg.contains(r##"stroke="#0000FF""##));
        let red = svg.find("#FF0000").unwrap();
        let blue = svg.find("#0000FF").unwrap();
        assert!(red < blue, "paths follow thread order");
    }

    #[test]
    fn viewbox_wraps_stitches_in_millimetres() {
        let svg = to_svg(&two_threads(), &no_meta());
        assert!(svg.contains(r#"viewBox="-1 -1 12 7""#));
        assert!(svg.contains(r#"width="12mm""#));
        assert!(svg.contains(r#"height="7mm""#));
    }

    #[test]
    fn single_stitch_threads_are_skipped() {
        let e = embroidery(vec![
            Thread::absolute(RED, vec![Point::new(1.0, 1.0)]),
            Thread::absolute(BLUE, vec![Point::new(0.0, 0.0), Point::new(2.0, 2.0)]),
        ]);
        let svg = to_svg(&e, &no_meta());
        assert_eq!(svg.matches("<path").count(), 1);
    }

    #[test]
    fn relative_threads_are_drawn_absolute() {
        let relative =
            Thread::absolute(RED, vec![Point::new(2.0, 2.0), Point::new(4.0, 2.0)])
                .to_relative(Point::default());
        let svg = to_svg(&embroidery(vec![relative]), &no_meta());
        assert!(svg.contains("M2,2 L4,2"));
    }

    #[test]
    fn relative_thread_is_drawn_from_previous_needle() {
        let e = embroidery(vec![
            Thread::absolute(RED, vec![Point::new(0.0, 0.0), Point::new(10.0, 10.0)]),
            Thread {
                color: BLUE,
                stitches: vec![Point::new(1.0, 0.0), Point::new(0.0, 2.0)],
                absolute: false,
            },
        ]);
        let svg = to_svg(&e, &no_meta());
        assert!(svg.contains("M11,10 L11,12"));
        assert!(svg.contains(r#"viewBox="-1 -1 13 14""#));
    }

    #[test]
    fn empty_embroidery_is_still_a_document() {
        let svg = to_svg(&embroidery(vec![]), &no_meta());
        assert!(svg.contains("<svg"));
        assert!(!svg.contains("<path"));
        assert!(svg.contains(r#"viewBox="-1 -1 2 2""#));
    }

    // --- Metadata ---

    #[test]
    fn title_and_desc_emitted() {
        let meta = SvgMetadata {
            title: Some("logo"),
            description: Some("3 colors"),
            ..SvgMetadata::default()
        };
        let svg = to_svg(&two_threads(), &meta);
        assert!(svg.contains("<title>logo</title>"));
        assert!(svg.contains("<desc>3 colors</desc>"));
        assert!(svg.find("<title>").unwrap() < svg.find("<path").unwrap());
    }

    #[test]
    fn metadata_omitted_when_none() {
        let svg = to_svg(&two_threads(), &no_meta());
        assert!(!svg.contains("<title"));
        assert!(!svg.contains("<desc"));
        assert!(!svg.contains("<metadata"));
    }

    #[test]
    fn special_characters_in_title_are_escaped() {
        let meta = SvgMetadata {
            title: Some("a <b> & c"),
            ..SvgMetadata::default()
        };
        let svg = to_svg(&two_threads(), &meta);
        assert!(svg.contains("<title>a &lt;b&gt; &amp; c</title>"));
    }

    #[test]
    fn config_json_lands_in_metadata() {
        let meta = SvgMetadata {
            config_json: Some(r#"{"name":"x"}"#),
            ..SvgMetadata::default()
        };
        let svg = to_svg(&two_threads(), &meta);
        assert!(svg.contains("<metadata>"));
        assert!(svg.contains("xmlns:stitchplan=\"urn:stitchplan:pipeline:1\""));
        assert!(svg.contains("&quot;name&quot;") || svg.contains("\"name\""));
    }

    // --- Encoder ---

    #[test]
    fn encoder_uses_name_as_title() {
        let bytes = SvgEncoder::default().encode(&two_threads()).unwrap();
        let svg = String::from_utf8(bytes).unwrap();
        assert!(svg.contains("<title>test</title>"));
    }

    #[test]
    fn encoder_rejects_empty_embroidery() {
        assert!(matches!(
            SvgEncoder::default().encode(&embroidery(vec![])),
            Err(ExportError::EmptyEmbroidery)
        ));
    }
}
