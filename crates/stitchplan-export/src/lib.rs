//! stitchplan-export: Pure serializers for embroidery output (sans-IO)
//!
//! Turns an [`Embroidery`](stitchplan_pipeline::Embroidery) into bytes.
//! Supported sinks: the plain JSON data model, a flat stitch program in
//! 0.1 mm machine units, and an SVG preview.

pub mod encoder;
pub mod program;
pub mod svg;

pub use encoder::{EmbroideryEncoder, ExportError, JsonEncoder, ProgramEncoder};
pub use program::{Bounds, Command, StitchProgram};
pub use svg::{SvgEncoder, SvgMetadata, build_path_data, to_svg};
