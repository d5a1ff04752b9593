//! The encoder seam.
//!
//! The pipeline hands an [`Embroidery`] to an [`EmbroideryEncoder`] and
//! gets bytes back, or an [`ExportError`]. Encoders never touch the
//! filesystem; writing the bytes is the caller's job.

use tracing::debug;

use stitchplan_pipeline::Embroidery;

use crate::program::StitchProgram;

/// Errors produced while encoding an embroidery.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// JSON serialization failed.
    #[error("failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The format cannot represent a design without stitches.
    #[error("embroidery has no stitches")]
    EmptyEmbroidery,
}

/// Something that turns an [`Embroidery`] into file bytes.
pub trait EmbroideryEncoder {
    /// File extension for the output, without the leading dot.
    fn extension(&self) -> &'static str;

    /// Encode `embroidery`.
    ///
    /// # Errors
    ///
    /// Returns an [`ExportError`] if no bytes could be produced.
    fn encode(&self, embroidery: &Embroidery) -> Result<Vec<u8>, ExportError>;
}

/// The [`Embroidery`] data model as JSON.
///
/// Empty designs are valid JSON and are encoded as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder {
    /// Indent the output.
    pub pretty: bool,
}

impl EmbroideryEncoder for JsonEncoder {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn encode(&self, embroidery: &Embroidery) -> Result<Vec<u8>, ExportError> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(embroidery)?
        } else {
            serde_json::to_vec(embroidery)?
        };
        debug!(bytes = bytes.len(), "encoded embroidery JSON");
        Ok(bytes)
    }
}

/// The lowered [`StitchProgram`] as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgramEncoder {
    /// Indent the output.
    pub pretty: bool,
}

impl EmbroideryEncoder for ProgramEncoder {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn encode(&self, embroidery: &Embroidery) -> Result<Vec<u8>, ExportError> {
        let program = StitchProgram::from_embroidery(embroidery);
        if program.stitch_count() == 0 {
            return Err(ExportError::EmptyEmbroidery);
        }
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(&program)?
        } else {
            serde_json::to_vec(&program)?
        };
        debug!(
            commands = program.commands.len(),
            bytes = bytes.len(),
            "encoded stitch program"
        );
        Ok(bytes)
    }
}
