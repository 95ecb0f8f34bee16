//! Clipboard sink and copy helpers
use thiserror::Error;

use crate::data_model::PipelineOutput;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClipboardError {
    #[error("CLIPBOARD/permission denied")]
    PermissionDenied,

    #[error("CLIPBOARD/{0}")]
    Unavailable(String),
}

/// Destination for copied text.
pub trait ClipboardSink {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

pub fn copy_match(sink: &dyn ClipboardSink, m: &str) -> Result<(), ClipboardError> {
    sink.write_text(m)
}

/// Copy every match, one per line.
pub fn copy_all_matches(
    sink: &dyn ClipboardSink,
    output: &PipelineOutput,
) -> Result<(), ClipboardError> {
    sink.write_text(&output.matches.join("\n"))
}

pub fn copy_transformed(
    sink: &dyn ClipboardSink,
    output: &PipelineOutput,
) -> Result<(), ClipboardError> {
    sink.write_text(&output.transformed_text)
}
