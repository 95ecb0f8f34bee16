//! File-backed clipboard sink for `apply --copy`.
use std::io::ErrorKind;
use std::path::PathBuf;

use rechain_core::{ClipboardError, ClipboardSink};

#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ClipboardSink for FileSink {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        std::fs::write(&self.path, text).map_err(|e| match e.kind() {
            ErrorKind::PermissionDenied => ClipboardError::PermissionDenied,
            _ => ClipboardError::Unavailable(format!("{}: {}", self.path.display(), e)),
        })
    }
}
