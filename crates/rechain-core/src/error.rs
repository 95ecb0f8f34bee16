//! Unified Error Model
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// A stage's expression or flag string failed to compile.
    #[error("PATTERN/stage {index} ({stage}): {message}")]
    InvalidPattern {
        stage: String,
        index: usize,
        message: String,
    },

    #[error("STAGE/unknown stage id {0}")]
    UnknownStage(String),

    #[error("STAGE/a pipeline keeps at least one stage")]
    LastStage,
}

impl PipelineError {
    pub fn is_invalid_pattern(&self) -> bool {
        matches!(self, Self::InvalidPattern { .. })
    }
}
