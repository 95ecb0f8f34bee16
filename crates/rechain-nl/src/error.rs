use rechain_engine::{BackendError, ControllerError, EngineStatus, FailureReason};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslateError {
    /// The engine is not `Ready`; carries the controller's last failure.
    #[error("NL/engine unavailable ({status}){}", reason_suffix(.reason))]
    EngineUnavailable {
        status: EngineStatus,
        reason: Option<FailureReason>,
    },

    #[error("NL/empty description")]
    EmptyDescription,

    #[error("NL/backend: {0}")]
    Backend(#[from] BackendError),

    /// The reply stayed malformed after the repair pass.
    #[error("NL/parse: {message} (reply: {reply:?})")]
    Parse { reply: String, message: String },
}

fn reason_suffix(reason: &Option<FailureReason>) -> String {
    reason
        .as_ref()
        .map(|r| format!(": {}", r))
        .unwrap_or_default()
}

impl From<ControllerError> for TranslateError {
    fn from(err: ControllerError) -> Self {
        match err {
            ControllerError::Unavailable { status, reason } => {
                Self::EngineUnavailable { status, reason }
            }
            ControllerError::Stopped => Self::EngineUnavailable {
                status: EngineStatus::Uninitialized,
                reason: None,
            },
        }
    }
}
