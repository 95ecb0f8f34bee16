//! Published controller state
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    Primary,
    Fallback,
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => f.write_str("primary"),
            Self::Fallback => f.write_str("fallback"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    Uninitialized,
    ProbingBackend,
    Loading,
    Ready,
    Failed,
    /// A backoff timer is pending; a reload follows when it fires.
    Retrying,
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Uninitialized => "uninitialized",
            Self::ProbingBackend => "probing_backend",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Retrying => "retrying",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum FailureReason {
    /// No acceleration backend could be acquired.
    BackendUnavailable,
    /// Engine construction failed.
    LoadFailed(String),
    /// The loaded engine reported a device error or device loss.
    DeviceLost(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BackendUnavailable => f.write_str("acceleration backend unavailable"),
            Self::LoadFailed(msg) => write!(f, "model load failed: {}", msg),
            Self::DeviceLost(msg) => write!(f, "device lost: {}", msg),
        }
    }
}

/// Snapshot published on every transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineState {
    pub status: EngineStatus,
    pub variant: ModelVariant,
    pub retry_count: u32,
    pub last_failure: Option<FailureReason>,
    /// Load attempt the state refers to
    pub generation: u64,
    /// Last progress report of the in-flight load (0.0..=1.0)
    pub load_progress: Option<f32>,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            status: EngineStatus::Uninitialized,
            variant: ModelVariant::Primary,
            retry_count: 0,
            last_failure: None,
            generation: 0,
            load_progress: None,
        }
    }
}

impl EngineState {
    pub fn is_ready(&self) -> bool {
        self.status == EngineStatus::Ready
    }

    /// Ready, or failed with no automatic recovery pending.
    pub fn is_settled(&self) -> bool {
        matches!(self.status, EngineStatus::Ready | EngineStatus::Failed)
    }
}
