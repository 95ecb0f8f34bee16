//! Backend seam: probing, engine construction and chat completion
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::WeakUnboundedSender;

use crate::controller::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub stream: bool,
}

fn default_max_tokens() -> u32 {
    100
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            stream: false,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("BACKEND/load: {0}")]
    Load(String),

    #[error("BACKEND/completion: {0}")]
    Completion(String),

    #[error("BACKEND/disposed")]
    Disposed,

    #[error("BACKEND/dispose: {0}")]
    Dispose(String),
}

/// Asynchronous notification from a loaded engine.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceSignal {
    Progress(f32),
    DeviceError(String),
    DeviceLost(String),
}

/// Notification channel handed to one engine instance.
///
/// Every signal carries the load generation the engine was built for, so
/// reports from a replaced engine are recognised and dropped.
#[derive(Clone)]
pub struct EngineEvents {
    generation: u64,
    tx: WeakUnboundedSender<Command>,
}

impl std::fmt::Debug for EngineEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineEvents")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl EngineEvents {
    pub(crate) fn new(generation: u64, tx: WeakUnboundedSender<Command>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn progress(&self, fraction: f32) {
        self.send(DeviceSignal::Progress(fraction.clamp(0.0, 1.0)));
    }

    pub fn device_error(&self, message: impl Into<String>) {
        self.send(DeviceSignal::DeviceError(message.into()));
    }

    pub fn device_lost(&self, message: impl Into<String>) {
        self.send(DeviceSignal::DeviceLost(message.into()));
    }

    fn send(&self, signal: DeviceSignal) {
        // controller gone: nothing left to notify
        if let Some(tx) = self.tx.upgrade() {
            let _ = tx.send(Command::Device {
                generation: self.generation,
                signal,
            });
        }
    }
}

/// Hardware backend able to build engines for a model id.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Whether the required acceleration backend can be acquired.
    async fn probe(&self) -> bool;

    async fn create_engine(
        &self,
        model_id: &str,
        events: EngineEvents,
    ) -> Result<Box<dyn EngineHandle>, BackendError>;
}

/// One live engine resource.
#[async_trait]
pub trait EngineHandle: Send + Sync {
    async fn complete_chat(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String, BackendError>;

    async fn dispose(&self) -> Result<(), BackendError>;
}
