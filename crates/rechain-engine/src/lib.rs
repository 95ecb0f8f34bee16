//! Rechain Engine: on-device inference engine lifecycle
//!
//! Probes for an acceleration backend, loads the primary model, and keeps
//! it alive across device losses with exponential backoff, escalating to
//! the fallback model once the primary's retries are spent.

pub mod backend;
pub mod config;
pub mod controller;
pub mod metrics;
pub mod process;
pub mod state;

pub use backend::{
    BackendError, ChatMessage, ChatRole, CompletionOptions, DeviceSignal, EngineEvents,
    EngineHandle, InferenceBackend,
};
pub use config::{ConfigError, EngineConfig};
pub use controller::{ControllerError, ControllerHandle};
pub use metrics::ControllerMetrics;
pub use process::{ProcessBackend, ProcessBackendConfig};
pub use state::{EngineState, EngineStatus, FailureReason, ModelVariant};
