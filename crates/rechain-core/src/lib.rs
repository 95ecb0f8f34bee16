//! Rechain Core: Stage model, Pipeline Engine and Workbench
//!
//! Sequential rewrite pipeline: each stage scans the text left by the
//! previous stage, collects its matches, then rewrites every occurrence.
//!
//! ```text
//! text → stage 1 → stage 2 → … → stage n → transformed text
//!          ↓          ↓              ↓
//!       matches ++ matches ++ … ++ matches
//! ```

pub mod clipboard;
pub mod data_model;
pub mod error;
pub mod flags;
pub mod runner;
pub mod stage;
pub mod template;
pub mod workbench;

pub use clipboard::{ClipboardError, ClipboardSink};
pub use data_model::{PipelineOutput, SavedRule, StageReport, Workspace};
pub use error::PipelineError;
pub use flags::FlagSet;
pub use runner::{apply, apply_traced, PipelineEngine};
pub use stage::{Stage, StageId};
pub use workbench::Workbench;

/// Flag string given to freshly created stages.
pub const DEFAULT_FLAGS: &str = "g";
