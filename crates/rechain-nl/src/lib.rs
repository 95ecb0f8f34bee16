//! Rechain NL: natural language to rewrite-rule translation
//!
//! Sends one deterministic completion request to the engine held by a
//! [`rechain_engine::ControllerHandle`] and recovers the generated pattern
//! from the model's JSON reply.
//!
//! # Example
//!
//! ```ignore
//! use rechain_nl::Translator;
//!
//! let translator = Translator::new(controller, config.completion.clone());
//! let pattern = translator.translate("every run of digits").await?;
//! workbench.insert_generated(pattern);
//! ```

pub mod error;
pub mod reply;
pub mod translator;

pub use error::TranslateError;
pub use reply::extract_pattern;
pub use translator::Translator;

/// Fixed system instruction constraining the reply to one JSON field.
pub const SYSTEM_PROMPT: &str = "Output ONLY JSON {\"regex\":\"...\"}";
