//! One-shot description → pattern adapter over the engine controller.
use rechain_engine::{ChatMessage, CompletionOptions, ControllerHandle};
use tracing::{debug, info};

use crate::error::TranslateError;
use crate::reply::extract_pattern;
use crate::SYSTEM_PROMPT;

/// Translates natural language descriptions into pattern sources.
///
/// Never touches pipeline state; the caller installs the returned pattern.
#[derive(Clone)]
pub struct Translator {
    controller: ControllerHandle,
    options: CompletionOptions,
}

impl Translator {
    /// Requests are always zero-temperature and non-streaming; only the
    /// token bound of `options` is taken as given.
    pub fn new(controller: ControllerHandle, options: CompletionOptions) -> Self {
        Self {
            controller,
            options: CompletionOptions {
                temperature: 0.0,
                stream: false,
                ..options
            },
        }
    }

    pub async fn translate(&self, description: &str) -> Result<String, TranslateError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(TranslateError::EmptyDescription);
        }

        let state = self.controller.state();
        if !state.is_ready() {
            return Err(TranslateError::EngineUnavailable {
                status: state.status,
                reason: state.last_failure,
            });
        }
        let engine = self.controller.acquire().await?;

        let messages = [ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(description)];
        let reply = engine.complete_chat(&messages, &self.options).await?;
        debug!(reply = %reply, "model reply");

        let pattern = extract_pattern(&reply)?;
        info!(variant = %state.variant, pattern = %pattern, "pattern generated");
        Ok(pattern)
    }
}
