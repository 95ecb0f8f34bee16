//! Local process backend
//!
//! Runs a llama.cpp-style command line binary once per completion. Model
//! ids map to `<model_dir>/<model_id>.<extension>` files.
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::backend::{
    BackendError, ChatMessage, ChatRole, CompletionOptions, EngineEvents, EngineHandle,
    InferenceBackend,
};

pub const DEFAULT_EXECUTABLE: &str = "llama-cli";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessBackendConfig {
    /// Binary name or path, resolved through `PATH`
    pub executable: String,
    pub model_dir: PathBuf,
    pub model_extension: String,
    /// Passed before the generated arguments
    pub extra_args: Vec<String>,
}

impl Default for ProcessBackendConfig {
    fn default() -> Self {
        Self {
            executable: DEFAULT_EXECUTABLE.to_string(),
            model_dir: PathBuf::from("models"),
            model_extension: "gguf".to_string(),
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessBackend {
    config: ProcessBackendConfig,
}

impl ProcessBackend {
    pub fn new(config: ProcessBackendConfig) -> Self {
        Self { config }
    }

    pub fn model_path(&self, model_id: &str) -> PathBuf {
        self.config
            .model_dir
            .join(format!("{}.{}", model_id, self.config.model_extension))
    }
}

#[async_trait]
impl InferenceBackend for ProcessBackend {
    async fn probe(&self) -> bool {
        let executable = match which::which(&self.config.executable) {
            Ok(path) => path,
            Err(err) => {
                warn!(executable = %self.config.executable, error = %err, "inference executable not found");
                return false;
            }
        };
        if !self.config.model_dir.is_dir() {
            warn!(model_dir = %self.config.model_dir.display(), "model directory missing");
            return false;
        }
        debug!(executable = %executable.display(), "inference backend available");
        true
    }

    async fn create_engine(
        &self,
        model_id: &str,
        events: EngineEvents,
    ) -> Result<Box<dyn EngineHandle>, BackendError> {
        events.progress(0.0);
        let executable = which::which(&self.config.executable)
            .map_err(|e| BackendError::Load(format!("{}: {}", self.config.executable, e)))?;
        let model = self.model_path(model_id);
        if !model.is_file() {
            return Err(BackendError::Load(format!(
                "model file not found: {}",
                model.display()
            )));
        }
        events.progress(1.0);

        Ok(Box::new(ProcessEngine {
            executable,
            model,
            extra_args: self.config.extra_args.clone(),
            events,
            disposed: AtomicBool::new(false),
        }))
    }
}

struct ProcessEngine {
    executable: PathBuf,
    model: PathBuf,
    extra_args: Vec<String>,
    events: EngineEvents,
    disposed: AtomicBool,
}

#[async_trait]
impl EngineHandle for ProcessEngine {
    async fn complete_chat(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String, BackendError> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(BackendError::Disposed);
        }

        let output = Command::new(&self.executable)
            .args(&self.extra_args)
            .arg("-m")
            .arg(&self.model)
            .arg("-p")
            .arg(render_prompt(messages))
            .arg("-n")
            .arg(options.max_tokens.to_string())
            .arg("--temp")
            .arg(options.temperature.to_string())
            .arg("--no-display-prompt")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| BackendError::Completion(format!("spawn failed: {}", e)))?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        match output.status.code() {
            // no exit code: terminated by a signal
            None => {
                let message = format!("inference process terminated abnormally ({})", output.status);
                self.events.device_lost(message.clone());
                Err(BackendError::Completion(message))
            }
            Some(code) => Err(BackendError::Completion(format!(
                "exit code {}: {}",
                code, stderr
            ))),
        }
    }

    async fn dispose(&self) -> Result<(), BackendError> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Err(BackendError::Disposed);
        }
        debug!(generation = self.events.generation(), model = %self.model.display(), "engine disposed");
        Ok(())
    }
}

/// ChatML rendering understood by the Qwen instruct models.
fn render_prompt(messages: &[ChatMessage]) -> String {
    let mut prompt = String::new();
    for message in messages {
        let role = match message.role {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        };
        prompt.push_str("<|im_start|>");
        prompt.push_str(role);
        prompt.push('\n');
        prompt.push_str(&message.content);
        prompt.push_str("<|im_end|>\n");
    }
    prompt.push_str("<|im_start|>assistant\n");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DeviceSignal;
    use crate::controller::Command;
    use tokio::sync::mpsc;

    fn backend(dir: &std::path::Path, executable: &str, extra_args: &[&str]) -> ProcessBackend {
        ProcessBackend::new(ProcessBackendConfig {
            executable: executable.to_string(),
            model_dir: dir.to_path_buf(),
            model_extension: "gguf".to_string(),
            extra_args: extra_args.iter().map(|s| s.to_string()).collect(),
        })
    }

    #[test]
    fn test_render_prompt() {
        let prompt = render_prompt(&[ChatMessage::system("rules"), ChatMessage::user("digits")]);
        assert!(prompt.starts_with("<|im_start|>system\nrules<|im_end|>\n"));
        assert!(prompt.contains("<|im_start|>user\ndigits<|im_end|>\n"));
        assert!(prompt.ends_with("<|im_start|>assistant\n"));
    }

    #[tokio::test]
    async fn test_probe_requires_executable_and_model_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!backend(dir.path(), "rechain-no-such-binary", &[]).probe().await);
        assert!(!backend(&dir.path().join("missing"), "sh", &[]).probe().await);
        assert!(backend(dir.path(), "sh", &[]).probe().await);
    }

    #[tokio::test]
    async fn test_create_engine_requires_model_file() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let events = EngineEvents::new(1, tx.downgrade());

        let err = backend(dir.path(), "sh", &[])
            .create_engine("tiny", events.clone())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, BackendError::Load(_)));

        std::fs::write(dir.path().join("tiny.gguf"), b"weights").unwrap();
        assert!(backend(dir.path(), "sh", &[]).create_engine("tiny", events).await.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_completion_returns_stdout() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tiny.gguf"), b"weights").unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let engine = backend(dir.path(), "sh", &["-c", "echo '{\"regex\":\"x\"}'"])
            .create_engine("tiny", EngineEvents::new(1, tx.downgrade()))
            .await
            .ok()
            .unwrap();

        let reply = engine
            .complete_chat(&[ChatMessage::user("x")], &CompletionOptions::default())
            .await
            .unwrap();
        assert_eq!(reply, "{\"regex\":\"x\"}");

        engine.dispose().await.unwrap();
        assert_eq!(
            engine
                .complete_chat(&[ChatMessage::user("x")], &CompletionOptions::default())
                .await,
            Err(BackendError::Disposed)
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_killed_process_reports_device_lost() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tiny.gguf"), b"weights").unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let engine = backend(dir.path(), "sh", &["-c", "kill -9 $$"])
            .create_engine("tiny", EngineEvents::new(7, tx.downgrade()))
            .await
            .ok()
            .unwrap();

        let err = engine
            .complete_chat(&[ChatMessage::user("x")], &CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Completion(_)));

        let mut lost = false;
        while let Ok(command) = rx.try_recv() {
            if let Command::Device {
                generation: 7,
                signal: DeviceSignal::DeviceLost(_),
            } = command
            {
                lost = true;
            }
        }
        assert!(lost);
    }
}
