//! Stage: one ordered rewrite rule of the pipeline
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::DEFAULT_FLAGS;

/// Stable, unique identifier of a stage inside a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageId(String);

impl StageId {
    /// Fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for StageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub id: StageId,
    /// Match expression
    pub pattern: String,
    /// Flag string, see [`crate::FlagSet`]
    #[serde(default)]
    pub flags: String,
    /// Replacement template, see [`crate::template`]
    #[serde(default)]
    pub replacement: String,
}

impl Stage {
    pub fn new(
        pattern: impl Into<String>,
        flags: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Self {
        Self {
            id: StageId::generate(),
            pattern: pattern.into(),
            flags: flags.into(),
            replacement: replacement.into(),
        }
    }

    /// Empty stage as added by "add pattern".
    pub fn blank() -> Self {
        Self::new("", DEFAULT_FLAGS, "")
    }

    pub fn with_id(mut self, id: impl Into<StageId>) -> Self {
        self.id = id.into();
        self
    }

    /// Parse the CLI shorthand `pattern[/flags[/replacement]]`.
    ///
    /// A backslash escapes the separator inside the pattern (`a\/b/g/x`).
    pub fn parse_spec(spec: &str) -> Self {
        let mut parts: Vec<String> = vec![String::new()];
        let mut chars = spec.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\\' if chars.peek() == Some(&'/') && parts.len() == 1 => {
                    chars.next();
                    parts[0].push('/');
                }
                '/' if parts.len() < 3 => parts.push(String::new()),
                _ => {
                    if let Some(last) = parts.last_mut() {
                        last.push(c);
                    }
                }
            }
        }
        let mut parts = parts.into_iter();
        let pattern = parts.next().unwrap_or_default();
        let flags = parts.next().unwrap_or_else(|| DEFAULT_FLAGS.to_string());
        let replacement = parts.next().unwrap_or_default();
        Self::new(pattern, flags, replacement)
    }
}
