//! Data Model: PipelineOutput, StageReport, SavedRule, Workspace
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stage::{Stage, StageId};

/// Result of running the pipeline over one text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineOutput {
    /// Every match of every stage, in stage order then scan order
    pub matches: Vec<String>,
    /// Text left after the last stage
    pub transformed_text: String,
}

impl PipelineOutput {
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty() && self.transformed_text.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: StageId,
    pub matches: usize,
    pub in_hash: String,
    pub out_hash: String,
}

/// A named rule kept in the rule library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedRule {
    /// Unique key
    pub name: String,
    pub pattern: String,
    #[serde(default)]
    pub flags: String,
    #[serde(default)]
    pub replacement: String,
}

impl SavedRule {
    /// Fresh pipeline stage carrying this rule.
    pub fn to_stage(&self) -> Stage {
        Stage::new(
            self.pattern.clone(),
            self.flags.clone(),
            self.replacement.clone(),
        )
    }

    pub fn from_stage(name: impl Into<String>, stage: &Stage) -> Self {
        Self {
            name: name.into(),
            pattern: stage.pattern.clone(),
            flags: stage.flags.clone(),
            replacement: stage.replacement.clone(),
        }
    }
}

/// A named snapshot of the input text and the ordered stage list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    /// Unique key
    pub name: String,
    pub text: String,
    #[serde(rename = "patterns")]
    pub stages: Vec<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl Workspace {
    pub fn new(name: impl Into<String>, text: impl Into<String>, stages: Vec<Stage>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            stages,
            saved_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_reads_legacy_record() {
        let raw = r#"{"name":"w","text":"hi","patterns":[{"id":"1","pattern":"h","flags":"g","replacement":""}]}"#;
        let ws: Workspace = serde_json::from_str(raw).unwrap();
        assert_eq!(ws.stages.len(), 1);
        assert_eq!(ws.stages[0].id.as_str(), "1");
        assert!(ws.saved_at.is_none());
    }

    #[test]
    fn test_saved_rule_to_stage_gets_fresh_id() {
        let rule = SavedRule {
            name: "digits".into(),
            pattern: r"\d+".into(),
            flags: "g".into(),
            replacement: "#".into(),
        };
        let a = rule.to_stage();
        let b = rule.to_stage();
        assert_ne!(a.id, b.id);
        assert_eq!(a.pattern, r"\d+");
    }
}
