//! Workbench: the editable text + stage list, recomputed after every edit
use tracing::debug;

use crate::data_model::{PipelineOutput, Workspace};
use crate::error::PipelineError;
use crate::flags;
use crate::runner::apply;
use crate::stage::{Stage, StageId};

/// Editable pipeline session.
///
/// Every mutation reruns the pipeline synchronously. A pattern error
/// clears `output` and is kept in `error` until the next successful run;
/// the stages themselves stay as edited.
#[derive(Debug, Clone)]
pub struct Workbench {
    text: String,
    stages: Vec<Stage>,
    output: PipelineOutput,
    error: Option<PipelineError>,
}

impl Default for Workbench {
    fn default() -> Self {
        Self::new()
    }
}

impl Workbench {
    /// One blank stage, empty text.
    pub fn new() -> Self {
        Self::with_stages(String::new(), vec![Stage::blank()])
    }

    pub fn with_stages(text: impl Into<String>, stages: Vec<Stage>) -> Self {
        let mut bench = Self {
            text: text.into(),
            stages,
            output: PipelineOutput::default(),
            error: None,
        };
        bench.recompute();
        bench
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn output(&self) -> &PipelineOutput {
        &self.output
    }

    pub fn error(&self) -> Option<&PipelineError> {
        self.error.as_ref()
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.recompute();
    }

    /// Append a blank stage and return its id.
    pub fn add_stage(&mut self) -> StageId {
        self.push_stage(Stage::blank())
    }

    pub fn push_stage(&mut self, stage: Stage) -> StageId {
        let id = stage.id.clone();
        self.stages.push(stage);
        self.recompute();
        id
    }

    /// Append a stage built from a generated expression.
    pub fn insert_generated(&mut self, pattern: impl Into<String>) -> StageId {
        self.push_stage(Stage::new(pattern, crate::DEFAULT_FLAGS, ""))
    }

    pub fn set_pattern(&mut self, id: &StageId, pattern: impl Into<String>) -> Result<(), PipelineError> {
        self.stage_mut(id)?.pattern = pattern.into();
        self.recompute();
        Ok(())
    }

    pub fn set_flags(&mut self, id: &StageId, flags: impl Into<String>) -> Result<(), PipelineError> {
        self.stage_mut(id)?.flags = flags.into();
        self.recompute();
        Ok(())
    }

    pub fn toggle_flag(&mut self, id: &StageId, flag: char) -> Result<(), PipelineError> {
        let stage = self.stage_mut(id)?;
        stage.flags = flags::toggle(&stage.flags, flag);
        self.recompute();
        Ok(())
    }

    pub fn set_replacement(
        &mut self,
        id: &StageId,
        replacement: impl Into<String>,
    ) -> Result<(), PipelineError> {
        self.stage_mut(id)?.replacement = replacement.into();
        self.recompute();
        Ok(())
    }

    /// Remove a stage; the last remaining stage cannot be removed.
    pub fn remove_stage(&mut self, id: &StageId) -> Result<Stage, PipelineError> {
        let index = self.index_of(id)?;
        if self.stages.len() <= 1 {
            return Err(PipelineError::LastStage);
        }
        let removed = self.stages.remove(index);
        self.recompute();
        Ok(removed)
    }

    /// Move stage `from` to the position currently held by `to`.
    pub fn move_stage(&mut self, from: &StageId, to: &StageId) -> Result<(), PipelineError> {
        let old = self.index_of(from)?;
        let new = self.index_of(to)?;
        if old == new {
            return Ok(());
        }
        let stage = self.stages.remove(old);
        self.stages.insert(new, stage);
        self.recompute();
        Ok(())
    }

    /// Replace text and stages with a workspace snapshot.
    pub fn load_workspace(&mut self, workspace: &Workspace) {
        self.text = workspace.text.clone();
        self.stages = workspace.stages.clone();
        self.recompute();
    }

    pub fn snapshot(&self, name: impl Into<String>) -> Workspace {
        Workspace::new(name, self.text.clone(), self.stages.clone())
    }

    fn recompute(&mut self) {
        match apply(&self.text, &self.stages) {
            Ok(output) => {
                self.output = output;
                self.error = None;
            }
            Err(err) => {
                debug!(error = %err, "pipeline rejected");
                self.output = PipelineOutput::default();
                self.error = Some(err);
            }
        }
    }

    fn index_of(&self, id: &StageId) -> Result<usize, PipelineError> {
        self.stages
            .iter()
            .position(|s| &s.id == id)
            .ok_or_else(|| PipelineError::UnknownStage(id.to_string()))
    }

    fn stage_mut(&mut self, id: &StageId) -> Result<&mut Stage, PipelineError> {
        let index = self.index_of(id)?;
        Ok(&mut self.stages[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_has_one_blank_stage() {
        let bench = Workbench::new();
        assert_eq!(bench.stages().len(), 1);
        assert_eq!(bench.stages()[0].flags, "g");
        assert!(bench.output().is_empty());
    }

    #[test]
    fn test_invalid_pattern_clears_output() {
        let mut bench = Workbench::with_stages("abc", vec![Stage::new("b", "g", "X")]);
        assert_eq!(bench.output().transformed_text, "aXc");

        let id = bench.stages()[0].id.clone();
        bench.set_pattern(&id, "(b").unwrap();
        assert!(bench.error().unwrap().is_invalid_pattern());
        assert!(bench.output().matches.is_empty());
        assert_eq!(bench.output().transformed_text, "");
        assert_eq!(bench.stages()[0].pattern, "(b");

        bench.set_pattern(&id, "(b)").unwrap();
        assert!(bench.error().is_none());
        assert_eq!(bench.output().matches, vec!["b"]);
    }

    #[test]
    fn test_cannot_remove_last_stage() {
        let mut bench = Workbench::new();
        let id = bench.stages()[0].id.clone();
        assert_eq!(bench.remove_stage(&id), Err(PipelineError::LastStage));

        let second = bench.add_stage();
        bench.remove_stage(&id).unwrap();
        assert_eq!(bench.stages()[0].id, second);
    }

    #[test]
    fn test_move_stage_changes_result() {
        let a = Stage::new("a", "g", "b").with_id("a");
        let b = Stage::new("b", "g", "c").with_id("b");
        let mut bench = Workbench::with_stages("a", vec![a, b]);
        assert_eq!(bench.output().transformed_text, "c");

        bench.move_stage(&"b".into(), &"a".into()).unwrap();
        assert_eq!(bench.stages()[0].id.as_str(), "b");
        assert_eq!(bench.output().transformed_text, "b");
    }

    #[test]
    fn test_unknown_stage() {
        let mut bench = Workbench::new();
        let err = bench.set_flags(&"missing".into(), "i").unwrap_err();
        assert_eq!(err, PipelineError::UnknownStage("missing".into()));
    }

    #[test]
    fn test_toggle_flag_and_snapshot_roundtrip() {
        let mut bench = Workbench::with_stages("AbA", vec![Stage::new("a", "g", "_").with_id("s")]);
        bench.toggle_flag(&"s".into(), 'i').unwrap();
        assert_eq!(bench.output().transformed_text, "_b_");

        let ws = bench.snapshot("demo");
        let mut other = Workbench::new();
        other.load_workspace(&ws);
        assert_eq!(other.output(), bench.output());
        assert_eq!(other.stages()[0].flags, "gi");
    }

    #[test]
    fn test_insert_generated_appends() {
        let mut bench = Workbench::with_stages("x1", vec![Stage::new("x", "g", "").with_id("s")]);
        let id = bench.insert_generated(r"\d");
        assert_eq!(bench.stages().last().unwrap().id, id);
        assert_eq!(bench.output().matches, vec!["x", "1"]);
    }
}
