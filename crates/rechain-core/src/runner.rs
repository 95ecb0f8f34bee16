//! Pipeline Engine: applies stages in order, collecting matches and rewriting text
use regex::{Captures, Regex};
use tracing::debug;

use crate::data_model::{PipelineOutput, StageReport};
use crate::error::PipelineError;
use crate::flags::FlagSet;
use crate::stage::Stage;
use crate::template::Template;

/// Stateless evaluator over a borrowed, ordered stage list.
///
/// Holds no caches: identical inputs always give identical outputs, so it
/// is safe to rebuild and run on every edit.
pub struct PipelineEngine<'s> {
    stages: &'s [Stage],
}

impl<'s> PipelineEngine<'s> {
    pub fn new(stages: &'s [Stage]) -> Self {
        Self { stages }
    }

    pub fn run(&self, text: &str) -> Result<PipelineOutput, PipelineError> {
        self.run_inner(text, None)
    }

    /// Like [`run`](Self::run), also returning one report per stage.
    pub fn run_traced(
        &self,
        text: &str,
    ) -> Result<(PipelineOutput, Vec<StageReport>), PipelineError> {
        let mut reports = Vec::with_capacity(self.stages.len());
        let output = self.run_inner(text, Some(&mut reports))?;
        Ok((output, reports))
    }

    /// Stage ids joined in application order.
    pub fn pipeline_id(&self) -> String {
        self.stages
            .iter()
            .map(|s| s.id.as_str())
            .collect::<Vec<_>>()
            .join("→")
    }

    fn run_inner(
        &self,
        text: &str,
        mut reports: Option<&mut Vec<StageReport>>,
    ) -> Result<PipelineOutput, PipelineError> {
        // Nothing to scan: the editor shows an empty result without judging patterns.
        if text.is_empty() {
            return Ok(PipelineOutput::default());
        }

        let mut current = text.to_string();
        let mut matches = Vec::new();

        for (index, stage) in self.stages.iter().enumerate() {
            let (regex, flags) = compile(stage, index)?;
            let template = Template::parse(&stage.replacement, &regex);

            let before = matches.len();
            let next = rewrite(&regex, &template, flags.sticky, &current, &mut matches);
            debug!(
                stage = %stage.id,
                index,
                matches = matches.len() - before,
                "stage applied"
            );

            if let Some(reports) = reports.as_deref_mut() {
                reports.push(StageReport {
                    stage: stage.id.clone(),
                    matches: matches.len() - before,
                    in_hash: hash_text(&current),
                    out_hash: hash_text(&next),
                });
            }
            current = next;
        }

        Ok(PipelineOutput {
            matches,
            transformed_text: current,
        })
    }
}

/// Apply `stages` to `text` in order.
pub fn apply(text: &str, stages: &[Stage]) -> Result<PipelineOutput, PipelineError> {
    PipelineEngine::new(stages).run(text)
}

/// Apply `stages` to `text`, also reporting per-stage match counts and digests.
pub fn apply_traced(
    text: &str,
    stages: &[Stage],
) -> Result<(PipelineOutput, Vec<StageReport>), PipelineError> {
    PipelineEngine::new(stages).run_traced(text)
}

fn compile(stage: &Stage, index: usize) -> Result<(Regex, FlagSet), PipelineError> {
    let invalid = |message: String| PipelineError::InvalidPattern {
        stage: stage.id.to_string(),
        index,
        message,
    };
    let flags = FlagSet::parse(&stage.flags).map_err(invalid)?;
    let regex = flags.compile(&stage.pattern).map_err(invalid)?;
    Ok((regex, flags))
}

/// Scan `haystack` once, push every match onto `matches` and return the rewritten text.
fn rewrite(
    regex: &Regex,
    template: &Template,
    sticky: bool,
    haystack: &str,
    matches: &mut Vec<String>,
) -> String {
    let found = scan(regex, haystack, sticky);

    let mut out = String::with_capacity(haystack.len());
    let mut last = 0;
    for caps in &found {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        matches.push(whole.as_str().to_string());
        out.push_str(&haystack[last..whole.start()]);
        template.expand(caps, haystack, &mut out);
        last = whole.end();
    }
    out.push_str(&haystack[last..]);
    out
}

/// Every match left to right, with `lastIndex` stepping: an empty match
/// right after a non-empty one is kept, and an empty match advances the
/// cursor by one char. Sticky scans stop at the first gap.
fn scan<'h>(regex: &Regex, haystack: &'h str, sticky: bool) -> Vec<Captures<'h>> {
    let mut found = Vec::new();
    let mut pos = 0;
    while pos <= haystack.len() {
        let Some(caps) = regex.captures_at(haystack, pos) else {
            break;
        };
        let Some(whole) = caps.get(0) else {
            break;
        };
        if sticky && whole.start() != pos {
            break;
        }
        pos = if whole.start() == whole.end() {
            haystack[whole.end()..]
                .chars()
                .next()
                .map_or(haystack.len() + 1, |c| whole.end() + c.len_utf8())
        } else {
            whole.end()
        };
        found.push(caps);
    }
    found
}

fn hash_text(text: &str) -> String {
    format!("blake3:{}", blake3::hash(text.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(pattern: &str, flags: &str, replacement: &str) -> Stage {
        Stage::new(pattern, flags, replacement)
    }

    #[test]
    fn test_worked_example() {
        let stages = vec![stage(r"\d", "g", ""), stage("a|b", "g", "X")];
        let out = apply("a1b2", &stages).unwrap();
        assert_eq!(out.matches, vec!["1", "2", "a", "b"]);
        assert_eq!(out.transformed_text, "XX");
    }

    #[test]
    fn test_find_all_without_global_flag() {
        let out = apply("aaa", &[stage("a", "", "b")]).unwrap();
        assert_eq!(out.matches.len(), 3);
        assert_eq!(out.transformed_text, "bbb");
    }

    #[test]
    fn test_sticky_stops_at_gap() {
        let out = apply("aab a", &[stage("a", "y", "-")]).unwrap();
        assert_eq!(out.matches, vec!["a", "a"]);
        assert_eq!(out.transformed_text, "--b a");

        let out = apply("ba", &[stage("a", "gy", "-")]).unwrap();
        assert!(out.matches.is_empty());
        assert_eq!(out.transformed_text, "ba");
    }

    #[test]
    fn test_empty_match_after_non_empty_match_is_kept() {
        let out = apply("aaa", &[stage("a*", "g", "-")]).unwrap();
        assert_eq!(out.matches, vec!["aaa", ""]);
        assert_eq!(out.transformed_text, "--");

        let out = apply("abc", &[stage("b*", "g", "-")]).unwrap();
        assert_eq!(out.matches, vec!["", "b", "", ""]);
        assert_eq!(out.transformed_text, "-a--c-");
    }

    #[test]
    fn test_sticky_and_global_agree_on_contiguous_matches() {
        let global = apply("aaa", &[stage("a*", "g", "-")]).unwrap();
        let sticky = apply("aaa", &[stage("a*", "gy", "-")]).unwrap();
        assert_eq!(global, sticky);
    }

    #[test]
    fn test_empty_match_steps_over_multibyte_chars() {
        let out = apply("é", &[stage("x*", "g", "-")]).unwrap();
        assert_eq!(out.matches, vec!["", ""]);
        assert_eq!(out.transformed_text, "-é-");
    }

    #[test]
    fn test_invalid_flag_is_invalid_pattern() {
        let err = apply("abc", &[stage("a", "q", "")]).unwrap_err();
        assert!(err.is_invalid_pattern());
    }

    #[test]
    fn test_error_reports_failing_index() {
        let stages = vec![stage("a", "g", ""), stage("(", "g", "")];
        match apply("abc", &stages).unwrap_err() {
            PipelineError::InvalidPattern { index, .. } => assert_eq!(index, 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_text_short_circuits() {
        let out = apply("", &[stage("(", "g", "")]).unwrap();
        assert_eq!(out, PipelineOutput::default());
    }

    #[test]
    fn test_trace_reports() {
        let stages = vec![stage("a", "g", "b"), stage("z", "g", "")];
        let (out, reports) = apply_traced("aa", &stages).unwrap();
        assert_eq!(out.transformed_text, "bb");
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].matches, 2);
        assert_ne!(reports[0].in_hash, reports[0].out_hash);
        assert_eq!(reports[1].in_hash, reports[1].out_hash);
        assert!(reports[1].in_hash.starts_with("blake3:"));
    }

    #[test]
    fn test_pipeline_id() {
        let stages = vec![
            stage("a", "g", "").with_id("one"),
            stage("b", "g", "").with_id("two"),
        ];
        assert_eq!(PipelineEngine::new(&stages).pipeline_id(), "one→two");
    }
}
