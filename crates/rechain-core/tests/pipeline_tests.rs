//! Integration tests for the rewrite pipeline.
//!
//! These cover the algebraic properties callers rely on when they rerun
//! the pipeline on every edit.

use rechain_core::{apply, PipelineError, Stage};

fn digits_removed() -> Stage {
    Stage::new(r"\d", "g", "")
}

fn letters_to_x() -> Stage {
    Stage::new("a|b", "g", "X")
}

// =============================================================================
// Properties
// =============================================================================

#[test]
fn test_apply_is_deterministic() {
    let stages = vec![
        Stage::new(r"(\w+)@(\w+)\.com", "gi", "$2:$1"),
        Stage::new(r"\s+", "g", " "),
    ];
    let text = "Mail bob@Example.com  or   amy@host.com";

    let first = apply(text, &stages).unwrap();
    let second = apply(text, &stages).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.transformed_text, "Mail Example:bob or host:amy");
}

#[test]
fn test_empty_stage_list_is_identity() {
    for text in ["", "plain", "multi\nline ✓"] {
        let out = apply(text, &[]).unwrap();
        assert!(out.matches.is_empty());
        assert_eq!(out.transformed_text, text);
    }
}

#[test]
fn test_composition_law() {
    let text = "a1b2 c3";
    let s1 = digits_removed();
    let s2 = Stage::new(r"[a-c]", "g", "<$&>");

    let both = apply(text, &[s1.clone(), s2.clone()]).unwrap();
    let first = apply(text, &[s1]).unwrap();
    let second = apply(&first.transformed_text, &[s2]).unwrap();

    assert_eq!(both.transformed_text, second.transformed_text);
    let mut expected = first.matches.clone();
    expected.extend(second.matches);
    assert_eq!(both.matches, expected);
}

#[test]
fn test_worked_example() {
    let out = apply("a1b2", &[digits_removed(), letters_to_x()]).unwrap();
    assert_eq!(out.matches, vec!["1", "2", "a", "b"]);
    assert_eq!(out.transformed_text, "XX");
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn test_unbalanced_group_is_invalid_pattern() {
    let err = apply("a1b2", &[digits_removed(), Stage::new("(ab", "g", "")]).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidPattern { index: 1, .. }));
    assert!(err.to_string().starts_with("PATTERN/"));
}

#[test]
fn test_later_stage_sees_earlier_output() {
    // stage 2 only matches text produced by stage 1
    let stages = vec![Stage::new("cat", "g", "dog"), Stage::new("dog", "g", "DOG")];
    let out = apply("cat dog", &stages).unwrap();
    assert_eq!(out.matches, vec!["cat", "dog", "dog"]);
    assert_eq!(out.transformed_text, "DOG DOG");
}

#[test]
fn test_flags_change_matching() {
    let text = "one\nTwo";
    let out = apply(text, &[Stage::new("^t", "gim", "_")]).unwrap();
    assert_eq!(out.transformed_text, "one\n_wo");

    let out = apply(text, &[Stage::new("one.Two", "s", "joined")]).unwrap();
    assert_eq!(out.transformed_text, "joined");
}

#[test]
fn test_empty_expression_matches_between_chars() {
    let out = apply("ab", &[Stage::new("", "g", "-")]).unwrap();
    assert_eq!(out.matches, vec!["", "", ""]);
    assert_eq!(out.transformed_text, "-a-b-");
}
