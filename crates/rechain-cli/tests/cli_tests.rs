//! Command tests over an in-memory store.

use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use rechain_cli::cli::{Cli, Command};
use rechain_cli::commands::{generate, run_apply, run_rules, run_workspace};
use rechain_engine::{
    BackendError, ChatMessage, CompletionOptions, ControllerHandle, EngineConfig, EngineEvents,
    EngineHandle, InferenceBackend,
};
use rechain_store::{MemoryStore, WorkspaceLibrary};

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("rechain").chain(args.iter().copied())).unwrap()
}

fn exec(store: &MemoryStore, args: &[&str]) -> anyhow::Result<String> {
    let cli = parse(args);
    let mut out = Vec::new();
    match &cli.command {
        Command::Apply(args) => run_apply(args, store, &mut out)?,
        Command::Rules(command) => run_rules(command, store, &mut out)?,
        Command::Workspace(command) => run_workspace(command, store, &mut out)?,
        other => panic!("not a store command: {:?}", other),
    }
    Ok(String::from_utf8(out).unwrap())
}

// ============================================================================
// apply
// ============================================================================

#[test]
fn test_apply_inline_stages() {
    let store = MemoryStore::new();
    let out = exec(
        &store,
        &["apply", "--text", "a1b2", "--stage", r"\d/g/", "--stage", "[ab]/g/X"],
    )
    .unwrap();
    assert_eq!(out, "matches (4):\n  1\n  2\n  a\n  b\ntransformed:\nXX\n");
}

#[test]
fn test_apply_invalid_pattern_fails() {
    let store = MemoryStore::new();
    let err = exec(&store, &["apply", "--text", "abc", "--stage", "(a"]).unwrap_err();
    assert!(err.to_string().starts_with("PATTERN/"));
}

#[test]
fn test_apply_needs_text() {
    let store = MemoryStore::new();
    assert!(exec(&store, &["apply", "--stage", "a"]).is_err());
}

#[test]
fn test_apply_json_trace() {
    let store = MemoryStore::new();
    let out = exec(
        &store,
        &["apply", "--text", "x-y", "--stage=-/g/+", "--json", "--trace"],
    )
    .unwrap();
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["transformed_text"], "x+y");
    assert_eq!(value["matches"], serde_json::json!(["-"]));
    assert_eq!(value["stages"].as_array().unwrap().len(), 1);
    assert_eq!(value["stages"][0]["matches"], 1);
}

#[test]
fn test_apply_copies_matches_to_file() {
    let store = MemoryStore::new();
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("clip.txt");
    let target_str = target.to_str().unwrap();
    exec(
        &store,
        &[
            "apply", "--text", "a1b2", "--stage", r"\d", "--copy", "matches", "--copy-to",
            target_str,
        ],
    )
    .unwrap();
    assert_eq!(std::fs::read_to_string(&target).unwrap(), "1\n2");
}

// ============================================================================
// rules and workspaces
// ============================================================================

#[test]
fn test_saved_rules_feed_apply() {
    let store = MemoryStore::new();
    exec(&store, &["rules", "save", "digits", r"\d+", "--replacement", "#"]).unwrap();
    exec(&store, &["rules", "save", "digits", r"\d", "--replacement", "N"]).unwrap();

    let listed = exec(&store, &["rules", "list"]).unwrap();
    assert_eq!(listed.lines().count(), 1);
    assert!(listed.starts_with("digits\t/\\d/g\t\"N\""));

    let out = exec(&store, &["apply", "--text", "a12", "--rule", "digits"]).unwrap();
    assert!(out.ends_with("transformed:\naNN\n"));

    assert!(exec(&store, &["apply", "--text", "a", "--rule", "missing"]).is_err());
}

#[test]
fn test_rules_delete_and_clear() {
    let store = MemoryStore::new();
    exec(&store, &["rules", "save", "one", "1"]).unwrap();
    exec(&store, &["rules", "save", "two", "2"]).unwrap();

    exec(&store, &["rules", "delete", "one"]).unwrap();
    assert!(exec(&store, &["rules", "delete", "one"]).is_err());
    assert_eq!(exec(&store, &["rules", "list"]).unwrap().lines().count(), 1);

    exec(&store, &["rules", "clear"]).unwrap();
    assert_eq!(exec(&store, &["rules", "list"]).unwrap(), "");
}

#[test]
fn test_workspace_roundtrip_through_apply() {
    let store = MemoryStore::new();
    exec(
        &store,
        &["workspace", "save", "ws", "--text", "a1b2", "--stage", r"\d/g/", "--stage", "[ab]/g/X"],
    )
    .unwrap();

    let out = exec(&store, &["apply", "--workspace", "ws"]).unwrap();
    assert!(out.ends_with("transformed:\nXX\n"));

    // explicit text wins over the snapshot
    let out = exec(&store, &["apply", "--workspace", "ws", "--text", "b3"]).unwrap();
    assert!(out.ends_with("transformed:\nX\n"));

    let shown = exec(&store, &["workspace", "show", "ws"]).unwrap();
    let value: serde_json::Value = serde_json::from_str(&shown).unwrap();
    assert_eq!(value["patterns"].as_array().unwrap().len(), 2);

    exec(&store, &["workspace", "delete", "ws"]).unwrap();
    assert!(exec(&store, &["apply", "--workspace", "ws"]).is_err());
}

// ============================================================================
// generate
// ============================================================================

struct CannedBackend;

struct CannedEngine;

#[async_trait]
impl InferenceBackend for CannedBackend {
    async fn probe(&self) -> bool {
        true
    }

    async fn create_engine(
        &self,
        _model_id: &str,
        _events: EngineEvents,
    ) -> Result<Box<dyn EngineHandle>, BackendError> {
        Ok(Box::new(CannedEngine))
    }
}

#[async_trait]
impl EngineHandle for CannedEngine {
    async fn complete_chat(
        &self,
        _messages: &[ChatMessage],
        _options: &CompletionOptions,
    ) -> Result<String, BackendError> {
        Ok("```json\n{\"regex\":\"\\\\d+\"}\n```".to_string())
    }

    async fn dispose(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_generate_appends_stage() {
    let store = MemoryStore::new();
    exec(&store, &["workspace", "save", "ws", "--text", "id 42", "--stage", "id/g/ID"]).unwrap();

    let controller = ControllerHandle::start(Arc::new(CannedBackend), EngineConfig::default()).unwrap();
    let mut out = Vec::new();
    generate(
        &controller,
        &EngineConfig::default(),
        "numbers",
        Some("ws"),
        &store,
        &mut out,
    )
    .await
    .unwrap();
    controller.shutdown().await.unwrap();

    assert_eq!(String::from_utf8(out).unwrap(), "\\d+\n");
    let workspace = WorkspaceLibrary::new(&store).get("ws").unwrap().unwrap();
    assert_eq!(workspace.stages.len(), 2);
    assert_eq!(workspace.stages[1].pattern, r"\d+");
    assert_eq!(workspace.stages[1].flags, "g");
}

#[tokio::test(start_paused = true)]
async fn test_generate_without_engine_fails() {
    struct NoBackend;

    #[async_trait]
    impl InferenceBackend for NoBackend {
        async fn probe(&self) -> bool {
            false
        }

        async fn create_engine(
            &self,
            _model_id: &str,
            _events: EngineEvents,
        ) -> Result<Box<dyn EngineHandle>, BackendError> {
            Err(BackendError::Load("unreachable".to_string()))
        }
    }

    let store = MemoryStore::new();
    let controller = ControllerHandle::start(Arc::new(NoBackend), EngineConfig::default()).unwrap();
    let mut out = Vec::new();
    let err = generate(&controller, &EngineConfig::default(), "numbers", None, &store, &mut out)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("unavailable"));
    assert!(out.is_empty());
}
