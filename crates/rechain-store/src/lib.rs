//! Rechain Store: key-value persistence for saved rules and workspaces
//!
//! The libraries only see the [`KeyValueStore`] trait; concrete backends
//! are injected, so the same code runs over memory in tests and over
//! files in the CLI.
pub mod error;
pub mod kv;
pub mod library;

pub use error::StoreError;
pub use kv::{FileStore, KeyValueStore, MemoryStore};
pub use library::{RuleLibrary, WorkspaceLibrary};

/// Key holding the JSON array of saved rules.
pub const SAVED_RULES_KEY: &str = "savedPatterns";

/// Key holding the JSON array of workspaces.
pub const WORKSPACES_KEY: &str = "workspaces";
