//! Rule and workspace libraries over a key-value store
use chrono::Utc;
use rechain_core::{SavedRule, Workspace};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::kv::KeyValueStore;
use crate::{SAVED_RULES_KEY, WORKSPACES_KEY};

/// Read a JSON array record. A malformed record reads as empty.
fn read_list<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Result<Vec<T>, StoreError> {
    let Some(raw) = store.get(key)? else {
        return Ok(Vec::new());
    };
    match decode(key, &raw) {
        Ok(items) => Ok(items),
        Err(err) => {
            warn!(%key, error = %err, "ignoring unreadable record");
            Ok(Vec::new())
        }
    }
}

fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Result<Vec<T>, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn write_list<T: Serialize>(store: &dyn KeyValueStore, key: &str, items: &[T]) -> Result<(), StoreError> {
    let raw = serde_json::to_string(items)?;
    store.set(key, &raw)
}

/// Saved rules, keyed by name.
pub struct RuleLibrary<S> {
    store: S,
}

impl<S: KeyValueStore> RuleLibrary<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Result<Vec<SavedRule>, StoreError> {
        read_list(&self.store, SAVED_RULES_KEY)
    }

    pub fn get(&self, name: &str) -> Result<Option<SavedRule>, StoreError> {
        Ok(self.list()?.into_iter().find(|r| r.name == name))
    }

    /// Insert or replace by name. Blank names and blank patterns are rejected.
    pub fn save(&self, mut rule: SavedRule) -> Result<(), StoreError> {
        rule.name = rule.name.trim().to_string();
        if rule.name.is_empty() || rule.pattern.trim().is_empty() {
            return Err(StoreError::Rejected(
                "a saved rule needs a name and a pattern".to_string(),
            ));
        }

        let mut rules = self.list()?;
        match rules.iter_mut().find(|r| r.name == rule.name) {
            Some(existing) => *existing = rule,
            None => rules.push(rule),
        }
        write_list(&self.store, SAVED_RULES_KEY, &rules)
    }

    /// Returns whether a rule was removed.
    pub fn delete(&self, name: &str) -> Result<bool, StoreError> {
        let mut rules = self.list()?;
        let before = rules.len();
        rules.retain(|r| r.name != name);
        if rules.len() == before {
            return Ok(false);
        }
        write_list(&self.store, SAVED_RULES_KEY, &rules)?;
        Ok(true)
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        info!("clearing saved rules");
        self.store.remove(SAVED_RULES_KEY)
    }
}

/// Workspace snapshots, keyed by name.
pub struct WorkspaceLibrary<S> {
    store: S,
}

impl<S: KeyValueStore> WorkspaceLibrary<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Result<Vec<Workspace>, StoreError> {
        read_list(&self.store, WORKSPACES_KEY)
    }

    pub fn get(&self, name: &str) -> Result<Option<Workspace>, StoreError> {
        Ok(self.list()?.into_iter().find(|w| w.name == name))
    }

    /// Insert or replace by trimmed name, stamping `saved_at`.
    pub fn save(&self, mut workspace: Workspace) -> Result<(), StoreError> {
        workspace.name = workspace.name.trim().to_string();
        if workspace.name.is_empty() {
            return Err(StoreError::Rejected("a workspace needs a name".to_string()));
        }
        workspace.saved_at = Some(Utc::now());

        let mut workspaces = self.list()?;
        match workspaces.iter_mut().find(|w| w.name == workspace.name) {
            Some(existing) => *existing = workspace,
            None => workspaces.push(workspace),
        }
        write_list(&self.store, WORKSPACES_KEY, &workspaces)
    }

    pub fn delete(&self, name: &str) -> Result<bool, StoreError> {
        let mut workspaces = self.list()?;
        let before = workspaces.len();
        workspaces.retain(|w| w.name != name);
        if workspaces.len() == before {
            return Ok(false);
        }
        write_list(&self.store, WORKSPACES_KEY, &workspaces)?;
        Ok(true)
    }
}
