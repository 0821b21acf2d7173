//! Uncached views over persisted action rows, plus the explicit save and
//! delete operations that own row lifecycle outside synchronization.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::info;

use crate::error::{ActionsError, Result};
use crate::notify::Notifier;
use crate::store::ActionStore;
use crate::token::{build_token_map, TokenMap};
use crate::types::{ActionId, ActionInstance, ActionSummary, Configurability, Parameters};

// ---------------------------------------------------------------------------
// ActionDraft
// ---------------------------------------------------------------------------

/// A configurable instance about to be saved.
#[derive(Debug, Clone)]
pub struct ActionDraft {
    /// Reuse an existing id (edit) instead of allocating one.
    pub id: Option<u64>,
    pub action_type: String,
    pub handler_name: String,
    pub label: String,
    pub parameters: Parameters,
    pub configurable: Configurability,
    pub node_type: Option<String>,
    pub node_id: Option<u64>,
    pub trigger_names: BTreeSet<String>,
    pub source_file: Option<String>,
}

impl ActionDraft {
    pub fn new(
        handler_name: impl Into<String>,
        action_type: impl Into<String>,
        label: impl Into<String>,
        parameters: Parameters,
    ) -> Self {
        Self {
            id: None,
            action_type: action_type.into(),
            handler_name: handler_name.into(),
            label: label.into(),
            parameters,
            configurable: Configurability::Advanced,
            node_type: None,
            node_id: None,
            trigger_names: BTreeSet::new(),
            source_file: None,
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_configurable(mut self, configurable: Configurability) -> Self {
        self.configurable = configurable;
        self
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Registry {
    store: Arc<dyn ActionStore>,
}

impl Registry {
    pub fn new(store: Arc<dyn ActionStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn ActionStore {
        self.store.as_ref()
    }

    pub fn load(&self, id: &ActionId) -> Result<Option<ActionInstance>> {
        self.store.select_by_id(id)
    }

    /// Every row keyed by id, parameters stripped.
    pub fn list(&self) -> Result<BTreeMap<ActionId, ActionSummary>> {
        Ok(self
            .store
            .select_all()?
            .iter()
            .map(|row| (row.id.clone(), row.summary()))
            .collect())
    }

    /// Rows carrying stored parameters.
    pub fn list_configured(&self) -> Result<Vec<ActionInstance>> {
        self.store.select_configured()
    }

    /// Token map over every persisted row.
    pub fn token_map(&self) -> Result<TokenMap> {
        let rows = self.store.select_all()?;
        Ok(build_token_map(rows.iter()))
    }

    /// Persist a configurable instance, allocating an id when the draft has none.
    pub fn save(&self, draft: ActionDraft) -> Result<ActionId> {
        let id = match draft.id {
            Some(id) => id,
            None => self.store.next_id()?,
        };
        let row = ActionInstance {
            id: ActionId::Configurable(id),
            action_type: draft.action_type,
            handler_name: draft.handler_name,
            parameters: draft.parameters,
            label: draft.label,
            configurable: draft.configurable,
            node_type: draft.node_type,
            node_id: draft.node_id,
            trigger_names: draft.trigger_names,
            source_file: draft.source_file,
        };
        self.store.merge(&row)?;
        info!(id, label = %row.label, "action saved");
        Ok(row.id)
    }

    /// Delete a row and tell every listener about it.
    pub fn delete(&self, id: &ActionId, notifier: &Notifier) -> Result<()> {
        if !self.store.delete(id)? {
            return Err(ActionsError::ActionNotFound(id.to_string()));
        }
        notifier.broadcast(id);
        info!(id = %id, "action deleted");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
