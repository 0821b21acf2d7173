use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::{ActionsError, Result};
use crate::types::{ActionId, ActionInstance};

use super::ActionStore;

#[derive(Debug)]
struct Inner {
    rows: BTreeMap<ActionId, ActionInstance>,
    /// `None` once `u64::MAX` has been taken.
    next_id: Option<u64>,
}

/// In-process action store for embedding hosts and tests.
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                rows: BTreeMap::new(),
                next_id: Some(1),
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| ActionsError::Store("memory store lock poisoned".into()))
    }
}

impl Inner {
    fn put(&mut self, row: &ActionInstance) {
        if let (ActionId::Configurable(n), Some(next)) = (&row.id, self.next_id) {
            if *n >= next {
                self.next_id = n.checked_add(1);
            }
        }
        self.rows.insert(row.id.clone(), row.clone());
    }
}

impl ActionStore for MemoryStore {
    fn select_all(&self) -> Result<Vec<ActionInstance>> {
        Ok(self.lock()?.rows.values().cloned().collect())
    }

    fn select_by_id(&self, id: &ActionId) -> Result<Option<ActionInstance>> {
        Ok(self.lock()?.rows.get(id).cloned())
    }

    fn select_by_ids(&self, ids: &[ActionId]) -> Result<Vec<ActionInstance>> {
        let inner = self.lock()?;
        Ok(ids.iter().filter_map(|id| inner.rows.get(id).cloned()).collect())
    }

    fn insert(&self, row: &ActionInstance) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.rows.contains_key(&row.id) {
            return Err(ActionsError::ActionExists(row.id.to_string()));
        }
        inner.put(row);
        Ok(())
    }

    fn merge(&self, row: &ActionInstance) -> Result<()> {
        self.lock()?.put(row);
        Ok(())
    }

    fn delete(&self, id: &ActionId) -> Result<bool> {
        Ok(self.lock()?.rows.remove(id).is_some())
    }

    fn next_id(&self) -> Result<u64> {
        let mut inner = self.lock()?;
        let id = inner
            .next_id
            .ok_or_else(|| ActionsError::Store("id sequence exhausted".into()))?;
        inner.next_id = id.checked_add(1);
        Ok(id)
    }
}
