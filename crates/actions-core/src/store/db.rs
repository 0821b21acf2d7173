//! Persistent storage for action rows using redb.
//!
//! # Table design
//!
//! `ACTIONS` uses a tagged byte key so the two identifier kinds can never
//! collide, even when an identity consists only of digits:
//! ```text
//! configurable: [ 0x00 | id: u64 big-endian (8 bytes) ]
//! simple:       [ 0x01 | identity utf-8 bytes ]
//! ```
//! Values are JSON-encoded `ActionInstance` rows; decoding happens here and
//! nowhere else.
//!
//! `META` holds the numeric id sequence under `next_id`.

use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition};

use crate::error::{ActionsError, Result};
use crate::types::{ActionId, ActionInstance};

use super::ActionStore;

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

const ACTIONS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("actions");
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

const NEXT_ID_KEY: &str = "next_id";
/// Stored under `next_id` once `u64::MAX` has been taken. Ids start at 1.
const SEQUENCE_EXHAUSTED: u64 = 0;

const TAG_CONFIGURABLE: u8 = 0x00;
const TAG_SIMPLE: u8 = 0x01;

// ---------------------------------------------------------------------------
// Key helpers
// ---------------------------------------------------------------------------

fn row_key(id: &ActionId) -> Vec<u8> {
    match id {
        ActionId::Configurable(n) => {
            let mut key = Vec::with_capacity(9);
            key.push(TAG_CONFIGURABLE);
            key.extend_from_slice(&n.to_be_bytes());
            key
        }
        ActionId::Simple(name) => {
            let mut key = Vec::with_capacity(1 + name.len());
            key.push(TAG_SIMPLE);
            key.extend_from_slice(name.as_bytes());
            key
        }
    }
}

fn db_err(e: impl std::fmt::Display) -> ActionsError {
    ActionsError::Store(e.to_string())
}

fn decode(bytes: &[u8]) -> Result<ActionInstance> {
    serde_json::from_slice(bytes).map_err(db_err)
}

// ---------------------------------------------------------------------------
// RedbStore
// ---------------------------------------------------------------------------

/// redb-backed [`ActionStore`].
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open or create the database at `path`, creating both tables.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path).map_err(db_err)?;
        let wt = db.begin_write().map_err(db_err)?;
        wt.open_table(ACTIONS).map_err(db_err)?;
        wt.open_table(META).map_err(db_err)?;
        wt.commit().map_err(db_err)?;
        Ok(Self { db })
    }

    /// Write `row` inside one transaction, keeping the id sequence ahead of
    /// any explicit configurable id.
    fn write_row(&self, row: &ActionInstance, must_be_new: bool) -> Result<()> {
        let key = row_key(&row.id);
        let value = serde_json::to_vec(row)?;
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut table = wt.open_table(ACTIONS).map_err(db_err)?;
            if must_be_new {
                let exists = table.get(key.as_slice()).map_err(db_err)?.is_some();
                if exists {
                    return Err(ActionsError::ActionExists(row.id.to_string()));
                }
            }
            table
                .insert(key.as_slice(), value.as_slice())
                .map_err(db_err)?;
        }
        if let ActionId::Configurable(n) = row.id {
            let mut meta = wt.open_table(META).map_err(db_err)?;
            let next = meta
                .get(NEXT_ID_KEY)
                .map_err(db_err)?
                .map(|g| g.value())
                .unwrap_or(1);
            if next != SEQUENCE_EXHAUSTED && n >= next {
                let bumped = n.checked_add(1).unwrap_or(SEQUENCE_EXHAUSTED);
                meta.insert(NEXT_ID_KEY, bumped).map_err(db_err)?;
            }
        }
        wt.commit().map_err(db_err)?;
        Ok(())
    }
}

impl ActionStore for RedbStore {
    fn select_all(&self) -> Result<Vec<ActionInstance>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(ACTIONS).map_err(db_err)?;

        let mut result = Vec::new();
        for entry in table.iter().map_err(db_err)? {
            let (_, v) = entry.map_err(db_err)?;
            result.push(decode(v.value())?);
        }
        Ok(result)
    }

    fn select_by_id(&self, id: &ActionId) -> Result<Option<ActionInstance>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(ACTIONS).map_err(db_err)?;
        let row = match table.get(row_key(id).as_slice()).map_err(db_err)? {
            Some(v) => Some(decode(v.value())?),
            None => None,
        };
        Ok(row)
    }

    fn select_by_ids(&self, ids: &[ActionId]) -> Result<Vec<ActionInstance>> {
        // One read transaction for the whole batch.
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(ACTIONS).map_err(db_err)?;
        let mut result = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(v) = table.get(row_key(id).as_slice()).map_err(db_err)? {
                result.push(decode(v.value())?);
            }
        }
        Ok(result)
    }

    fn insert(&self, row: &ActionInstance) -> Result<()> {
        self.write_row(row, true)
    }

    fn merge(&self, row: &ActionInstance) -> Result<()> {
        self.write_row(row, false)
    }

    fn delete(&self, id: &ActionId) -> Result<bool> {
        let key = row_key(id);
        let wt = self.db.begin_write().map_err(db_err)?;
        let removed = {
            let mut table = wt.open_table(ACTIONS).map_err(db_err)?;
            let old = table.remove(key.as_slice()).map_err(db_err)?;
            old.is_some()
        };
        wt.commit().map_err(db_err)?;
        Ok(removed)
    }

    fn next_id(&self) -> Result<u64> {
        let wt = self.db.begin_write().map_err(db_err)?;
        let id = {
            let mut meta = wt.open_table(META).map_err(db_err)?;
            let next = meta
                .get(NEXT_ID_KEY)
                .map_err(db_err)?
                .map(|g| g.value())
                .unwrap_or(1);
            if next == SEQUENCE_EXHAUSTED {
                return Err(ActionsError::Store("id sequence exhausted".into()));
            }
            let bumped = next.checked_add(1).unwrap_or(SEQUENCE_EXHAUSTED);
            meta.insert(NEXT_ID_KEY, bumped).map_err(db_err)?;
            next
        };
        wt.commit().map_err(db_err)?;
        Ok(id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Configurability, Parameters};
    use tempfile::TempDir;

    fn open_tmp() -> (TempDir, RedbStore) {
        let dir = TempDir::new().unwrap();
        let store = RedbStore::open(&dir.path().join("actions.db")).unwrap();
        (dir, store)
    }

    fn row(id: ActionId, params: Parameters) -> ActionInstance {
        ActionInstance {
            handler_name: "system_message_action".into(),
            id,
            action_type: "system".into(),
            parameters: params,
            label: "Display a message".into(),
            configurable: Configurability::WithForm,
            node_type: None,
            node_id: None,
            trigger_names: Default::default(),
            source_file: None,
        }
    }

    fn message(text: &str) -> Parameters {
        let mut p = Parameters::new();
        p.insert("message".into(), serde_json::json!(text));
        p
    }

    #[test]
    fn insert_and_select_by_id() {
        let (_dir, store) = open_tmp();
        let r = row(ActionId::Configurable(3), message("hi"));
        store.insert(&r).unwrap();
        let loaded = store.select_by_id(&ActionId::Configurable(3)).unwrap();
        assert_eq!(loaded, Some(r));
        assert!(store.select_by_id(&ActionId::Configurable(4)).unwrap().is_none());
    }

    #[test]
    fn numeric_identity_does_not_collide_with_configurable_id() {
        let (_dir, store) = open_tmp();
        store
            .insert(&row(ActionId::Configurable(7), message("number")))
            .unwrap();
        store
            .insert(&row(ActionId::simple("7"), Parameters::new()))
            .unwrap();
        assert_eq!(store.select_all().unwrap().len(), 2);
    }

    #[test]
    fn insert_rejects_existing_id() {
        let (_dir, store) = open_tmp();
        let r = row(ActionId::simple("flag_node"), Parameters::new());
        store.insert(&r).unwrap();
        assert!(matches!(
            store.insert(&r),
            Err(ActionsError::ActionExists(_))
        ));
    }

    #[test]
    fn merge_replaces_existing_row() {
        let (_dir, store) = open_tmp();
        store
            .insert(&row(ActionId::Configurable(1), message("old")))
            .unwrap();
        store
            .merge(&row(ActionId::Configurable(1), message("new")))
            .unwrap();
        let loaded = store.select_by_id(&ActionId::Configurable(1)).unwrap().unwrap();
        assert_eq!(loaded.parameters["message"], "new");
    }

    #[test]
    fn select_by_ids_reads_batch_and_skips_missing() {
        let (_dir, store) = open_tmp();
        store
            .insert(&row(ActionId::Configurable(1), message("a")))
            .unwrap();
        store
            .insert(&row(ActionId::Configurable(2), message("b")))
            .unwrap();
        let rows = store
            .select_by_ids(&[
                ActionId::Configurable(2),
                ActionId::Configurable(9),
                ActionId::Configurable(1),
            ])
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn select_configured_skips_rows_without_parameters() {
        let (_dir, store) = open_tmp();
        store
            .insert(&row(ActionId::Configurable(1), message("a")))
            .unwrap();
        store
            .insert(&row(ActionId::simple("flag_node"), Parameters::new()))
            .unwrap();
        let configured = store.select_configured().unwrap();
        assert_eq!(configured.len(), 1);
        assert_eq!(configured[0].id, ActionId::Configurable(1));
    }

    #[test]
    fn delete_removes_row() {
        let (_dir, store) = open_tmp();
        store
            .insert(&row(ActionId::simple("flag_node"), Parameters::new()))
            .unwrap();
        assert!(store.delete(&ActionId::simple("flag_node")).unwrap());
        assert!(!store.delete(&ActionId::simple("flag_node")).unwrap());
        assert!(store.select_all().unwrap().is_empty());
    }

    #[test]
    fn next_id_is_monotonic_and_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("actions.db");
        {
            let store = RedbStore::open(&path).unwrap();
            assert_eq!(store.next_id().unwrap(), 1);
            assert_eq!(store.next_id().unwrap(), 2);
        }
        let store = RedbStore::open(&path).unwrap();
        assert_eq!(store.next_id().unwrap(), 3);
    }

    #[test]
    fn explicit_id_advances_sequence() {
        let (_dir, store) = open_tmp();
        store
            .merge(&row(ActionId::Configurable(20), message("x")))
            .unwrap();
        assert_eq!(store.next_id().unwrap(), 21);
    }

    #[test]
    fn max_explicit_id_exhausts_sequence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("actions.db");
        {
            let store = RedbStore::open(&path).unwrap();
            store
                .merge(&row(ActionId::Configurable(u64::MAX), message("x")))
                .unwrap();
            let err = store.next_id().unwrap_err();
            assert!(matches!(err, ActionsError::Store(ref m) if m.contains("exhausted")));
            store
                .merge(&row(ActionId::Configurable(7), message("y")))
                .unwrap();
        }
        let store = RedbStore::open(&path).unwrap();
        assert!(store.next_id().is_err());
        assert!(store
            .select_by_id(&ActionId::Configurable(u64::MAX))
            .unwrap()
            .is_some());
    }
}
