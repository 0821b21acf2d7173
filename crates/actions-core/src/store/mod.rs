//! Persistence adapter for action rows.
//!
//! The core talks to storage only through [`ActionStore`]. Rows cross this
//! boundary fully decoded: parameters arrive as a JSON map, never as the
//! encoded blob a backend keeps on disk. Nothing above this layer caches rows;
//! every dispatch, synchronization, and accessor call re-reads current state.

pub mod db;
pub mod memory;

pub use db::RedbStore;
pub use memory::MemoryStore;

use crate::error::Result;
use crate::types::{ActionId, ActionInstance};

/// Row storage for action instances. Single-row writes are atomic.
pub trait ActionStore: Send + Sync {
    /// Every persisted row.
    fn select_all(&self) -> Result<Vec<ActionInstance>>;

    fn select_by_id(&self, id: &ActionId) -> Result<Option<ActionInstance>>;

    /// Rows for the given ids. Ids without a row are skipped.
    fn select_by_ids(&self, ids: &[ActionId]) -> Result<Vec<ActionInstance>>;

    /// Insert a new row. Fails with `ActionExists` if the id is taken.
    fn insert(&self, row: &ActionInstance) -> Result<()>;

    /// Insert or replace the row stored under `row.id`.
    fn merge(&self, row: &ActionInstance) -> Result<()>;

    /// Remove a row. Returns whether a row was present.
    fn delete(&self, id: &ActionId) -> Result<bool>;

    /// Allocate the next numeric id for a configurable instance.
    fn next_id(&self) -> Result<u64>;

    /// Rows carrying stored parameters.
    fn select_configured(&self) -> Result<Vec<ActionInstance>> {
        Ok(self
            .select_all()?
            .into_iter()
            .filter(ActionInstance::is_configured)
            .collect())
    }
}
