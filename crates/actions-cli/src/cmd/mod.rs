pub mod action;
pub mod config;
pub mod init;
pub mod invoke;
pub mod sync;
pub mod token;

use std::path::Path;
use std::sync::Arc;

use actions_core::config::Config;
use actions_core::notify::{DeletionListener, Notifier};
use actions_core::paths;
use actions_core::store::{ActionStore, RedbStore};
use actions_core::types::ActionId;
use actions_core::{Dispatcher, HandlerCatalog, Registry};
use anyhow::Context;

use crate::builtin;

/// Everything a command needs, opened from an initialized root.
pub struct Workspace {
    pub config: Config,
    pub catalog: Arc<HandlerCatalog>,
    pub store: Arc<dyn ActionStore>,
    pub registry: Registry,
    pub notifier: Notifier,
}

impl Workspace {
    pub fn open(root: &Path) -> anyhow::Result<Self> {
        let config = Config::load(root).context("failed to load config")?;
        let db = paths::db_path(root);
        let store: Arc<dyn ActionStore> = Arc::new(
            RedbStore::open(&db)
                .with_context(|| format!("failed to open {}", db.display()))?,
        );
        let catalog = Arc::new(builtin::catalog().context("invalid built-in catalog")?);
        let mut notifier = Notifier::new();
        notifier.subscribe(Arc::new(LogListener));
        Ok(Self {
            registry: Registry::new(store.clone()),
            config,
            catalog,
            store,
            notifier,
        })
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            self.catalog.clone(),
            self.store.clone(),
            &self.config.dispatch,
        )
    }
}

struct LogListener;

impl DeletionListener for LogListener {
    fn on_action_deleted(&self, id: &ActionId) {
        tracing::info!(id = %id, "action deletion broadcast");
    }
}

pub fn parse_id(raw: &str) -> anyhow::Result<ActionId> {
    raw.parse::<ActionId>()
        .with_context(|| format!("invalid action id '{raw}'"))
}
