//! Reconcile the host's declared handlers with the persisted action rows.
//!
//! Declared handlers without a row get one, keyed by their identity. Rows
//! that already exist are left untouched, so user edits survive. Rows whose
//! handler is no longer declared are orphans: reported, or deleted on
//! request. Every step is per row; one failed insert or delete is logged and
//! the loop moves on. Re-running after a partial pass picks up where it left
//! off, since present rows are skipped.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::HandlerCatalog;
use crate::config::Config;
use crate::error::Result;
use crate::notify::Notifier;
use crate::registry::Registry;
use crate::types::{ActionId, ActionInstance, Configurability, HandlerDescriptor, Parameters};

// ---------------------------------------------------------------------------
// SyncReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowFailure {
    pub id: ActionId,
    pub error: String,
}

/// What one synchronization pass did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    /// Identities that received a new row.
    pub added: Vec<String>,
    /// Declared handlers that already had a row.
    pub reconciled: usize,
    /// Rows whose handler is no longer declared, whether or not they were removed.
    pub orphans: Vec<ActionId>,
    /// Orphans actually deleted in this pass.
    pub removed: Vec<ActionId>,
    pub failures: Vec<RowFailure>,
}

impl SyncReport {
    pub fn orphan_count(&self) -> usize {
        self.orphans.len()
    }

    /// Orphans still present after this pass.
    pub fn remaining_orphans(&self) -> Vec<&ActionId> {
        self.orphans
            .iter()
            .filter(|id| !self.removed.contains(id))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Synchronizer
// ---------------------------------------------------------------------------

pub struct Synchronizer<'a> {
    catalog: &'a HandlerCatalog,
    registry: &'a Registry,
    config: &'a Config,
    notifier: &'a Notifier,
}

impl<'a> Synchronizer<'a> {
    pub fn new(
        catalog: &'a HandlerCatalog,
        registry: &'a Registry,
        config: &'a Config,
        notifier: &'a Notifier,
    ) -> Self {
        Self {
            catalog,
            registry,
            config,
            notifier,
        }
    }

    pub fn synchronize(&self, delete_orphans: bool) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        let mut candidates: BTreeMap<ActionId, ActionInstance> = self
            .registry
            .store()
            .select_all()?
            .into_iter()
            .map(|row| (row.id.clone(), row))
            .collect();

        for descriptor in self.catalog.list_all() {
            let id = ActionId::simple(descriptor.identity.clone());
            if candidates.remove(&id).is_some() {
                report.reconciled += 1;
                continue;
            }
            let row = self.new_row(descriptor);
            match self.registry.store().insert(&row) {
                Ok(()) => {
                    info!(
                        action = %descriptor.identity,
                        configurable = %row.configurable,
                        "action added"
                    );
                    report.added.push(descriptor.identity.clone());
                }
                Err(e) => {
                    warn!(action = %descriptor.identity, error = %e, "failed to add action");
                    report.failures.push(RowFailure {
                        id,
                        error: e.to_string(),
                    });
                }
            }
        }

        // Configurable instances survive as long as their handler does.
        let declared = self.catalog.handler_names();
        candidates.retain(|id, row| {
            !(id.is_configurable()
                && (declared.contains(row.handler_name.as_str())
                    || self.catalog.has_handler(&row.handler_name)))
        });

        report.orphans = candidates.into_keys().collect();
        if report.orphans.is_empty() {
            return Ok(report);
        }

        if delete_orphans {
            for id in &report.orphans {
                match self.registry.delete(id, self.notifier) {
                    Ok(()) => {
                        info!(id = %id, "removed orphaned action");
                        report.removed.push(id.clone());
                    }
                    Err(e) => {
                        warn!(id = %id, error = %e, "failed to remove orphaned action");
                        report.failures.push(RowFailure {
                            id: id.clone(),
                            error: e.to_string(),
                        });
                    }
                }
            }
        } else {
            let list = report
                .orphans
                .iter()
                .map(ActionId::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            warn!(
                count = report.orphans.len(),
                orphans = %list,
                "orphaned actions exist in the action registry; run sync with orphan removal to clean up"
            );
        }

        Ok(report)
    }

    fn new_row(&self, descriptor: &HandlerDescriptor) -> ActionInstance {
        let handler_name = descriptor.handler_of_record().to_string();
        let form = format!("{handler_name}{}", self.config.sync.form_suffix);
        let configurable = if self.catalog.has_form(&form) || self.catalog.has_handler(&form) {
            Configurability::WithForm
        } else {
            Configurability::Simple
        };
        let namespace = self.config.sync.trigger_namespace(&descriptor.module);
        let trigger_names = self
            .config
            .default_triggers(namespace, &descriptor.identity);

        ActionInstance {
            id: ActionId::simple(descriptor.identity.clone()),
            action_type: descriptor.action_type.clone(),
            handler_name,
            parameters: Parameters::new(),
            label: descriptor.label.clone(),
            configurable,
            node_type: None,
            node_id: None,
            trigger_names,
            source_file: descriptor.source_file.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
