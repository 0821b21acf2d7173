//! The host's statically declared handlers and the callable table behind them.
//!
//! A [`HandlerCatalog`] is built once at startup. It holds three things:
//! descriptors keyed by identity, callables keyed by handler name, and the
//! names of configuration-form companions. Dispatch resolves names through
//! the callable table only, so an unregistered name is simply a miss.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::dispatch::Invocation;
use crate::error::Result;
use crate::paths::validate_identity;
use crate::types::HandlerDescriptor;

/// A registered callable. The return value becomes the recorded outcome.
pub type HandlerFn = dyn Fn(&mut Invocation<'_>) -> Value + Send + Sync;

#[derive(Clone, Default)]
pub struct HandlerCatalog {
    descriptors: BTreeMap<String, HandlerDescriptor>,
    handlers: HashMap<String, Arc<HandlerFn>>,
    forms: BTreeSet<String>,
}

impl fmt::Debug for HandlerCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut handlers: Vec<_> = self.handlers.keys().collect();
        handlers.sort();
        f.debug_struct("HandlerCatalog")
            .field("descriptors", &self.descriptors.keys().collect::<Vec<_>>())
            .field("handlers", &handlers)
            .field("forms", &self.forms)
            .finish()
    }
}

impl HandlerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a handler. Replaces any earlier descriptor with the same identity.
    pub fn declare(&mut self, descriptor: HandlerDescriptor) -> Result<&mut Self> {
        validate_identity(&descriptor.identity)?;
        self.descriptors
            .insert(descriptor.identity.clone(), descriptor);
        Ok(self)
    }

    /// Register a callable under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&mut Invocation<'_>) -> Value + Send + Sync + 'static,
    {
        self.handlers.insert(name.into(), Arc::new(handler));
        self
    }

    /// Declare a handler and register its callable under the handler-of-record name.
    pub fn define<F>(&mut self, descriptor: HandlerDescriptor, handler: F) -> Result<&mut Self>
    where
        F: Fn(&mut Invocation<'_>) -> Value + Send + Sync + 'static,
    {
        let name = descriptor.handler_of_record().to_string();
        self.declare(descriptor)?;
        Ok(self.register(name, handler))
    }

    /// Record that a configuration form named `name` exists.
    pub fn register_form(&mut self, name: impl Into<String>) -> &mut Self {
        self.forms.insert(name.into());
        self
    }

    /// Every declared handler, ordered by identity.
    pub fn list_all(&self) -> impl Iterator<Item = &HandlerDescriptor> {
        self.descriptors.values()
    }

    pub fn get(&self, identity: &str) -> Option<&HandlerDescriptor> {
        self.descriptors.get(identity)
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.descriptors.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn handler(&self, name: &str) -> Option<Arc<HandlerFn>> {
        self.handlers.get(name).cloned()
    }

    pub fn has_handler(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn has_form(&self, name: &str) -> bool {
        self.forms.contains(name)
    }

    /// Handler-of-record names of every declared handler.
    pub fn handler_names(&self) -> BTreeSet<&str> {
        self.descriptors
            .values()
            .map(HandlerDescriptor::handler_of_record)
            .collect()
    }
}
