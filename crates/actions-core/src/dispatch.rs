//! Resolve action identifiers to handlers and invoke them.
//!
//! Simple identities resolve straight through the catalog's callable table.
//! Configurable ids are read from the store (one batched read per call) and
//! dispatched to the row's `handler_name` with the row's parameters merged
//! into the context. Nothing here raises for a single bad identifier: it is
//! recorded as [`Outcome::Failed`] and the rest of the batch still runs.
//!
//! # Recursion guard
//!
//! Handlers may re-enter [`Dispatcher::invoke`]. Each thread keeps its own
//! depth counter; a call that would run deeper than `max_depth` is logged and
//! returns an empty result map. The counter is restored by a drop guard, so
//! early returns and unwinding handlers leave it where they found it.

use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::catalog::{HandlerCatalog, HandlerFn};
use crate::config::{ContextMerge, DispatchConfig};
use crate::store::ActionStore;
use crate::types::{ActionId, ActionInstance, Context, FailureReason, Outcome, Results, HOOK_KEY};

// ---------------------------------------------------------------------------
// Depth tracking
// ---------------------------------------------------------------------------

thread_local! {
    static DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// Dispatch nesting depth on the current thread. Zero outside any dispatch.
pub fn current_depth() -> u32 {
    DEPTH.with(Cell::get)
}

struct DepthGuard {
    depth: u32,
}

impl DepthGuard {
    fn enter() -> Self {
        let depth = DEPTH.with(|d| {
            let n = d.get().saturating_add(1);
            d.set(n);
            n
        });
        Self { depth }
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

// ---------------------------------------------------------------------------
// Invocation
// ---------------------------------------------------------------------------

/// Everything a handler receives for one call.
pub struct Invocation<'a> {
    /// The dispatcher running this call, for handlers that fire further actions.
    pub dispatcher: &'a Dispatcher,
    pub id: &'a ActionId,
    pub subject: &'a mut Value,
    pub context: &'a Context,
    pub extra1: &'a Value,
    pub extra2: &'a Value,
}

impl Invocation<'_> {
    /// The event that caused this dispatch, if the caller supplied one.
    pub fn hook(&self) -> Option<&str> {
        self.context.get(HOOK_KEY).and_then(Value::as_str)
    }

    /// A context value, including parameters merged from the action's row.
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.context.get(key)
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

pub struct Dispatcher {
    catalog: Arc<HandlerCatalog>,
    store: Arc<dyn ActionStore>,
    max_depth: u32,
    context_merge: ContextMerge,
}

impl Dispatcher {
    pub fn new(
        catalog: Arc<HandlerCatalog>,
        store: Arc<dyn ActionStore>,
        config: &DispatchConfig,
    ) -> Self {
        Self {
            catalog,
            store,
            max_depth: config.max_depth,
            context_merge: config.context_merge,
        }
    }

    pub fn catalog(&self) -> &HandlerCatalog {
        &self.catalog
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Invoke a single action.
    pub fn invoke_one(
        &self,
        id: &ActionId,
        subject: &mut Value,
        context: &Context,
        extra1: &Value,
        extra2: &Value,
    ) -> Results {
        self.invoke(std::slice::from_ref(id), subject, context, extra1, extra2)
    }

    /// Invoke every action in `ids` and collect one outcome per distinct id.
    ///
    /// Returns an empty map when the recursion limit is hit. Invocation order
    /// across a batch is unspecified.
    pub fn invoke(
        &self,
        ids: &[ActionId],
        subject: &mut Value,
        context: &Context,
        extra1: &Value,
        extra2: &Value,
    ) -> Results {
        let guard = DepthGuard::enter();
        if guard.depth > self.max_depth {
            error!(
                depth = guard.depth,
                max_depth = self.max_depth,
                "stack overflow: too many nested action invocations, aborting to prevent infinite recursion"
            );
            return Results::new();
        }

        match ids {
            [] => Results::new(),
            [id] => {
                let outcome = self.invoke_single(id, subject, context, extra1, extra2);
                Results::from([(id.clone(), outcome)])
            }
            _ => self.invoke_batch(ids, subject, context, extra1, extra2),
        }
    }

    fn invoke_single(
        &self,
        id: &ActionId,
        subject: &mut Value,
        context: &Context,
        extra1: &Value,
        extra2: &Value,
    ) -> Outcome {
        match id {
            ActionId::Simple(name) => match self.catalog.handler(name) {
                Some(handler) => self.call(&*handler, id, subject, context, extra1, extra2),
                None => unresolved(id, name),
            },
            ActionId::Configurable(_) => {
                let row = match self.store.select_by_id(id) {
                    Ok(row) => row,
                    Err(e) => {
                        error!(id = %id, error = %e, "failed to load action");
                        None
                    }
                };
                match row {
                    Some(row) => {
                        let merged = merge_parameters(context.clone(), &row);
                        self.call_row(&row, subject, &merged, extra1, extra2)
                    }
                    None => missing_instance(id),
                }
            }
        }
    }

    fn invoke_batch(
        &self,
        ids: &[ActionId],
        subject: &mut Value,
        context: &Context,
        extra1: &Value,
        extra2: &Value,
    ) -> Results {
        let mut results = Results::new();
        let mut seen = BTreeSet::new();
        let mut simple: Vec<(&ActionId, Arc<HandlerFn>)> = Vec::new();
        let mut stored: Vec<ActionId> = Vec::new();

        for id in ids {
            if !seen.insert(id) {
                continue;
            }
            match id {
                ActionId::Simple(name) => match self.catalog.handler(name) {
                    Some(handler) => simple.push((id, handler)),
                    None => {
                        results.insert(id.clone(), unresolved(id, name));
                    }
                },
                ActionId::Configurable(_) => stored.push(id.clone()),
            }
        }

        let mut rows: BTreeMap<ActionId, ActionInstance> = BTreeMap::new();
        if !stored.is_empty() {
            match self.store.select_by_ids(&stored) {
                Ok(found) => rows.extend(found.into_iter().map(|r| (r.id.clone(), r))),
                Err(e) => error!(count = stored.len(), error = %e, "failed to load actions"),
            }
        }

        // Cumulative mode threads one context through the whole batch.
        let mut running = context.clone();

        for (id, handler) in simple {
            let outcome = self.call(&*handler, id, subject, context, extra1, extra2);
            results.insert(id.clone(), outcome);
        }

        for id in stored {
            let outcome = match rows.get(&id) {
                None => missing_instance(&id),
                Some(row) => match self.context_merge {
                    ContextMerge::Isolated => {
                        let merged = merge_parameters(context.clone(), row);
                        self.call_row(row, subject, &merged, extra1, extra2)
                    }
                    ContextMerge::Cumulative => {
                        running.extend(row.parameters.clone());
                        self.call_row(row, subject, &running, extra1, extra2)
                    }
                },
            };
            results.insert(id, outcome);
        }

        results
    }

    fn call_row(
        &self,
        row: &ActionInstance,
        subject: &mut Value,
        context: &Context,
        extra1: &Value,
        extra2: &Value,
    ) -> Outcome {
        match self.catalog.handler(&row.handler_name) {
            Some(handler) => self.call(&*handler, &row.id, subject, context, extra1, extra2),
            None => unresolved(&row.id, &row.handler_name),
        }
    }

    fn call(
        &self,
        handler: &HandlerFn,
        id: &ActionId,
        subject: &mut Value,
        context: &Context,
        extra1: &Value,
        extra2: &Value,
    ) -> Outcome {
        debug!(id = %id, depth = current_depth(), "invoking action");
        let mut invocation = Invocation {
            dispatcher: self,
            id,
            subject,
            context,
            extra1,
            extra2,
        };
        Outcome::Completed(handler(&mut invocation))
    }
}

fn merge_parameters(mut context: Context, row: &ActionInstance) -> Context {
    context.extend(row.parameters.clone());
    context
}

fn unresolved(id: &ActionId, handler: &str) -> Outcome {
    warn!(id = %id, handler, "action handler not found");
    Outcome::Failed(FailureReason::HandlerNotFound {
        handler: handler.to_string(),
    })
}

fn missing_instance(id: &ActionId) -> Outcome {
    warn!(id = %id, "action instance not found");
    Outcome::Failed(FailureReason::InstanceNotFound)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{hook_context, Configurability, HandlerDescriptor, Parameters};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    fn configured_row(id: u64, handler: &str, params: serde_json::Value) -> ActionInstance {
        let parameters: Parameters = match params {
            Value::Object(map) => map,
            _ => Parameters::new(),
        };
        ActionInstance {
            id: ActionId::Configurable(id),
            action_type: "system".into(),
            handler_name: handler.into(),
            parameters,
            label: format!("instance {id}"),
            configurable: Configurability::WithForm,
            node_type: None,
            node_id: None,
            trigger_names: Default::default(),
            source_file: None,
        }
    }

    fn dispatcher_with(
        catalog: HandlerCatalog,
        store: Arc<MemoryStore>,
        max_depth: u32,
        context_merge: ContextMerge,
    ) -> Dispatcher {
        let config = DispatchConfig {
            max_depth,
            context_merge,
        };
        Dispatcher::new(Arc::new(catalog), store, &config)
    }

    fn sample_catalog() -> HandlerCatalog {
        let mut catalog = HandlerCatalog::new();
        catalog
            .define(
                HandlerDescriptor::new("send_email", "Send e-mail", "system", "system"),
                |inv| json!({ "sent_on": inv.hook() }),
            )
            .unwrap()
            .define(
                HandlerDescriptor::new("node_publish_action", "Publish", "node", "node"),
                |inv| {
                    inv.subject["status"] = json!(1);
                    json!(true)
                },
            )
            .unwrap()
            .define(
                HandlerDescriptor::new("context_keys", "Echo context", "system", "system"),
                |inv| {
                    let keys: Vec<&String> = inv.context.keys().collect();
                    json!(keys)
                },
            )
            .unwrap();
        catalog
    }

    fn run(d: &Dispatcher, ids: &[ActionId]) -> Results {
        let mut subject = json!({});
        d.invoke(ids, &mut subject, &hook_context("node_save"), &Value::Null, &Value::Null)
    }

    #[test]
    fn single_simple_action_runs() {
        let d = dispatcher_with(
            sample_catalog(),
            Arc::new(MemoryStore::new()),
            35,
            ContextMerge::Isolated,
        );
        let results = run(&d, &[ActionId::simple("send_email")]);
        assert_eq!(
            results[&ActionId::simple("send_email")],
            Outcome::Completed(json!({ "sent_on": "node_save" }))
        );
    }

    #[test]
    fn handler_mutates_caller_subject() {
        let d = dispatcher_with(
            sample_catalog(),
            Arc::new(MemoryStore::new()),
            35,
            ContextMerge::Isolated,
        );
        let mut subject = json!({ "status": 0 });
        d.invoke_one(
            &ActionId::simple("node_publish_action"),
            &mut subject,
            &hook_context("node_presave"),
            &Value::Null,
            &Value::Null,
        );
        assert_eq!(subject["status"], 1);
    }

    #[test]
    fn extras_are_forwarded_unchanged() {
        let mut catalog = HandlerCatalog::new();
        catalog.register("echo_extras", |inv| json!([inv.extra1, inv.extra2]));
        let d = dispatcher_with(catalog, Arc::new(MemoryStore::new()), 35, ContextMerge::Isolated);
        let mut subject = Value::Null;
        let results = d.invoke_one(
            &ActionId::simple("echo_extras"),
            &mut subject,
            &Context::new(),
            &json!("a1"),
            &json!({ "k": 2 }),
        );
        assert_eq!(
            results[&ActionId::simple("echo_extras")],
            Outcome::Completed(json!(["a1", { "k": 2 }]))
        );
    }

    #[test]
    fn unknown_identity_is_failure_sentinel() {
        let d = dispatcher_with(
            sample_catalog(),
            Arc::new(MemoryStore::new()),
            35,
            ContextMerge::Isolated,
        );
        let results = run(&d, &[ActionId::simple("no_such_action")]);
        assert!(results[&ActionId::simple("no_such_action")].is_failure());
    }

    #[test]
    fn missing_instance_in_batch_does_not_stop_the_rest() {
        let d = dispatcher_with(
            sample_catalog(),
            Arc::new(MemoryStore::new()),
            35,
            ContextMerge::Isolated,
        );
        let results = run(&d, &[ActionId::simple("send_email"), ActionId::Configurable(42)]);
        assert_eq!(results.len(), 2);
        assert_eq!(
            results[&ActionId::simple("send_email")],
            Outcome::Completed(json!({ "sent_on": "node_save" }))
        );
        assert_eq!(
            results[&ActionId::Configurable(42)],
            Outcome::Failed(FailureReason::InstanceNotFound)
        );
    }

    #[test]
    fn mixed_valid_and_invalid_simple_identities() {
        let d = dispatcher_with(
            sample_catalog(),
            Arc::new(MemoryStore::new()),
            35,
            ContextMerge::Isolated,
        );
        let results = run(&d, &[ActionId::simple("send_email"), ActionId::simple("bogus")]);
        assert!(!results[&ActionId::simple("send_email")].is_failure());
        assert_eq!(
            results[&ActionId::simple("bogus")],
            Outcome::Failed(FailureReason::HandlerNotFound {
                handler: "bogus".into()
            })
        );
    }

    #[test]
    fn configurable_instance_gets_parameters_in_context() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert(&configured_row(5, "context_keys", json!({ "message": "hi" })))
            .unwrap();
        let d = dispatcher_with(sample_catalog(), store, 35, ContextMerge::Isolated);
        let results = run(&d, &[ActionId::Configurable(5)]);
        assert_eq!(
            results[&ActionId::Configurable(5)],
            Outcome::Completed(json!(["hook", "message"]))
        );
    }

    #[test]
    fn configurable_instance_with_missing_handler_is_failure() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert(&configured_row(5, "vanished_handler", json!({ "x": 1 })))
            .unwrap();
        let d = dispatcher_with(sample_catalog(), store, 35, ContextMerge::Isolated);
        let results = run(&d, &[ActionId::Configurable(5)]);
        assert_eq!(
            results[&ActionId::Configurable(5)],
            Outcome::Failed(FailureReason::HandlerNotFound {
                handler: "vanished_handler".into()
            })
        );
    }

    #[test]
    fn isolated_merge_keeps_parameters_apart() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert(&configured_row(1, "context_keys", json!({ "a": 1 })))
            .unwrap();
        store
            .insert(&configured_row(2, "context_keys", json!({ "b": 2 })))
            .unwrap();
        let d = dispatcher_with(sample_catalog(), store, 35, ContextMerge::Isolated);
        let results = run(&d, &[ActionId::Configurable(1), ActionId::Configurable(2)]);
        assert_eq!(
            results[&ActionId::Configurable(2)],
            Outcome::Completed(json!(["b", "hook"]))
        );
    }

    #[test]
    fn cumulative_merge_exposes_earlier_parameters() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert(&configured_row(1, "context_keys", json!({ "a": 1 })))
            .unwrap();
        store
            .insert(&configured_row(2, "context_keys", json!({ "b": 2 })))
            .unwrap();
        let d = dispatcher_with(sample_catalog(), store, 35, ContextMerge::Cumulative);
        let results = run(&d, &[ActionId::Configurable(1), ActionId::Configurable(2)]);
        assert_eq!(
            results[&ActionId::Configurable(1)],
            Outcome::Completed(json!(["a", "hook"]))
        );
        assert_eq!(
            results[&ActionId::Configurable(2)],
            Outcome::Completed(json!(["a", "b", "hook"]))
        );
    }

    #[test]
    fn duplicate_ids_run_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut catalog = HandlerCatalog::new();
        catalog.register("count", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Value::Null
        });
        let d = dispatcher_with(catalog, Arc::new(MemoryStore::new()), 35, ContextMerge::Isolated);
        let results = run(&d, &[ActionId::simple("count"), ActionId::simple("count")]);
        assert_eq!(results.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn recursion_stops_at_max_depth() {
        let calls = Arc::new(AtomicU32::new(0));
        let deepest = Arc::new(AtomicU32::new(0));
        let (c, deep) = (calls.clone(), deepest.clone());
        let mut catalog = HandlerCatalog::new();
        catalog.register("recurse", move |inv| {
            c.fetch_add(1, Ordering::SeqCst);
            deep.fetch_max(current_depth(), Ordering::SeqCst);
            let nested = inv.dispatcher.invoke_one(
                inv.id,
                inv.subject,
                inv.context,
                inv.extra1,
                inv.extra2,
            );
            json!(nested.len())
        });
        let d = dispatcher_with(catalog, Arc::new(MemoryStore::new()), 3, ContextMerge::Isolated);

        assert_eq!(current_depth(), 0);
        let results = run(&d, &[ActionId::simple("recurse")]);
        assert_eq!(current_depth(), 0, "depth counter must net to zero");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(deepest.load(Ordering::SeqCst), 3);
        // The outermost call still records its own outcome.
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn call_beyond_limit_returns_nothing_and_restores_depth() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let mut catalog = HandlerCatalog::new();
        catalog.register("noop", move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Value::Null
        });
        let d = dispatcher_with(catalog, Arc::new(MemoryStore::new()), 0, ContextMerge::Isolated);
        let before = current_depth();
        let results = run(&d, &[ActionId::simple("noop")]);
        assert!(results.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(current_depth(), before);
    }

    #[test]
    fn depth_is_restored_when_handler_panics() {
        let mut catalog = HandlerCatalog::new();
        catalog.register("boom", |_| panic!("handler failure"));
        let d = dispatcher_with(catalog, Arc::new(MemoryStore::new()), 35, ContextMerge::Isolated);
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            run(&d, &[ActionId::simple("boom")])
        }));
        assert!(outcome.is_err());
        assert_eq!(current_depth(), 0);
    }

    #[test]
    fn depth_is_per_thread() {
        let d = Arc::new(dispatcher_with(
            sample_catalog(),
            Arc::new(MemoryStore::new()),
            1,
            ContextMerge::Isolated,
        ));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let d = d.clone();
                std::thread::spawn(move || run(&d, &[ActionId::simple("send_email")]).len())
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), 1);
        }
    }

    #[test]
    fn empty_id_list_yields_empty_results() {
        let d = dispatcher_with(
            sample_catalog(),
            Arc::new(MemoryStore::new()),
            35,
            ContextMerge::Isolated,
        );
        assert!(run(&d, &[]).is_empty());
    }
}
