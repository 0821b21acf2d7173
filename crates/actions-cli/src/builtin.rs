//! Handlers shipped with the CLI.
//!
//! Subjects are JSON objects shaped like content nodes
//! (`{"title": ..., "status": 0|1, "sticky": 0|1, "promote": 0|1}`).

use actions_core::types::{ActionId, HandlerDescriptor};
use actions_core::{HandlerCatalog, Invocation};
use serde_json::{json, Value};

pub fn catalog() -> actions_core::Result<HandlerCatalog> {
    let mut catalog = HandlerCatalog::new();
    catalog
        .define(
            HandlerDescriptor::new("node_publish_action", "Publish post", "node", "node"),
            |inv| set_flag(inv, "status", 1),
        )?
        .define(
            HandlerDescriptor::new("node_unpublish_action", "Unpublish post", "node", "node"),
            |inv| set_flag(inv, "status", 0),
        )?
        .define(
            HandlerDescriptor::new("node_make_sticky_action", "Make post sticky", "node", "node"),
            |inv| set_flag(inv, "sticky", 1),
        )?
        .define(
            HandlerDescriptor::new(
                "node_promote_action",
                "Promote post to front page",
                "node",
                "node",
            ),
            |inv| set_flag(inv, "promote", 1),
        )?
        .define(
            HandlerDescriptor::new(
                "system_message_action",
                "Display a message to the user",
                "system",
                "system",
            )
            .with_config_form(),
            system_message,
        )?
        .define(
            HandlerDescriptor::new(
                "system_chain_action",
                "Fire other actions",
                "system",
                "system",
            )
            .with_config_form(),
            system_chain,
        )?
        .register_form("system_message_action_form")
        .register_form("system_chain_action_form");
    Ok(catalog)
}

fn set_flag(inv: &mut Invocation<'_>, field: &str, value: u8) -> Value {
    match inv.subject.as_object_mut() {
        Some(node) => {
            node.insert(field.to_string(), json!(value));
            json!(true)
        }
        None => json!(false),
    }
}

/// Appends the configured `message` to `subject.messages`, with `%title`
/// replaced by the subject's title.
fn system_message(inv: &mut Invocation<'_>) -> Value {
    let template = inv
        .param("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let title = inv
        .subject
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let message = template.replace("%title", &title);

    if let Some(node) = inv.subject.as_object_mut() {
        let messages = node.entry("messages").or_insert_with(|| json!([]));
        if let Some(list) = messages.as_array_mut() {
            list.push(json!(message));
        }
    }
    json!(message)
}

/// Fires the ids listed in the `actions` parameter against the same subject.
fn system_chain(inv: &mut Invocation<'_>) -> Value {
    let ids: Vec<ActionId> = inv
        .param("actions")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();
    let results = inv
        .dispatcher
        .invoke(&ids, inv.subject, inv.context, inv.extra1, inv.extra2);
    json!(results.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_declares_every_builtin() {
        let c = catalog().unwrap();
        assert_eq!(c.len(), 6);
        for d in c.list_all() {
            assert!(c.has_handler(d.handler_of_record()), "{}", d.identity);
        }
        assert!(c.has_form("system_message_action_form"));
    }
}
