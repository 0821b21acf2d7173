use crate::cmd::{parse_id, Workspace};
use crate::output::{print_fields, print_json, print_table};
use actions_core::types::{Configurability, Parameters};
use actions_core::{ActionDraft, ActionsError};
use anyhow::Context;
use serde_json::Value;
use std::path::Path;

// ---------------------------------------------------------------------------
// list
// ---------------------------------------------------------------------------

pub fn list(root: &Path, configured: bool, json: bool) -> anyhow::Result<()> {
    let ws = Workspace::open(root)?;

    if configured {
        let rows = ws.registry.list_configured()?;
        if json {
            return print_json(&rows);
        }
        if rows.is_empty() {
            println!("No configured actions.");
            return Ok(());
        }
        let table = rows
            .iter()
            .map(|r| {
                vec![
                    r.id.to_string(),
                    r.handler_name.clone(),
                    r.label.clone(),
                    Value::Object(r.parameters.clone()).to_string(),
                ]
            })
            .collect();
        print_table(&["ID", "HANDLER", "LABEL", "PARAMETERS"], table);
        return Ok(());
    }

    let rows = ws.registry.list()?;
    if json {
        let list: Vec<_> = rows.values().collect();
        return print_json(&list);
    }
    if rows.is_empty() {
        println!("No actions. Run 'actions sync' to register handlers.");
        return Ok(());
    }
    let table = rows
        .values()
        .map(|s| {
            vec![
                s.id.to_string(),
                s.action_type.clone(),
                s.label.clone(),
                s.configurable.to_string(),
                s.trigger_names
                    .iter()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(" "),
            ]
        })
        .collect();
    print_table(&["ID", "TYPE", "LABEL", "CONFIGURABLE", "TRIGGERS"], table);
    Ok(())
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

pub fn show(root: &Path, raw_id: &str, json: bool) -> anyhow::Result<()> {
    let ws = Workspace::open(root)?;
    let id = parse_id(raw_id)?;
    let row = ws
        .registry
        .load(&id)?
        .with_context(|| format!("action not found: {id}"))?;

    if json {
        return print_json(&row);
    }

    print_fields(&[
        ("id", row.id.to_string()),
        ("label", row.label.clone()),
        ("type", row.action_type.clone()),
        ("handler", row.handler_name.clone()),
        ("configurable", row.configurable.to_string()),
        ("triggers", row.trigger_string()),
        ("source", row.source_file.clone().unwrap_or_default()),
    ]);
    if !row.parameters.is_empty() {
        println!("parameters:");
        for (k, v) in &row.parameters {
            println!("  {k}: {v}");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// add
// ---------------------------------------------------------------------------

pub fn add(
    root: &Path,
    handler: &str,
    label: &str,
    params: &[String],
    triggers: &[String],
    json: bool,
) -> anyhow::Result<()> {
    let ws = Workspace::open(root)?;

    let descriptor = ws
        .catalog
        .list_all()
        .find(|d| d.handler_of_record() == handler)
        .ok_or_else(|| ActionsError::HandlerNotFound(handler.to_string()))?;

    let parameters = parse_params(params)?;
    if parameters.is_empty() {
        anyhow::bail!("a configurable action needs at least one --param");
    }

    let form = format!("{handler}{}", ws.config.sync.form_suffix);
    let configurable = if ws.catalog.has_form(&form) {
        Configurability::WithForm
    } else {
        Configurability::Advanced
    };

    let mut draft = ActionDraft::new(handler, descriptor.action_type.clone(), label, parameters)
        .with_configurable(configurable);
    draft.trigger_names = triggers.iter().cloned().collect();
    draft.source_file = descriptor.source_file.clone();

    let id = ws.registry.save(draft).context("failed to save action")?;

    if json {
        print_json(&serde_json::json!({ "id": id }))?;
    } else {
        println!("Saved action {id}: {label}");
    }
    Ok(())
}

/// `key=value` pairs; values that parse as JSON keep their type.
fn parse_params(raw: &[String]) -> anyhow::Result<Parameters> {
    let mut params = Parameters::new();
    for pair in raw {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("invalid --param '{pair}': expected key=value"))?;
        let key = key.trim();
        if key.is_empty() {
            anyhow::bail!("invalid --param '{pair}': empty key");
        }
        let value = serde_json::from_str::<Value>(value)
            .unwrap_or_else(|_| Value::String(value.to_string()));
        params.insert(key.to_string(), value);
    }
    Ok(params)
}

// ---------------------------------------------------------------------------
// delete
// ---------------------------------------------------------------------------

pub fn delete(root: &Path, raw_id: &str, json: bool) -> anyhow::Result<()> {
    let ws = Workspace::open(root)?;
    let id = parse_id(raw_id)?;
    ws.registry
        .delete(&id, &ws.notifier)
        .with_context(|| format!("failed to delete action {id}"))?;

    if json {
        print_json(&serde_json::json!({ "deleted": id }))?;
    } else {
        println!("Deleted action {id}");
    }
    Ok(())
}
