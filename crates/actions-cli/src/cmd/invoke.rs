use crate::cmd::{parse_id, Workspace};
use crate::output::{print_json, print_table};
use actions_core::types::{hook_context, ActionId, Outcome};
use anyhow::Context;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

#[derive(Serialize)]
struct InvokeRow<'a> {
    id: &'a ActionId,
    outcome: &'a Outcome,
}

pub fn run(
    root: &Path,
    raw_ids: &[String],
    hook: &str,
    subject: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let ws = Workspace::open(root)?;
    let ids = raw_ids
        .iter()
        .map(|raw| parse_id(raw))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut subject: Value = match subject {
        Some(raw) => serde_json::from_str(raw).context("--subject is not valid JSON")?,
        None => serde_json::json!({}),
    };
    let context = hook_context(hook);

    let dispatcher = ws.dispatcher();
    let results = dispatcher.invoke(&ids, &mut subject, &context, &Value::Null, &Value::Null);

    if json {
        let rows: Vec<InvokeRow<'_>> = results
            .iter()
            .map(|(id, outcome)| InvokeRow { id, outcome })
            .collect();
        return print_json(&serde_json::json!({
            "results": rows,
            "subject": subject,
        }));
    }

    if results.is_empty() {
        println!("No actions ran.");
    } else {
        let table = results
            .iter()
            .map(|(id, outcome)| {
                let (status, detail) = match outcome {
                    Outcome::Completed(v) => ("ok", v.to_string()),
                    Outcome::Failed(reason) => ("failed", reason.to_string()),
                };
                vec![id.to_string(), status.to_string(), detail]
            })
            .collect();
        print_table(&["ID", "STATUS", "RESULT"], table);
    }
    println!("\nsubject: {subject}");
    Ok(())
}
