use crate::cmd::{parse_id, Workspace};
use crate::output::{print_json, print_table};
use actions_core::ActionsError;
use actions_core::token::{build_token_map, reverse_lookup, tokenize, TokenMap};
use std::path::Path;

// ---------------------------------------------------------------------------
// token
// ---------------------------------------------------------------------------

pub fn encode(raw_id: &str, json: bool) -> anyhow::Result<()> {
    let id = parse_id(raw_id)?;
    let token = tokenize(&id);
    if json {
        print_json(&serde_json::json!({ "id": id, "token": token }))?;
    } else {
        println!("{token}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// lookup
// ---------------------------------------------------------------------------

pub fn lookup(root: &Path, token: &str, json: bool) -> anyhow::Result<()> {
    let ws = Workspace::open(root)?;
    let id = reverse_lookup(&ws.catalog, ws.store.as_ref(), token)?
        .ok_or_else(|| ActionsError::InvalidToken(token.to_string()))?;
    if json {
        print_json(&serde_json::json!({ "token": token, "id": id }))?;
    } else {
        println!("{id}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// tokens
// ---------------------------------------------------------------------------

/// Token map over persisted rows, or over the handler catalog with `--catalog`.
pub fn list(root: &Path, catalog: bool, json: bool) -> anyhow::Result<()> {
    let ws = Workspace::open(root)?;
    let map: TokenMap = if catalog {
        build_token_map(ws.catalog.list_all())
    } else {
        ws.registry.token_map()?
    };

    if json {
        return print_json(&map);
    }
    if map.is_empty() {
        println!("No tokens.");
        return Ok(());
    }
    let table = map
        .iter()
        .map(|(token, entry)| {
            vec![
                token.clone(),
                entry.identity.to_string(),
                entry.callback.clone(),
                entry.label.clone(),
            ]
        })
        .collect();
    print_table(&["TOKEN", "ID", "CALLBACK", "LABEL"], table);
    Ok(())
}
