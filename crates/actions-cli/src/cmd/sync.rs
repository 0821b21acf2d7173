use crate::cmd::Workspace;
use crate::output::print_json;
use actions_core::Synchronizer;
use anyhow::Context;
use std::path::Path;

pub fn run(root: &Path, delete_orphans: bool, json: bool) -> anyhow::Result<()> {
    let ws = Workspace::open(root)?;
    let report = Synchronizer::new(&ws.catalog, &ws.registry, &ws.config, &ws.notifier)
        .synchronize(delete_orphans)
        .context("synchronization failed")?;

    if json {
        return print_json(&report);
    }

    if report.added.is_empty() {
        println!("No new actions.");
    } else {
        for identity in &report.added {
            println!("  added:   {identity}");
        }
    }
    for id in &report.removed {
        println!("  removed: {id}");
    }
    for failure in &report.failures {
        println!("  failed:  {} ({})", failure.id, failure.error);
    }

    let remaining = report.remaining_orphans();
    if !remaining.is_empty() {
        let list: Vec<String> = remaining.iter().map(|id| id.to_string()).collect();
        println!(
            "\n{} orphaned action(s) exist: {}",
            remaining.len(),
            list.join(", ")
        );
        println!("Run 'actions sync --delete-orphans' to remove them.");
    }

    Ok(())
}
