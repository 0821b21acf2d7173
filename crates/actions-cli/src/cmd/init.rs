use actions_core::config::Config;
use actions_core::store::RedbStore;
use actions_core::{io, paths};
use anyhow::Context;
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing actions in: {}", root.display());

    let dir = paths::actions_dir(root);
    let created =
        io::ensure_dir(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    if created {
        println!("  created: {}/", paths::ACTIONS_DIR);
    }

    let config_path = paths::config_path(root);
    if !config_path.exists() {
        Config::default()
            .save(root)
            .context("failed to write config.yaml")?;
        println!("  created: {}", paths::CONFIG_FILE);
    } else {
        println!("  exists:  {}", paths::CONFIG_FILE);
    }

    let db_path = paths::db_path(root);
    let existed = db_path.exists();
    RedbStore::open(&db_path).context("failed to create action database")?;
    if existed {
        println!("  exists:  {}", paths::DB_FILE);
    } else {
        println!("  created: {}", paths::DB_FILE);
    }

    println!("\nNext: run 'actions sync' to register the built-in handlers.");
    Ok(())
}
