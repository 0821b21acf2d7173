use crate::error::{ActionsError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const ACTIONS_DIR: &str = ".actions";
pub const CONFIG_FILE: &str = ".actions/config.yaml";
pub const DB_FILE: &str = ".actions/actions.db";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn actions_dir(root: &Path) -> PathBuf {
    root.join(ACTIONS_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn db_path(root: &Path) -> PathBuf {
    root.join(DB_FILE)
}

// ---------------------------------------------------------------------------
// Identity validation
// ---------------------------------------------------------------------------

static IDENTITY_RE: OnceLock<Regex> = OnceLock::new();

fn identity_re() -> &'static Regex {
    IDENTITY_RE.get_or_init(|| Regex::new(r"^[a-z_][a-z0-9_]*$").unwrap())
}

/// Handler identities double as callable names, so they follow identifier rules.
pub fn validate_identity(identity: &str) -> Result<()> {
    if identity.is_empty() || identity.len() > 255 || !identity_re().is_match(identity) {
        return Err(ActionsError::InvalidIdentity(identity.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
