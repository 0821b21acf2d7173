//! Opaque tokens standing in for action identities on external surfaces.
//!
//! A token is the first 16 bytes of a SHA-256 digest over a kind-tagged
//! rendering of the id, encoded as unpadded URL-safe base64 (22 chars). The
//! kind tag keeps `Simple("7")` and `Configurable(7)` apart. Tokens depend on
//! nothing but the id, so they stay valid across processes and restarts.

use std::collections::{BTreeMap, BTreeSet};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::catalog::HandlerCatalog;
use crate::error::Result;
use crate::store::ActionStore;
use crate::types::{ActionId, ActionInstance, Configurability, HandlerDescriptor};

const TOKEN_BYTES: usize = 16;

/// Token -> denormalized descriptor.
pub type TokenMap = BTreeMap<String, TokenEntry>;

pub fn tokenize(id: &ActionId) -> String {
    let input = match id {
        ActionId::Configurable(n) => format!("configurable:{n}"),
        ActionId::Simple(name) => format!("simple:{name}"),
    };
    let digest = Sha256::digest(input.as_bytes());
    URL_SAFE_NO_PAD.encode(&digest[..TOKEN_BYTES])
}

// ---------------------------------------------------------------------------
// Token map
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenEntry {
    pub identity: ActionId,
    pub callback: String,
    pub label: String,
    #[serde(rename = "type")]
    pub action_type: String,
    pub configurable: Configurability,
    pub trigger_names: BTreeSet<String>,
}

/// One input row for [`build_token_map`].
#[derive(Debug, Clone)]
pub struct TokenSource {
    pub id: ActionId,
    pub callback: Option<String>,
    pub label: String,
    pub action_type: String,
    pub configurable: Configurability,
    pub trigger_names: BTreeSet<String>,
}

impl From<&HandlerDescriptor> for TokenSource {
    fn from(d: &HandlerDescriptor) -> Self {
        Self {
            id: ActionId::simple(d.identity.clone()),
            callback: d.handler_name.clone(),
            label: d.label.clone(),
            action_type: d.action_type.clone(),
            configurable: if d.has_config_form {
                Configurability::WithForm
            } else {
                Configurability::Simple
            },
            trigger_names: BTreeSet::new(),
        }
    }
}

impl From<&ActionInstance> for TokenSource {
    fn from(row: &ActionInstance) -> Self {
        Self {
            id: row.id.clone(),
            callback: Some(row.handler_name.clone()),
            label: row.label.clone(),
            action_type: row.action_type.clone(),
            configurable: row.configurable,
            trigger_names: row.trigger_names.clone(),
        }
    }
}

/// Key every entry by its token. The callback falls back to the entry's own id.
pub fn build_token_map<I, S>(entries: I) -> TokenMap
where
    I: IntoIterator<Item = S>,
    S: Into<TokenSource>,
{
    entries
        .into_iter()
        .map(Into::into)
        .map(|src: TokenSource| {
            let token = tokenize(&src.id);
            let callback = src.callback.unwrap_or_else(|| src.id.to_string());
            let entry = TokenEntry {
                identity: src.id,
                callback,
                label: src.label,
                action_type: src.action_type,
                configurable: src.configurable,
                trigger_names: src.trigger_names,
            };
            (token, entry)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Reverse lookup
// ---------------------------------------------------------------------------

/// Find the id behind `token`.
///
/// Catalog identities are checked first, then persisted rows: those carrying
/// parameters before the rest, so every token a registry token map can emit
/// resolves. Both passes recompute tokens; this is a linear scan meant for
/// admin paths.
pub fn reverse_lookup(
    catalog: &HandlerCatalog,
    store: &dyn ActionStore,
    token: &str,
) -> Result<Option<ActionId>> {
    for descriptor in catalog.list_all() {
        let id = ActionId::simple(descriptor.identity.clone());
        if tokenize(&id) == token {
            return Ok(Some(id));
        }
    }
    let (configured, rest): (Vec<_>, Vec<_>) = store
        .select_all()?
        .into_iter()
        .partition(ActionInstance::is_configured);
    for row in configured.into_iter().chain(rest) {
        if tokenize(&row.id) == token {
            return Ok(Some(row.id));
        }
    }
    Ok(None)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
