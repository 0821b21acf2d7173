use crate::error::{ActionsError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// DispatchConfig
// ---------------------------------------------------------------------------

/// How stored parameters are merged into the context within one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContextMerge {
    /// Every action sees the base context plus its own parameters only.
    #[default]
    Isolated,
    /// Parameters accumulate: later actions see keys merged for earlier ones.
    Cumulative,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    #[serde(default)]
    pub context_merge: ContextMerge,
}

fn default_max_depth() -> u32 {
    35
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            context_merge: ContextMerge::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// SyncConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Namespace that core-owned modules are folded into for trigger lookup.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Suffix appended to a handler name to find its configuration form.
    #[serde(default = "default_form_suffix")]
    pub form_suffix: String,
    #[serde(default = "default_core_modules")]
    pub core_modules: Vec<String>,
}

fn default_namespace() -> String {
    "actions".to_string()
}

fn default_form_suffix() -> String {
    "_form".to_string()
}

fn default_core_modules() -> Vec<String> {
    ["node", "comment", "user", "system", "taxonomy"]
        .iter()
        .map(|m| m.to_string())
        .collect()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            form_suffix: default_form_suffix(),
            core_modules: default_core_modules(),
        }
    }
}

impl SyncConfig {
    /// Map a module to the namespace used when reading trigger defaults.
    pub fn trigger_namespace<'a>(&'a self, module: &'a str) -> &'a str {
        if self.core_modules.iter().any(|m| m == module) {
            &self.namespace
        } else {
            module
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

/// Trigger defaults: namespace -> identity -> trigger name -> flag.
pub type TriggerDefaults = BTreeMap<String, BTreeMap<String, BTreeMap<String, Value>>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub triggers: TriggerDefaults,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            dispatch: DispatchConfig::default(),
            sync: SyncConfig::default(),
            triggers: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        let data = crate::io::read_optional(&paths::config_path(root))?
            .ok_or(ActionsError::NotInitialized)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    /// Untyped lookup of `namespace.key`, e.g. `get("dispatch", "max_depth")`.
    pub fn get(&self, namespace: &str, key: &str) -> Option<Value> {
        let tree = serde_yaml::to_value(self).ok()?;
        tree.get(namespace)?.get(key).cloned()
    }

    /// Trigger names declared for `identity` under `namespace` whose flag is truthy.
    pub fn default_triggers(&self, namespace: &str, identity: &str) -> BTreeSet<String> {
        self.triggers
            .get(namespace)
            .and_then(|by_identity| by_identity.get(identity))
            .map(|flags| {
                flags
                    .iter()
                    .filter(|(_, flag)| is_truthy(flag))
                    .map(|(name, _)| name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.dispatch.max_depth == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "dispatch.max_depth is 0: every invocation would abort".to_string(),
            });
        }

        if self.sync.form_suffix.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "sync.form_suffix is empty: every handler counts as its own form"
                    .to_string(),
            });
        }

        for (namespace, by_identity) in &self.triggers {
            for (identity, flags) in by_identity {
                for (trigger, flag) in flags {
                    if !matches!(flag, Value::Bool(_)) {
                        warnings.push(ConfigWarning {
                            level: WarnLevel::Warning,
                            message: format!(
                                "trigger '{trigger}' for '{namespace}.{identity}' has a non-boolean flag"
                            ),
                        });
                    }
                }
            }
        }

        warnings
    }
}

/// Loose truthiness for trigger flags written by hand.
fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Sequence(seq) => !seq.is_empty(),
        Value::Mapping(m) => !m.is_empty(),
        Value::Tagged(t) => is_truthy(&t.value),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
