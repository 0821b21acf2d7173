use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Decoded parameter values stored with a configurable instance.
pub type Parameters = serde_json::Map<String, Value>;

/// Auxiliary information handed to every handler alongside the subject.
pub type Context = serde_json::Map<String, Value>;

/// Per-identifier results of one dispatch call.
pub type Results = BTreeMap<ActionId, Outcome>;

/// Context key naming the event that caused a dispatch.
pub const HOOK_KEY: &str = "hook";

/// Build a base context carrying only the triggering hook.
pub fn hook_context(hook: &str) -> Context {
    let mut ctx = Context::new();
    ctx.insert(HOOK_KEY.to_string(), Value::String(hook.to_string()));
    ctx
}

// ---------------------------------------------------------------------------
// ActionId
// ---------------------------------------------------------------------------

/// Identifies an action: a numeric configurable instance or a simple handler
/// identity.
///
/// Serialized untagged, so JSON numbers are configurable ids and JSON strings
/// are identities. An identity that happens to consist of digits stays a
/// `Simple` id once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionId {
    Configurable(u64),
    Simple(String),
}

impl ActionId {
    pub fn simple(identity: impl Into<String>) -> Self {
        ActionId::Simple(identity.into())
    }

    pub fn is_configurable(&self) -> bool {
        matches!(self, ActionId::Configurable(_))
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionId::Configurable(n) => write!(f, "{n}"),
            ActionId::Simple(s) => f.write_str(s),
        }
    }
}

impl From<u64> for ActionId {
    fn from(n: u64) -> Self {
        ActionId::Configurable(n)
    }
}

impl From<&str> for ActionId {
    fn from(s: &str) -> Self {
        ActionId::Simple(s.to_string())
    }
}

/// Parses command-line style identifiers.
///
/// All-digit input is a configurable id; a `name:` prefix forces a simple
/// identity (`name:404` is the identity `"404"`); anything else is an
/// identity as written.
impl std::str::FromStr for ActionId {
    type Err = crate::error::ActionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(rest) = s.strip_prefix("name:") {
            if rest.is_empty() {
                return Err(crate::error::ActionsError::InvalidActionId(s.to_string()));
            }
            return Ok(ActionId::Simple(rest.to_string()));
        }
        if s.is_empty() {
            return Err(crate::error::ActionsError::InvalidActionId(s.to_string()));
        }
        if s.bytes().all(|b| b.is_ascii_digit()) {
            return s
                .parse::<u64>()
                .map(ActionId::Configurable)
                .map_err(|_| crate::error::ActionsError::InvalidActionId(s.to_string()));
        }
        Ok(ActionId::Simple(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Configurability
// ---------------------------------------------------------------------------

/// How an action is configured. Persisted as 0 / 1 / 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(into = "u8", try_from = "u8")]
pub enum Configurability {
    #[default]
    Simple,
    Advanced,
    /// A companion configuration-form handler exists.
    WithForm,
}

impl Configurability {
    pub fn as_str(self) -> &'static str {
        match self {
            Configurability::Simple => "simple",
            Configurability::Advanced => "advanced",
            Configurability::WithForm => "configurable",
        }
    }
}

impl From<Configurability> for u8 {
    fn from(c: Configurability) -> u8 {
        match c {
            Configurability::Simple => 0,
            Configurability::Advanced => 1,
            Configurability::WithForm => 2,
        }
    }
}

impl TryFrom<u8> for Configurability {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Configurability::Simple),
            1 => Ok(Configurability::Advanced),
            2 => Ok(Configurability::WithForm),
            other => Err(format!("invalid configurable flag: {other}")),
        }
    }
}

impl fmt::Display for Configurability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// HandlerDescriptor
// ---------------------------------------------------------------------------

/// A handler the host program declares at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerDescriptor {
    pub identity: String,
    pub label: String,
    #[serde(rename = "type")]
    pub action_type: String,
    pub module: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler_name: Option<String>,
    #[serde(default)]
    pub has_config_form: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
}

impl HandlerDescriptor {
    pub fn new(
        identity: impl Into<String>,
        label: impl Into<String>,
        action_type: impl Into<String>,
        module: impl Into<String>,
    ) -> Self {
        Self {
            identity: identity.into(),
            label: label.into(),
            action_type: action_type.into(),
            module: module.into(),
            handler_name: None,
            has_config_form: false,
            source_file: None,
        }
    }

    pub fn with_handler(mut self, name: impl Into<String>) -> Self {
        self.handler_name = Some(name.into());
        self
    }

    pub fn with_config_form(mut self) -> Self {
        self.has_config_form = true;
        self
    }

    pub fn with_source(mut self, file: impl Into<String>) -> Self {
        self.source_file = Some(file.into());
        self
    }

    /// Name of the callable that executes this handler. Defaults to the identity.
    pub fn handler_of_record(&self) -> &str {
        self.handler_name.as_deref().unwrap_or(&self.identity)
    }
}

// ---------------------------------------------------------------------------
// ActionInstance
// ---------------------------------------------------------------------------

/// A persisted action row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionInstance {
    pub id: ActionId,
    #[serde(rename = "type")]
    pub action_type: String,
    pub handler_name: String,
    #[serde(default)]
    pub parameters: Parameters,
    pub label: String,
    #[serde(default)]
    pub configurable: Configurability,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<u64>,
    #[serde(default)]
    pub trigger_names: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
}

impl ActionInstance {
    /// True when the row carries stored parameter values.
    pub fn is_configured(&self) -> bool {
        !self.parameters.is_empty()
    }

    /// Trigger names joined with single spaces.
    pub fn trigger_string(&self) -> String {
        self.trigger_names
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn summary(&self) -> ActionSummary {
        ActionSummary {
            id: self.id.clone(),
            action_type: self.action_type.clone(),
            handler_name: self.handler_name.clone(),
            label: self.label.clone(),
            configurable: self.configurable,
            trigger_names: self.trigger_names.clone(),
        }
    }
}

/// An action row with its parameters stripped, suitable for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSummary {
    pub id: ActionId,
    #[serde(rename = "type")]
    pub action_type: String,
    pub handler_name: String,
    pub label: String,
    pub configurable: Configurability,
    pub trigger_names: BTreeSet<String>,
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Why an identifier produced no real result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    /// The identifier (or the row's handler name) is not in the handler table.
    HandlerNotFound { handler: String },
    /// No persisted row exists for a configurable id.
    InstanceNotFound,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::HandlerNotFound { handler } => write!(f, "handler not found: {handler}"),
            FailureReason::InstanceNotFound => f.write_str("instance not found"),
        }
    }
}

/// The recorded result for one identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Outcome {
    Completed(Value),
    Failed(FailureReason),
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Outcome::Completed(v) => Some(v),
            Outcome::Failed(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
