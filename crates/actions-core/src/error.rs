use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActionsError {
    #[error("not initialized: run 'actions init'")]
    NotInitialized,

    #[error("action not found: {0}")]
    ActionNotFound(String),

    #[error("action already exists: {0}")]
    ActionExists(String),

    #[error("invalid action id '{0}'")]
    InvalidActionId(String),

    #[error("invalid identity '{0}': must be lowercase alphanumeric with underscores")]
    InvalidIdentity(String),

    #[error("unknown token: {0}")]
    InvalidToken(String),

    #[error("handler not found: {0}")]
    HandlerNotFound(String),

    #[error("action store error: {0}")]
    Store(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ActionsError>;
