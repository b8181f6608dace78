use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid entry key: {0}")]
    InvalidKey(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("message log error: {0}")]
    MessageLog(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    pub operation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl SyncError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidKey(_) => "INVALID_KEY",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::MessageLog(_) => "MESSAGE_LOG_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Sqlite(_) => "SQLITE_ERROR",
            Self::Http(_) => "HTTP_ERROR",
            Self::Toml(_) => "TOML_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub(crate) fn mutex_poisoned(name: &str) -> Self {
        Self::Internal(format!("{name} lock poisoned"))
    }

    pub fn to_payload(&self, operation: impl Into<String>, key: Option<String>) -> ErrorPayload {
        ErrorPayload {
            code: self.code().to_string(),
            message: self.to_string(),
            operation: operation.into(),
            key,
        }
    }
}
