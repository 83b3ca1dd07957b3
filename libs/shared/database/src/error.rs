use thiserror::Error;

/// Failures talking to the PostgREST layer, classified by what callers need
/// to branch on.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// HTTP 409: a unique constraint or an RPC-raised `PT409` rejected the write.
    #[error("Conflict ({code}): {message}")]
    Conflict { code: String, message: String },

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid request configuration: {0}")]
    Configuration(String),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DatabaseError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, DatabaseError::Conflict { .. })
    }

    /// Postgres / PostgREST error code of a conflict, e.g. `23505`.
    pub fn conflict_code(&self) -> Option<&str> {
        match self {
            DatabaseError::Conflict { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }
}
