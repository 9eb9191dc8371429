use thiserror::Error;

/// Failure reported by a store gateway.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The caller lacks permission to write the entity.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// One or more fields collide with an existing record.
    #[error("uniqueness conflict on {fields:?}")]
    Conflict { fields: Vec<String> },
    /// The store rejected field values.
    #[error("validation failed on {fields:?}: {message}")]
    ValidationFailed { fields: Vec<String>, message: String },
    /// Any other non-success response.
    #[error("request failed with status {status}: {message}")]
    RequestFailed { status: u16, message: String },
    /// Connection, timeout or decoding failure.
    #[error("transport error: {0}")]
    Transport(String),
}

impl StoreError {
    /// Fields named by the failure, if the store reported any.
    pub fn fields(&self) -> &[String] {
        match self {
            StoreError::Conflict { fields } | StoreError::ValidationFailed { fields, .. } => {
                fields
            }
            _ => &[],
        }
    }

    pub fn touches_field(&self, field: &str) -> bool {
        self.fields().iter().any(|name| name == field)
    }

    /// Short machine-readable code used in reports and logs.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Forbidden(_) => "forbidden",
            StoreError::Conflict { .. } => "conflict",
            StoreError::ValidationFailed { .. } => "validation_failed",
            StoreError::RequestFailed { .. } => "request_failed",
            StoreError::Transport(_) => "transport",
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Transport(err.to_string())
    }
}
