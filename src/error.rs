use http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum SkilletError {
    #[error("Collection not found: {0}")]
    MissingCollection(String),

    #[error("Backend error (status {status}): {message}")]
    Backend { status: u16, message: String },

    #[error("Unsupported type '{field_type}' for field '{field}'")]
    UnsupportedFieldType { field: String, field_type: String },

    #[error("Invalid condition: {0}")]
    InvalidCondition(String),

    #[error("A primary identity is required to index a document for '{0}'")]
    MissingIdentity(String),

    #[error("Transaction is bound to entity type '{active}', cannot merge '{attempted}'")]
    TransactionTypeConflict { active: String, attempted: String },

    #[error("No transaction is active")]
    TransactionInactive,

    #[error("{} bulk item(s) failed", .0.len())]
    BulkItemError(Vec<BulkFailure>),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SkilletError>;

/// One failed item from a bulk response, positioned by its place in the
/// request body so callers can map it back to the submitted document.
#[derive(Debug, Clone)]
pub struct BulkFailure {
    pub position: usize,
    pub id: String,
    pub error: String,
}

impl From<reqwest::Error> for SkilletError {
    fn from(e: reqwest::Error) -> Self {
        SkilletError::Http(e.to_string())
    }
}

impl From<serde_json::Error> for SkilletError {
    fn from(e: serde_json::Error) -> Self {
        SkilletError::Json(e.to_string())
    }
}

impl SkilletError {
    /// Classify an error reported by the backend. A 404 on the configured
    /// collection gets its own kind so callers can bootstrap missing
    /// collections; everything else stays a generic backend error.
    pub(crate) fn from_backend(collection: &str, status: StatusCode, message: String) -> Self {
        if status == StatusCode::NOT_FOUND {
            SkilletError::MissingCollection(collection.to_string())
        } else {
            SkilletError::Backend {
                status: status.as_u16(),
                message,
            }
        }
    }
}
