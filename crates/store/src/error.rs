//! Error types for the recipe store

use pantry_core::RecipeId;
use thiserror::Error;

/// Result type for store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Broad failure category, for mapping errors to outward statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input rejected before reaching the database
    Validation,
    /// An explicit id did not address any record
    NotFound,
    /// A uniqueness constraint was violated
    Conflict,
    /// Connectivity, I/O, or any other database failure
    Storage,
}

/// Errors that can occur in the recipe store
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing input fields
    #[error("Invalid recipe: {0}")]
    Validation(String),

    /// Recipe not found
    #[error("Recipe not found: id={id}")]
    NotFound { id: RecipeId },

    /// Another recipe already uses this name
    #[error("Recipe name already exists: {name}")]
    Conflict { name: String },

    /// SQLite database error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database corruption or schema mismatch
    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    ConnectionError(#[from] tokio_rusqlite::Error),
}

impl Error {
    /// Create a database error with a message
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a not found error
    pub fn not_found(id: RecipeId) -> Self {
        Self::NotFound { id }
    }

    /// Create a name conflict error
    pub fn conflict(name: impl Into<String>) -> Self {
        Self::Conflict { name: name.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Sqlite(_) | Self::Json(_) | Self::Io(_) | Self::Database(_) | Self::ConnectionError(_) => {
                ErrorKind::Storage
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}

impl From<pantry_core::Error> for Error {
    fn from(err: pantry_core::Error) -> Self {
        match err {
            pantry_core::Error::Validation(msg) => Self::Validation(msg),
            pantry_core::Error::Io(e) => Self::Io(e),
            other => Self::Database(other.to_string()),
        }
    }
}

/// Whether a rusqlite error is a UNIQUE constraint violation
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
