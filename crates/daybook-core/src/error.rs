//! Error types for daybook.

use thiserror::Error;

/// Result type alias using daybook's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for daybook operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Non-database store failure (commit rejected, backend unavailable)
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A store call exceeded its caller-supplied timeout
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Uniqueness violation on catalog insert
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Entry not found (or not visible to the requesting owner)
    #[error("Entry not found: {0}")]
    EntryNotFound(uuid::Uuid),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification used by callers to map failures onto responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed input, rejected before any store mutation.
    Validation,
    /// Store lookup, write, commit, or timeout failure.
    Persistence,
    /// Concurrent catalog creation. Recovered internally by the reconciler.
    Conflict,
    NotFound,
    Internal,
}

impl Error {
    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::InvalidInput(_) => ErrorClass::Validation,
            Error::Database(_)
            | Error::Persistence(_)
            | Error::Timeout(_)
            | Error::Serialization(_) => ErrorClass::Persistence,
            Error::Conflict(_) => ErrorClass::Conflict,
            Error::NotFound(_) | Error::EntryNotFound(_) => ErrorClass::NotFound,
            Error::Config(_) | Error::Internal(_) => ErrorClass::Internal,
        }
    }

    /// True for failures that leave prior stored state untouched and are
    /// reported as a failed write.
    pub fn is_persistence(&self) -> bool {
        self.class() == ErrorClass::Persistence
    }

    /// True for catalog uniqueness conflicts.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_display_invalid_input() {
        let err = Error::InvalidInput("mood out of range".to_string());
        assert_eq!(err.to_string(), "Invalid input: mood out of range");
    }

    #[test]
    fn test_error_display_entry_not_found() {
        let id = Uuid::nil();
        let err = Error::EntryNotFound(id);
        assert_eq!(err.to_string(), format!("Entry not found: {}", id));
    }

    #[test]
    fn test_error_display_conflict() {
        let err = Error::Conflict("tag 'work' already exists".to_string());
        assert_eq!(err.to_string(), "Conflict: tag 'work' already exists");
    }

    #[test]
    fn test_error_classes() {
        assert_eq!(
            Error::InvalidInput("x".into()).class(),
            ErrorClass::Validation
        );
        assert_eq!(
            Error::Persistence("x".into()).class(),
            ErrorClass::Persistence
        );
        assert_eq!(Error::Timeout("x".into()).class(), ErrorClass::Persistence);
        assert_eq!(
            Error::Database(sqlx::Error::PoolTimedOut).class(),
            ErrorClass::Persistence
        );
        assert_eq!(Error::Conflict("x".into()).class(), ErrorClass::Conflict);
        assert_eq!(
            Error::EntryNotFound(Uuid::nil()).class(),
            ErrorClass::NotFound
        );
        assert_eq!(Error::Internal("x".into()).class(), ErrorClass::Internal);
    }

    #[test]
    fn test_is_persistence_and_conflict() {
        assert!(Error::Timeout("store".into()).is_persistence());
        assert!(!Error::InvalidInput("x".into()).is_persistence());
        assert!(Error::Conflict("x".into()).is_conflict());
        assert!(!Error::Persistence("x".into()).is_conflict());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
