//! Error types for book store operations.

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during book store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No book with the given id exists.
    #[error("book not found: {0}")]
    NotFound(Uuid),

    /// Another book already holds the given isbn.
    #[error("isbn already exists: {0}")]
    DuplicateIsbn(String),

    /// Cannot connect to or configure the storage backend.
    #[error("connection error: {0}")]
    ConnectionError(String),

    /// A persisted row could not be converted back into a book.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Database error from SQLx.
    #[error("database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Returns true if this error reflects a constraint the caller can
    /// surface to the user rather than an internal failure.
    pub fn is_constraint(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound(_) | StoreError::DuplicateIsbn(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display_includes_id() {
        let id = Uuid::now_v7();
        let err = StoreError::NotFound(id);
        assert!(err.to_string().contains("book not found"));
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn constraint_classification() {
        assert!(StoreError::DuplicateIsbn("978-0".into()).is_constraint());
        assert!(StoreError::NotFound(Uuid::now_v7()).is_constraint());
        assert!(!StoreError::ConnectionError("down".into()).is_constraint());
    }
}
