//! The `BookStore` trait — the persistence seam for the inventory service.

use std::sync::Arc;

use async_trait::async_trait;
use shelfstack_kernel::settings::DatabaseSettings;
use shelfstack_kernel::Migration;
use uuid::Uuid;

use crate::book::{Book, BookFilter, NewBook};
use crate::error::{Result, StoreError};
use crate::memory::MemoryBookStore;
use crate::sqlite::SqliteBookStore;

/// Persistence contract for book records.
///
/// Implementations must enforce the isbn uniqueness invariant themselves:
/// two concurrent inserts with the same isbn leave exactly one surviving
/// record, with the losing write reported as [`StoreError::DuplicateIsbn`].
#[async_trait]
pub trait BookStore: Send + Sync {
    /// Apply module-contributed migrations. Backends without a schema
    /// treat this as a no-op.
    async fn migrate(&self, migrations: &[(String, Migration)]) -> Result<()>;

    /// Insert a new book, assigning its id and timestamps.
    async fn insert(&self, fields: NewBook) -> Result<Book>;

    /// Point lookup by id.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Book>>;

    /// Lookup by isbn, optionally ignoring one record. The exclusion lets
    /// an update check uniqueness against all *other* records.
    async fn find_by_isbn(&self, isbn: &str, excluding: Option<Uuid>) -> Result<Option<Book>>;

    /// All books matching the filter, newest first.
    async fn list(&self, filter: &BookFilter) -> Result<Vec<Book>>;

    /// Replace every mutable field of the book at once, bumping
    /// `updated_at` and re-validating isbn uniqueness.
    async fn update(&self, id: Uuid, fields: NewBook) -> Result<Book>;

    /// Remove a book, returning the deleted record.
    async fn delete(&self, id: Uuid) -> Result<Book>;

    /// Total number of books.
    async fn count(&self) -> Result<u64>;

    /// Number of books with quantity strictly below the threshold.
    async fn count_low_stock(&self, threshold: i64) -> Result<u64>;

    /// The book with the highest price, if any.
    async fn max_price(&self) -> Result<Option<Book>>;

    /// Distinct category values, sorted.
    async fn distinct_categories(&self) -> Result<Vec<String>>;
}

/// Open the backend named by the database settings.
///
/// `sqlite:<path>` selects the durable backend; `memory` selects the
/// in-process backend.
pub async fn connect(settings: &DatabaseSettings) -> Result<Arc<dyn BookStore>> {
    if settings.url == "memory" {
        tracing::info!("using in-memory book store");
        return Ok(Arc::new(MemoryBookStore::new()));
    }

    if settings.url.starts_with("sqlite:") {
        let store = SqliteBookStore::connect(&settings.url, settings.max_connections).await?;
        return Ok(Arc::new(store));
    }

    Err(StoreError::ConnectionError(format!(
        "unsupported store url '{}'; expected sqlite:<path> or memory",
        settings.url
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_rejects_unknown_scheme() {
        let settings = DatabaseSettings {
            url: "postgres://localhost".to_string(),
            max_connections: 1,
        };
        let result = connect(&settings).await;
        assert!(matches!(result, Err(StoreError::ConnectionError(_))));
    }

    #[tokio::test]
    async fn connect_memory_yields_empty_store() {
        let settings = DatabaseSettings {
            url: "memory".to_string(),
            max_connections: 1,
        };
        let store = connect(&settings).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
