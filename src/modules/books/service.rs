//! Inventory service: the operation set behind the books and dashboard
//! routes. Every operation consults the access gate before touching the
//! store, and validation plus the duplicate pre-check resolve before any
//! mutation is attempted.

use std::sync::Arc;

use serde_json::json;
use shelfstack_auth::{AccessGate, Verdict};
use shelfstack_http::error::AppError;
use shelfstack_store::{Book, BookFilter, BookStore, StoreError, LOW_STOCK_THRESHOLD};
use thiserror::Error;
use uuid::Uuid;

use super::models::{BookPayload, DashboardStats, ListQuery};

/// Category filter value meaning "no category filter".
const ALL_CATEGORIES: &str = "all";

/// Failure taxonomy for inventory operations. `Store` covers unexpected
/// backend failures and is never conflated with an empty result.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("missing or invalid credential")]
    Unauthorized,

    #[error("validation failed")]
    Validation(Vec<serde_json::Value>),

    #[error("a book with isbn {0} already exists")]
    DuplicateIsbn(String),

    #[error("book not found: {0}")]
    NotFound(Uuid),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for InventoryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => InventoryError::NotFound(id),
            StoreError::DuplicateIsbn(isbn) => InventoryError::DuplicateIsbn(isbn),
            other => InventoryError::Store(other),
        }
    }
}

impl From<InventoryError> for AppError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::Unauthorized => AppError::unauthorized("missing or invalid credential"),
            InventoryError::Validation(details) => {
                AppError::validation(details, "all fields are required")
            }
            InventoryError::DuplicateIsbn(isbn) => AppError::conflict(
                vec![json!({"field": "isbn", "error": "already exists"})],
                format!("a book with isbn {isbn} already exists"),
            ),
            InventoryError::NotFound(_) => AppError::not_found("book not found"),
            InventoryError::Store(e) => AppError::Internal(anyhow::Error::new(e)),
        }
    }
}

/// The inventory operation set over a book store and an access gate.
pub struct InventoryService {
    store: Arc<dyn BookStore>,
    gate: Arc<dyn AccessGate>,
}

impl InventoryService {
    pub fn new(store: Arc<dyn BookStore>, gate: Arc<dyn AccessGate>) -> Self {
        Self { store, gate }
    }

    /// Refuse the operation unless the credential is present and the gate
    /// allows it.
    async fn authorize(&self, credential: Option<&str>) -> Result<(), InventoryError> {
        let token = credential.ok_or(InventoryError::Unauthorized)?;
        match self.gate.verify(token).await {
            Verdict::Allowed(_) => Ok(()),
            Verdict::Denied => Err(InventoryError::Unauthorized),
        }
    }

    /// All books matching the optional search term and category, newest
    /// first. A blank term or the `all` category sentinel means no filter.
    pub async fn list_books(
        &self,
        credential: Option<&str>,
        query: ListQuery,
    ) -> Result<Vec<Book>, InventoryError> {
        self.authorize(credential).await?;

        let search = normalize(query.search);
        let category =
            normalize(query.category).filter(|c| !c.eq_ignore_ascii_case(ALL_CATEGORIES));

        let filter = BookFilter { search, category };
        Ok(self.store.list(&filter).await?)
    }

    pub async fn get_book(
        &self,
        credential: Option<&str>,
        id: Uuid,
    ) -> Result<Book, InventoryError> {
        self.authorize(credential).await?;

        self.store
            .find_by_id(id)
            .await?
            .ok_or(InventoryError::NotFound(id))
    }

    pub async fn create_book(
        &self,
        credential: Option<&str>,
        payload: BookPayload,
    ) -> Result<Book, InventoryError> {
        self.authorize(credential).await?;

        let fields = payload.validate().map_err(InventoryError::Validation)?;

        // Fast-path duplicate check for a friendly error; the store's own
        // constraint is the actual enforcement under concurrency.
        if self.store.find_by_isbn(&fields.isbn, None).await?.is_some() {
            return Err(InventoryError::DuplicateIsbn(fields.isbn));
        }

        let book = self.store.insert(fields).await?;
        tracing::info!(book_id = %book.id, isbn = %book.isbn, "created book");
        Ok(book)
    }

    pub async fn update_book(
        &self,
        credential: Option<&str>,
        id: Uuid,
        payload: BookPayload,
    ) -> Result<Book, InventoryError> {
        self.authorize(credential).await?;

        let fields = payload.validate().map_err(InventoryError::Validation)?;

        // A different book holding the target isbn is a conflict; the
        // record's own isbn is not.
        if self
            .store
            .find_by_isbn(&fields.isbn, Some(id))
            .await?
            .is_some()
        {
            return Err(InventoryError::DuplicateIsbn(fields.isbn));
        }

        let book = self.store.update(id, fields).await?;
        tracing::info!(book_id = %book.id, "updated book");
        Ok(book)
    }

    pub async fn delete_book(
        &self,
        credential: Option<&str>,
        id: Uuid,
    ) -> Result<Book, InventoryError> {
        self.authorize(credential).await?;

        let book = self.store.delete(id).await?;
        tracing::info!(book_id = %book.id, isbn = %book.isbn, "deleted book");
        Ok(book)
    }

    /// Aggregates over the full current inventory.
    pub async fn dashboard_stats(
        &self,
        credential: Option<&str>,
    ) -> Result<DashboardStats, InventoryError> {
        self.authorize(credential).await?;

        let total_books = self.store.count().await?;
        let low_stock_books = self.store.count_low_stock(LOW_STOCK_THRESHOLD).await?;
        let highest_price = self
            .store
            .max_price()
            .await?
            .map(|book| book.price)
            .unwrap_or(0.0);
        let total_categories = self.store.distinct_categories().await?.len() as u64;

        Ok(DashboardStats {
            total_books,
            low_stock_books,
            highest_price,
            total_categories,
        })
    }
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
