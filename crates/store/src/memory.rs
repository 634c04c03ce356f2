//! In-memory book store implementation.
//!
//! Not durable; data is lost on process exit. Used for tests and
//! development. Every mutation takes the write lock before its uniqueness
//! check, so the isbn invariant holds under concurrent callers exactly as
//! it does for the SQLite backend's unique index.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use parking_lot::RwLock;
use shelfstack_kernel::Migration;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::book::{Book, BookFilter, NewBook};
use crate::error::{Result, StoreError};
use crate::store::BookStore;

/// In-memory implementation of [`BookStore`].
pub struct MemoryBookStore {
    books: RwLock<BTreeMap<Uuid, Book>>,
}

impl MemoryBookStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            books: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of books in the store.
    pub fn len(&self) -> usize {
        self.books.read().len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.books.read().is_empty()
    }
}

impl Default for MemoryBookStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookStore for MemoryBookStore {
    async fn migrate(&self, migrations: &[(String, Migration)]) -> Result<()> {
        tracing::debug!(count = migrations.len(), "memory store ignores migrations");
        Ok(())
    }

    async fn insert(&self, fields: NewBook) -> Result<Book> {
        let mut books = self.books.write();

        // Uniqueness check and insert happen under the same write lock.
        if books.values().any(|b| b.isbn == fields.isbn) {
            return Err(StoreError::DuplicateIsbn(fields.isbn));
        }

        let now = OffsetDateTime::now_utc();
        let book = Book {
            id: Uuid::now_v7(),
            title: fields.title,
            author: fields.author,
            isbn: fields.isbn,
            price: fields.price,
            quantity: fields.quantity,
            category: fields.category,
            created_at: now,
            updated_at: now,
        };

        books.insert(book.id, book.clone());
        Ok(book)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Book>> {
        Ok(self.books.read().get(&id).cloned())
    }

    async fn find_by_isbn(&self, isbn: &str, excluding: Option<Uuid>) -> Result<Option<Book>> {
        Ok(self
            .books
            .read()
            .values()
            .find(|b| b.isbn == isbn && Some(b.id) != excluding)
            .cloned())
    }

    async fn list(&self, filter: &BookFilter) -> Result<Vec<Book>> {
        let mut matched: Vec<Book> = self
            .books
            .read()
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();

        // Newest first; v7 ids are time-ordered, so the id breaks
        // same-instant ties deterministically.
        matched.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        Ok(matched)
    }

    async fn update(&self, id: Uuid, fields: NewBook) -> Result<Book> {
        let mut books = self.books.write();

        if books
            .values()
            .any(|b| b.isbn == fields.isbn && b.id != id)
        {
            return Err(StoreError::DuplicateIsbn(fields.isbn));
        }

        let book = books.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        book.title = fields.title;
        book.author = fields.author;
        book.isbn = fields.isbn;
        book.price = fields.price;
        book.quantity = fields.quantity;
        book.category = fields.category;
        book.updated_at = OffsetDateTime::now_utc();

        Ok(book.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<Book> {
        self.books
            .write()
            .remove(&id)
            .ok_or(StoreError::NotFound(id))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.books.read().len() as u64)
    }

    async fn count_low_stock(&self, threshold: i64) -> Result<u64> {
        Ok(self
            .books
            .read()
            .values()
            .filter(|b| b.quantity < threshold)
            .count() as u64)
    }

    async fn max_price(&self) -> Result<Option<Book>> {
        Ok(self
            .books
            .read()
            .values()
            .max_by(|a, b| {
                a.price
                    .partial_cmp(&b.price)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.id.cmp(&b.id))
            })
            .cloned())
    }

    async fn distinct_categories(&self) -> Result<Vec<String>> {
        let categories: BTreeSet<String> = self
            .books
            .read()
            .values()
            .map(|b| b.category.clone())
            .collect();
        Ok(categories.into_iter().collect())
    }
}
