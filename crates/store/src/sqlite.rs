//! SQLite book store implementation.
//!
//! Uses WAL mode for concurrent readers. The isbn uniqueness invariant is
//! carried by a `UNIQUE` index, so enforcement happens inside the database
//! write itself rather than in application code; unique-violation errors
//! surface as [`StoreError::DuplicateIsbn`].

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use shelfstack_kernel::Migration;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::QueryBuilder;
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use crate::book::{Book, BookFilter, NewBook};
use crate::error::{Result, StoreError};
use crate::store::BookStore;

const BOOK_COLUMNS: &str =
    "id, title, author, isbn, price, quantity, category, created_at, updated_at";

type BookRow = (String, String, String, String, f64, i64, String, i64, i64);

/// Migrations owned by the book store schema. Surfaced through the books
/// module so the registry lifecycle applies them at startup.
pub fn book_migrations() -> Vec<Migration> {
    vec![Migration {
        id: "001_create_books",
        up: r#"
            CREATE TABLE IF NOT EXISTS books (
                id         TEXT PRIMARY KEY,
                title      TEXT NOT NULL,
                author     TEXT NOT NULL,
                isbn       TEXT NOT NULL,
                price      REAL NOT NULL CHECK (price >= 0),
                quantity   INTEGER NOT NULL DEFAULT 0 CHECK (quantity >= 0),
                category   TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS books_isbn_unique ON books (isbn);
            CREATE INDEX IF NOT EXISTS books_created_at ON books (created_at);
            "#,
    }]
}

/// SQLite implementation of [`BookStore`].
pub struct SqliteBookStore {
    pool: SqlitePool,
}

impl SqliteBookStore {
    /// Open or create a SQLite store at the given `sqlite:<path>` url.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        info!(url, "opening SQLite book store");

        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Create an in-memory SQLite store with the books schema applied
    /// (for testing).
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        // A single connection keeps the in-memory database alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        let store = Self { pool };

        let migrations: Vec<(String, Migration)> = book_migrations()
            .into_iter()
            .map(|m| ("books".to_string(), m))
            .collect();
        store.migrate(&migrations).await?;

        Ok(store)
    }
}

// Nanosecond precision keeps the newest-first sort stable for inserts
// landing within the same millisecond.
fn now_nanos() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp_nanos() as i64
}

fn nanos_to_time(nanos: i64) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(nanos as i128)
        .map_err(|e| StoreError::SerializationError(e.to_string()))
}

fn book_from_row(row: BookRow) -> Result<Book> {
    let (id, title, author, isbn, price, quantity, category, created_at, updated_at) = row;
    Ok(Book {
        id: Uuid::parse_str(&id).map_err(|e| StoreError::SerializationError(e.to_string()))?,
        title,
        author,
        isbn,
        price,
        quantity,
        category,
        created_at: nanos_to_time(created_at)?,
        updated_at: nanos_to_time(updated_at)?,
    })
}

/// LIKE pattern for a case-insensitive substring match, with LIKE
/// metacharacters escaped.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn map_write_error(err: sqlx::Error, isbn: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::DuplicateIsbn(isbn.to_string())
        }
        _ => StoreError::DatabaseError(err),
    }
}

#[async_trait]
impl BookStore for SqliteBookStore {
    async fn migrate(&self, migrations: &[(String, Migration)]) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                module     TEXT NOT NULL,
                id         TEXT NOT NULL,
                applied_at INTEGER NOT NULL,
                PRIMARY KEY (module, id)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        for (module, migration) in migrations {
            let applied: Option<(i64,)> =
                sqlx::query_as("SELECT 1 FROM schema_migrations WHERE module = ? AND id = ?")
                    .bind(module)
                    .bind(migration.id)
                    .fetch_optional(&self.pool)
                    .await?;

            if applied.is_some() {
                debug!(module = %module, id = migration.id, "migration already applied");
                continue;
            }

            let mut tx = self.pool.begin().await?;
            sqlx::query(migration.up).execute(&mut *tx).await?;
            sqlx::query("INSERT INTO schema_migrations (module, id, applied_at) VALUES (?, ?, ?)")
                .bind(module)
                .bind(migration.id)
                .bind(now_nanos())
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            info!(module = %module, id = migration.id, "applied migration");
        }

        Ok(())
    }

    async fn insert(&self, fields: NewBook) -> Result<Book> {
        let id = Uuid::now_v7();
        let now = now_nanos();

        let result = sqlx::query(
            r#"
            INSERT INTO books (id, title, author, isbn, price, quantity, category, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&fields.title)
        .bind(&fields.author)
        .bind(&fields.isbn)
        .bind(fields.price)
        .bind(fields.quantity)
        .bind(&fields.category)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(Book {
                id,
                title: fields.title,
                author: fields.author,
                isbn: fields.isbn,
                price: fields.price,
                quantity: fields.quantity,
                category: fields.category,
                created_at: nanos_to_time(now)?,
                updated_at: nanos_to_time(now)?,
            }),
            Err(e) => Err(map_write_error(e, &fields.isbn)),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Book>> {
        let row: Option<BookRow> = sqlx::query_as(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(book_from_row).transpose()
    }

    async fn find_by_isbn(&self, isbn: &str, excluding: Option<Uuid>) -> Result<Option<Book>> {
        let row: Option<BookRow> = match excluding {
            Some(excluded) => {
                sqlx::query_as(&format!(
                    "SELECT {BOOK_COLUMNS} FROM books WHERE isbn = ? AND id <> ? LIMIT 1"
                ))
                .bind(isbn)
                .bind(excluded.to_string())
                .fetch_optional(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(&format!(
                    "SELECT {BOOK_COLUMNS} FROM books WHERE isbn = ? LIMIT 1"
                ))
                .bind(isbn)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        row.map(book_from_row).transpose()
    }

    async fn list(&self, filter: &BookFilter) -> Result<Vec<Book>> {
        let mut qb: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new(format!("SELECT {BOOK_COLUMNS} FROM books"));

        let mut has_where = false;
        if let Some(term) = &filter.search {
            let pattern = like_pattern(term);
            qb.push(" WHERE (lower(title) LIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" ESCAPE '\\' OR lower(author) LIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" ESCAPE '\\' OR lower(isbn) LIKE ");
            qb.push_bind(pattern);
            qb.push(" ESCAPE '\\')");
            has_where = true;
        }

        if let Some(category) = &filter.category {
            qb.push(if has_where { " AND " } else { " WHERE " });
            qb.push("category = ");
            qb.push_bind(category.clone());
        }

        qb.push(" ORDER BY created_at DESC, id DESC");

        let rows: Vec<BookRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(book_from_row).collect()
    }

    async fn update(&self, id: Uuid, fields: NewBook) -> Result<Book> {
        let existing = self.find_by_id(id).await?.ok_or(StoreError::NotFound(id))?;
        let now = now_nanos();

        let result = sqlx::query(
            r#"
            UPDATE books
            SET title = ?, author = ?, isbn = ?, price = ?, quantity = ?, category = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&fields.title)
        .bind(&fields.author)
        .bind(&fields.isbn)
        .bind(fields.price)
        .bind(fields.quantity)
        .bind(&fields.category)
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => Err(StoreError::NotFound(id)),
            Ok(_) => Ok(Book {
                id,
                title: fields.title,
                author: fields.author,
                isbn: fields.isbn,
                price: fields.price,
                quantity: fields.quantity,
                category: fields.category,
                created_at: existing.created_at,
                updated_at: nanos_to_time(now)?,
            }),
            Err(e) => Err(map_write_error(e, &fields.isbn)),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<Book> {
        let existing = self.find_by_id(id).await?.ok_or(StoreError::NotFound(id))?;

        sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(existing)
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn count_low_stock(&self, threshold: i64) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books WHERE quantity < ?")
            .bind(threshold)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn max_price(&self) -> Result<Option<Book>> {
        let row: Option<BookRow> = sqlx::query_as(&format!(
            "SELECT {BOOK_COLUMNS} FROM books ORDER BY price DESC, id DESC LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await?;

        row.map(book_from_row).transpose()
    }

    async fn distinct_categories(&self) -> Result<Vec<String>> {
        let categories: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT category FROM books ORDER BY category")
                .fetch_all(&self.pool)
                .await?;
        Ok(categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn fields(title: &str, isbn: &str, price: f64, quantity: i64, category: &str) -> NewBook {
        NewBook {
            title: title.to_string(),
            author: "Test Author".to_string(),
            isbn: isbn.to_string(),
            price,
            quantity,
            category: category.to_string(),
        }
    }

    #[tokio::test]
    async fn insert_and_round_trip() {
        let store = SqliteBookStore::in_memory().await.unwrap();

        let book = store
            .insert(fields("Dune", "978-0441172719", 12.99, 7, "Sci-Fi"))
            .await
            .unwrap();

        let found = store.find_by_id(book.id).await.unwrap().unwrap();
        assert_eq!(found, book);
        assert!(!found.is_low_stock());
    }

    #[tokio::test]
    async fn unique_index_rejects_duplicate_isbn() {
        let store = SqliteBookStore::in_memory().await.unwrap();

        store
            .insert(fields("First", "978-1", 5.0, 1, "Fiction"))
            .await
            .unwrap();
        let err = store
            .insert(fields("Second", "978-1", 6.0, 2, "Fiction"))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::DuplicateIsbn(isbn) if isbn == "978-1"));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_duplicate_inserts_leave_one_record() {
        let store = Arc::new(SqliteBookStore::in_memory().await.unwrap());

        let a = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .insert(fields("Copy A", "978-race", 5.0, 1, "Fiction"))
                    .await
            })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .insert(fields("Copy B", "978-race", 5.0, 1, "Fiction"))
                    .await
            })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let ok = results.iter().filter(|r| r.is_ok()).count();

        assert_eq!(ok, 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn migrate_is_idempotent() {
        let store = SqliteBookStore::in_memory().await.unwrap();

        let migrations: Vec<(String, Migration)> = book_migrations()
            .into_iter()
            .map(|m| ("books".to_string(), m))
            .collect();

        // in_memory() already applied these once.
        store.migrate(&migrations).await.unwrap();
        store.migrate(&migrations).await.unwrap();
    }

    #[tokio::test]
    async fn update_enforces_uniqueness_against_other_records_only() {
        let store = SqliteBookStore::in_memory().await.unwrap();

        let first = store
            .insert(fields("First", "978-1", 5.0, 1, "Fiction"))
            .await
            .unwrap();
        let second = store
            .insert(fields("Second", "978-2", 6.0, 2, "Fiction"))
            .await
            .unwrap();

        let err = store
            .update(second.id, fields("Second", "978-1", 6.0, 2, "Fiction"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateIsbn(_)));

        let kept = store
            .update(first.id, fields("First Edition", "978-1", 5.5, 1, "Fiction"))
            .await
            .unwrap();
        assert_eq!(kept.title, "First Edition");
        assert_eq!(kept.isbn, "978-1");
        assert_eq!(kept.created_at, first.created_at);
    }

    #[tokio::test]
    async fn update_missing_id_is_not_found() {
        let store = SqliteBookStore::in_memory().await.unwrap();

        let err = store
            .update(Uuid::now_v7(), fields("Ghost", "978-9", 1.0, 1, "Fiction"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_searches_and_filters() {
        let store = SqliteBookStore::in_memory().await.unwrap();

        store
            .insert(NewBook {
                title: "The Hobbit".into(),
                author: "J.R.R. Tolkien".into(),
                isbn: "978-0261103283".into(),
                price: 10.0,
                quantity: 3,
                category: "Fantasy".into(),
            })
            .await
            .unwrap();
        store
            .insert(fields("Emma", "978-1", 8.0, 6, "Fiction"))
            .await
            .unwrap();
        store
            .insert(fields("Underscore_Title", "978-2", 8.0, 6, "Fiction"))
            .await
            .unwrap();

        let by_author = store
            .list(&BookFilter {
                search: Some("TOLKIEN".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_author.len(), 1);
        assert_eq!(by_author[0].title, "The Hobbit");

        let by_category = store
            .list(&BookFilter {
                category: Some("Fiction".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_category.len(), 2);

        // LIKE metacharacters in the term match literally.
        let literal_underscore = store
            .list(&BookFilter {
                search: Some("underscore_".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(literal_underscore.len(), 1);

        let no_hits = store
            .list(&BookFilter {
                search: Some("%".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(no_hits.is_empty());
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = SqliteBookStore::in_memory().await.unwrap();

        store
            .insert(fields("First", "978-1", 5.0, 1, "Fiction"))
            .await
            .unwrap();
        let second = store
            .insert(fields("Second", "978-2", 6.0, 2, "Fiction"))
            .await
            .unwrap();

        let all = store.list(&BookFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);
    }

    #[tokio::test]
    async fn delete_and_aggregates() {
        let store = SqliteBookStore::in_memory().await.unwrap();

        assert!(store.max_price().await.unwrap().is_none());

        let a = store
            .insert(fields("A", "978-1", 5.0, 0, "Fiction"))
            .await
            .unwrap();
        store
            .insert(fields("B", "978-2", 20.0, 3, "Fiction"))
            .await
            .unwrap();
        store
            .insert(fields("C", "978-3", 1.0, 10, "History"))
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 3);
        assert_eq!(store.count_low_stock(5).await.unwrap(), 2);
        assert_eq!(store.max_price().await.unwrap().unwrap().price, 20.0);
        assert_eq!(
            store.distinct_categories().await.unwrap(),
            vec!["Fiction".to_string(), "History".to_string()]
        );

        let deleted = store.delete(a.id).await.unwrap();
        assert_eq!(deleted.id, a.id);
        assert_eq!(store.count().await.unwrap(), 2);

        let err = store.delete(a.id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert_eq!(store.count().await.unwrap(), 2);
    }
}
