//! Book entity and query types shared by every backend.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Books with a quantity below this are considered low stock.
pub const LOW_STOCK_THRESHOLD: i64 = 5;

/// A persisted book record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    /// Store-assigned identifier; immutable for the life of the record.
    pub id: Uuid,
    pub title: String,
    pub author: String,
    /// Unique identifying code, enforced unique across the store.
    pub isbn: String,
    pub price: f64,
    pub quantity: i64,
    pub category: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Book {
    /// Derived at read time, never stored.
    pub fn is_low_stock(&self) -> bool {
        self.quantity < LOW_STOCK_THRESHOLD
    }
}

/// The mutable fields of a book, validated upstream. Used for both insert
/// and whole-record update; partial patches are not supported.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub price: f64,
    pub quantity: i64,
    pub category: String,
}

/// Listing predicate: an optional case-insensitive substring match over
/// title/author/isbn, ANDed with an optional exact category match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookFilter {
    pub search: Option<String>,
    pub category: Option<String>,
}

impl BookFilter {
    pub fn is_empty(&self) -> bool {
        self.search.is_none() && self.category.is_none()
    }

    /// Evaluate the predicate against a single book.
    pub fn matches(&self, book: &Book) -> bool {
        if let Some(term) = &self.search {
            let term = term.to_lowercase();
            let hit = book.title.to_lowercase().contains(&term)
                || book.author.to_lowercase().contains(&term)
                || book.isbn.to_lowercase().contains(&term);
            if !hit {
                return false;
            }
        }

        if let Some(category) = &self.category {
            if book.category != *category {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(title: &str, author: &str, isbn: &str, category: &str) -> Book {
        let now = OffsetDateTime::now_utc();
        Book {
            id: Uuid::now_v7(),
            title: title.to_string(),
            author: author.to_string(),
            isbn: isbn.to_string(),
            price: 10.0,
            quantity: 3,
            category: category.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn low_stock_is_strictly_below_threshold() {
        let mut book = sample("a", "b", "c", "Fiction");
        book.quantity = LOW_STOCK_THRESHOLD;
        assert!(!book.is_low_stock());
        book.quantity = LOW_STOCK_THRESHOLD - 1;
        assert!(book.is_low_stock());
        book.quantity = 0;
        assert!(book.is_low_stock());
    }

    #[test]
    fn search_matches_any_field_case_insensitively() {
        let book = sample("The Hobbit", "J.R.R. Tolkien", "978-0261103283", "Fantasy");

        let by_author = BookFilter {
            search: Some("tolkien".into()),
            ..Default::default()
        };
        assert!(by_author.matches(&book));

        let by_title = BookFilter {
            search: Some("HOBBIT".into()),
            ..Default::default()
        };
        assert!(by_title.matches(&book));

        let by_isbn = BookFilter {
            search: Some("0261".into()),
            ..Default::default()
        };
        assert!(by_isbn.matches(&book));

        let miss = BookFilter {
            search: Some("austen".into()),
            ..Default::default()
        };
        assert!(!miss.matches(&book));
    }

    #[test]
    fn category_match_is_exact() {
        let book = sample("Emma", "Jane Austen", "978-1", "Fiction");

        let exact = BookFilter {
            category: Some("Fiction".into()),
            ..Default::default()
        };
        assert!(exact.matches(&book));

        let partial = BookFilter {
            category: Some("Fict".into()),
            ..Default::default()
        };
        assert!(!partial.matches(&book));

        let wrong_case = BookFilter {
            category: Some("fiction".into()),
            ..Default::default()
        };
        assert!(!wrong_case.matches(&book));
    }

    #[test]
    fn search_and_category_are_anded() {
        let book = sample("Emma", "Jane Austen", "978-1", "Fiction");

        let both = BookFilter {
            search: Some("austen".into()),
            category: Some("Fiction".into()),
        };
        assert!(both.matches(&book));

        let wrong_category = BookFilter {
            search: Some("austen".into()),
            category: Some("History".into()),
        };
        assert!(!wrong_category.matches(&book));
    }
}
