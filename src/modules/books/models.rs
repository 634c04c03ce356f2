//! Wire models for the books module.

use serde::{Deserialize, Serialize};
use serde_json::json;
use shelfstack_store::{Book, NewBook};
use time::OffsetDateTime;
use uuid::Uuid;

/// A book as rendered to API clients. `isLowStock` is derived from the
/// quantity at read time; it is never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookResponse {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub price: f64,
    pub quantity: i64,
    pub category: String,
    pub is_low_stock: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        let is_low_stock = book.is_low_stock();
        Self {
            id: book.id,
            title: book.title,
            author: book.author,
            isbn: book.isbn,
            price: book.price,
            quantity: book.quantity,
            category: book.category,
            is_low_stock,
            created_at: book.created_at,
            updated_at: book.updated_at,
        }
    }
}

/// Query parameters accepted by the listing endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    pub category: Option<String>,
}

/// Aggregates computed over the full current inventory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_books: u64,
    pub low_stock_books: u64,
    pub highest_price: f64,
    pub total_categories: u64,
}

/// Incoming create/update body. Every field is optional at the serde
/// layer so presence checks produce the service's own validation details
/// instead of a deserializer error; numeric fields stay raw JSON values
/// so a number or numeric string coerces and anything else is rejected
/// rather than silently zeroed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookPayload {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub price: Option<serde_json::Value>,
    pub quantity: Option<serde_json::Value>,
    pub category: Option<String>,
}

impl BookPayload {
    /// Validate field presence and coerce numerics, collecting one detail
    /// per failing field.
    pub fn validate(self) -> Result<NewBook, Vec<serde_json::Value>> {
        let mut details = Vec::new();

        let title = required_text("title", self.title, &mut details);
        let author = required_text("author", self.author, &mut details);
        let isbn = required_text("isbn", self.isbn, &mut details);
        let category = required_text("category", self.category, &mut details);

        let price = match &self.price {
            None => {
                details.push(json!({"field": "price", "error": "required"}));
                None
            }
            Some(value) => match parse_decimal(value) {
                Some(price) if price.is_finite() && price >= 0.0 => Some(price),
                Some(_) => {
                    details.push(json!({
                        "field": "price",
                        "error": "must be a non-negative number"
                    }));
                    None
                }
                None => {
                    details.push(json!({"field": "price", "error": "must be a number"}));
                    None
                }
            },
        };

        // Zero is a valid quantity; only absence or a non-integer is an error.
        let quantity = match &self.quantity {
            None => {
                details.push(json!({"field": "quantity", "error": "required"}));
                None
            }
            Some(value) => match parse_integer(value) {
                Some(quantity) if quantity >= 0 => Some(quantity),
                Some(_) => {
                    details.push(json!({
                        "field": "quantity",
                        "error": "must be a non-negative integer"
                    }));
                    None
                }
                None => {
                    details.push(json!({"field": "quantity", "error": "must be an integer"}));
                    None
                }
            },
        };

        if let (Some(title), Some(author), Some(isbn), Some(price), Some(quantity), Some(category)) =
            (title, author, isbn, price, quantity, category)
        {
            Ok(NewBook {
                title,
                author,
                isbn,
                price,
                quantity,
                category,
            })
        } else {
            Err(details)
        }
    }
}

fn required_text(
    field: &'static str,
    value: Option<String>,
    details: &mut Vec<serde_json::Value>,
) -> Option<String> {
    let trimmed = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    if trimmed.is_none() {
        details.push(json!({"field": field, "error": "required"}));
    }
    trimmed
}

fn parse_decimal(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn parse_integer(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}
