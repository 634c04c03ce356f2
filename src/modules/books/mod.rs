pub mod models;
pub mod service;

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use shelfstack_auth::bearer_token;
use shelfstack_http::error::AppError;
use shelfstack_kernel::{InitCtx, Migration, Module};
use uuid::Uuid;

use models::{BookPayload, BookResponse, ListQuery};
use service::InventoryService;

/// Books module: CRUD and search over the inventory.
pub struct BooksModule {
    service: Arc<InventoryService>,
}

impl BooksModule {
    pub fn new(service: Arc<InventoryService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", get(list_books).post(create_book))
            .route(
                "/{id}",
                get(get_book).put(update_book).delete(delete_book),
            )
            .with_state(self.service.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "List books",
                        "tags": ["Books"],
                        "parameters": [
                            {
                                "name": "search",
                                "in": "query",
                                "required": false,
                                "description": "Case-insensitive substring match over title, author, and isbn",
                                "schema": { "type": "string" }
                            },
                            {
                                "name": "category",
                                "in": "query",
                                "required": false,
                                "description": "Exact category match; 'all' disables the filter",
                                "schema": { "type": "string" }
                            }
                        ],
                        "responses": {
                            "200": {
                                "description": "Matching books, newest first",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "array",
                                            "items": { "$ref": "#/components/schemas/Book" }
                                        }
                                    }
                                }
                            },
                            "401": {
                                "description": "Missing or invalid credential",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                                    }
                                }
                            }
                        }
                    },
                    "post": {
                        "summary": "Add a book",
                        "tags": ["Books"],
                        "requestBody": {
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/BookInput" }
                                }
                            }
                        },
                        "responses": {
                            "201": {
                                "description": "Created book",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Book" }
                                    }
                                }
                            },
                            "409": {
                                "description": "A book with this isbn already exists",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                                    }
                                }
                            },
                            "422": {
                                "description": "Validation error",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                                    }
                                }
                            }
                        }
                    }
                },
                "/{id}": {
                    "get": {
                        "summary": "Get a book",
                        "tags": ["Books"],
                        "parameters": [
                            {
                                "name": "id",
                                "in": "path",
                                "required": true,
                                "schema": { "type": "string", "format": "uuid" }
                            }
                        ],
                        "responses": {
                            "200": {
                                "description": "The book",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Book" }
                                    }
                                }
                            },
                            "404": {
                                "description": "Book not found",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                                    }
                                }
                            }
                        }
                    },
                    "put": {
                        "summary": "Replace a book's fields",
                        "tags": ["Books"],
                        "parameters": [
                            {
                                "name": "id",
                                "in": "path",
                                "required": true,
                                "schema": { "type": "string", "format": "uuid" }
                            }
                        ],
                        "requestBody": {
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/BookInput" }
                                }
                            }
                        },
                        "responses": {
                            "200": {
                                "description": "Updated book",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Book" }
                                    }
                                }
                            },
                            "404": {
                                "description": "Book not found",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                                    }
                                }
                            },
                            "409": {
                                "description": "Another book holds this isbn",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                                    }
                                }
                            }
                        }
                    },
                    "delete": {
                        "summary": "Delete a book",
                        "tags": ["Books"],
                        "parameters": [
                            {
                                "name": "id",
                                "in": "path",
                                "required": true,
                                "schema": { "type": "string", "format": "uuid" }
                            }
                        ],
                        "responses": {
                            "200": {
                                "description": "Deleted book",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Book" }
                                    }
                                }
                            },
                            "404": {
                                "description": "Book not found",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Book": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string", "format": "uuid" },
                            "title": { "type": "string" },
                            "author": { "type": "string" },
                            "isbn": { "type": "string" },
                            "price": { "type": "number", "minimum": 0 },
                            "quantity": { "type": "integer", "minimum": 0 },
                            "category": { "type": "string" },
                            "isLowStock": { "type": "boolean" },
                            "createdAt": { "type": "string", "format": "date-time" },
                            "updatedAt": { "type": "string", "format": "date-time" }
                        },
                        "required": ["id", "title", "author", "isbn", "price", "quantity", "category", "isLowStock", "createdAt", "updatedAt"]
                    },
                    "BookInput": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string" },
                            "author": { "type": "string" },
                            "isbn": { "type": "string" },
                            "price": { "type": "number", "minimum": 0 },
                            "quantity": { "type": "integer", "minimum": 0 },
                            "category": { "type": "string" }
                        },
                        "required": ["title", "author", "isbn", "price", "quantity", "category"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        shelfstack_store::book_migrations()
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// An id that does not parse cannot resolve to a record.
fn parse_book_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::not_found("book not found"))
}

async fn list_books(
    State(service): State<Arc<InventoryService>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<BookResponse>>, AppError> {
    let books = service.list_books(bearer_token(&headers), query).await?;
    Ok(Json(books.into_iter().map(BookResponse::from).collect()))
}

async fn get_book(
    State(service): State<Arc<InventoryService>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<BookResponse>, AppError> {
    let id = parse_book_id(&id)?;
    let book = service.get_book(bearer_token(&headers), id).await?;
    Ok(Json(BookResponse::from(book)))
}

async fn create_book(
    State(service): State<Arc<InventoryService>>,
    headers: HeaderMap,
    Json(payload): Json<BookPayload>,
) -> Result<(StatusCode, Json<BookResponse>), AppError> {
    let book = service.create_book(bearer_token(&headers), payload).await?;
    Ok((StatusCode::CREATED, Json(BookResponse::from(book))))
}

async fn update_book(
    State(service): State<Arc<InventoryService>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<BookPayload>,
) -> Result<Json<BookResponse>, AppError> {
    let id = parse_book_id(&id)?;
    let book = service
        .update_book(bearer_token(&headers), id, payload)
        .await?;
    Ok(Json(BookResponse::from(book)))
}

async fn delete_book(
    State(service): State<Arc<InventoryService>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<BookResponse>, AppError> {
    let id = parse_book_id(&id)?;
    let book = service.delete_book(bearer_token(&headers), id).await?;
    Ok(Json(BookResponse::from(book)))
}

/// Create a new instance of the books module.
pub fn create_module(service: Arc<InventoryService>) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(service))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use shelfstack_auth::{AccessGate, Identity, Verdict};
    use shelfstack_store::MemoryBookStore;
    use tower::ServiceExt;

    struct AllowAll;

    #[async_trait]
    impl AccessGate for AllowAll {
        async fn verify(&self, _credential: &str) -> Verdict {
            Verdict::Allowed(Identity {
                username: "tester".to_string(),
            })
        }
    }

    fn router() -> Router {
        let service = Arc::new(InventoryService::new(
            Arc::new(MemoryBookStore::new()),
            Arc::new(AllowAll),
        ));
        BooksModule::new(service).routes()
    }

    #[tokio::test]
    async fn create_returns_201_with_derived_stock_flag() {
        let router = router();

        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .header("authorization", "Bearer token")
            .body(Body::from(
                json!({
                    "title": "Dune",
                    "author": "Frank Herbert",
                    "isbn": "978-0441172719",
                    "price": "12.99",
                    "quantity": 2,
                    "category": "Sci-Fi"
                })
                .to_string(),
            ))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["title"], "Dune");
        assert_eq!(body["price"], 12.99);
        assert_eq!(body["isLowStock"], true);
    }

    #[tokio::test]
    async fn requests_without_a_token_are_401() {
        let router = router();

        let response = router
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_id_is_404() {
        let router = router();

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/not-a-uuid")
                    .header("authorization", "Bearer token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
