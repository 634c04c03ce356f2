use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use shelfstack_auth::bearer_token;
use shelfstack_http::error::AppError;
use shelfstack_kernel::{InitCtx, Module};

use crate::modules::books::models::DashboardStats;
use crate::modules::books::service::InventoryService;

/// Dashboard module: aggregate statistics over the inventory.
pub struct DashboardModule {
    service: Arc<InventoryService>,
}

impl DashboardModule {
    pub fn new(service: Arc<InventoryService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Module for DashboardModule {
    fn name(&self) -> &'static str {
        "dashboard"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "dashboard module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/stats", get(stats))
            .with_state(self.service.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/stats": {
                    "get": {
                        "summary": "Dashboard statistics",
                        "tags": ["Dashboard"],
                        "responses": {
                            "200": {
                                "description": "Aggregates over the full inventory",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/DashboardStats" }
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
                    }
                }
            },
            "components": {
                "schemas": {
                    "DashboardStats": {
                        "type": "object",
                        "properties": {
                            "totalBooks": { "type": "integer", "minimum": 0 },
                            "lowStockBooks": { "type": "integer", "minimum": 0 },
                            "highestPrice": { "type": "number", "minimum": 0 },
                            "totalCategories": { "type": "integer", "minimum": 0 }
                        },
                        "required": ["totalBooks", "lowStockBooks", "highestPrice", "totalCategories"]
                    }
                }
            }
        }))
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "dashboard module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "dashboard module stopped");
        Ok(())
    }
}

async fn stats(
    State(service): State<Arc<InventoryService>>,
    headers: HeaderMap,
) -> Result<Json<DashboardStats>, AppError> {
    let stats = service.dashboard_stats(bearer_token(&headers)).await?;
    Ok(Json(stats))
}

/// Create a new instance of the dashboard module.
pub fn create_module(service: Arc<InventoryService>) -> Arc<dyn Module> {
    Arc::new(DashboardModule::new(service))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
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

    #[tokio::test]
    async fn stats_endpoint_reports_zeroes_for_an_empty_store() {
        let service = Arc::new(InventoryService::new(
            Arc::new(MemoryBookStore::new()),
            Arc::new(AllowAll),
        ));
        let router = DashboardModule::new(service).routes();

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/stats")
                    .header("authorization", "Bearer token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["totalBooks"], 0);
        assert_eq!(body["lowStockBooks"], 0);
        assert_eq!(body["highestPrice"], 0.0);
        assert_eq!(body["totalCategories"], 0);
    }
}
