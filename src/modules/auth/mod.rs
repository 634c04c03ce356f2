use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use shelfstack_auth::{bearer_token, SessionGate};
use shelfstack_http::error::AppError;
use shelfstack_kernel::{InitCtx, Module};
use time::OffsetDateTime;

/// Auth module: exchanges configured credentials for session tokens.
pub struct AuthModule {
    gate: Arc<SessionGate>,
}

impl AuthModule {
    pub fn new(gate: Arc<SessionGate>) -> Self {
        Self { gate }
    }
}

#[async_trait]
impl Module for AuthModule {
    fn name(&self) -> &'static str {
        "auth"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "auth module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/login", post(login))
            .route("/logout", post(logout))
            .with_state(self.gate.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/login": {
                    "post": {
                        "summary": "Log in",
                        "tags": ["Auth"],
                        "requestBody": {
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/LoginRequest" }
                                }
                            }
                        },
                        "responses": {
                            "200": {
                                "description": "Session token",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/LoginResponse" }
                                    }
                                }
                            },
                            "401": {
                                "description": "Invalid username or password",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                                    }
                                }
                            }
                        }
                    }
                },
                "/logout": {
                    "post": {
                        "summary": "Log out",
                        "tags": ["Auth"],
                        "responses": {
                            "200": {
                                "description": "Whether a live session was revoked",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "object",
                                            "properties": {
                                                "revoked": { "type": "boolean" }
                                            },
                                            "required": ["revoked"]
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "LoginRequest": {
                        "type": "object",
                        "properties": {
                            "username": { "type": "string" },
                            "password": { "type": "string" }
                        },
                        "required": ["username", "password"]
                    },
                    "LoginResponse": {
                        "type": "object",
                        "properties": {
                            "token": { "type": "string" },
                            "username": { "type": "string" },
                            "expiresAt": { "type": "string", "format": "date-time" }
                        },
                        "required": ["token", "username", "expiresAt"]
                    }
                }
            }
        }))
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "auth module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "auth module stopped");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    token: String,
    username: String,
    #[serde(with = "time::serde::rfc3339")]
    expires_at: OffsetDateTime,
}

async fn login(
    State(gate): State<Arc<SessionGate>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let session = gate
        .login(&body.username, &body.password)
        .map_err(|e| AppError::unauthorized(e.to_string()))?;

    Ok(Json(LoginResponse {
        token: session.token,
        username: session.username,
        expires_at: session.expires_at,
    }))
}

async fn logout(State(gate): State<Arc<SessionGate>>, headers: HeaderMap) -> Json<serde_json::Value> {
    let revoked = bearer_token(&headers)
        .map(|token| gate.revoke(token))
        .unwrap_or(false);

    Json(json!({ "revoked": revoked }))
}

/// Create a new instance of the auth module.
pub fn create_module(gate: Arc<SessionGate>) -> Arc<dyn Module> {
    Arc::new(AuthModule::new(gate))
}
