//! Session-token implementation of the access gate.
//!
//! Login checks the configured credentials and issues an opaque uuid
//! token; verification checks membership and expiry. Expired sessions are
//! removed lazily when they are next presented.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{AccessGate, Identity, Verdict};

/// Errors surfaced by the session gate's login path.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,
}

/// A freshly issued session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedSession {
    pub token: String,
    pub username: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
struct Session {
    username: String,
    expires_at: OffsetDateTime,
}

/// Access gate backed by an in-process session map.
pub struct SessionGate {
    username: String,
    password: String,
    ttl: Duration,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionGate {
    pub fn new(username: impl Into<String>, password: impl Into<String>, ttl: Duration) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Exchange credentials for a session token.
    pub fn login(&self, username: &str, password: &str) -> Result<IssuedSession, AuthError> {
        if username != self.username || password != self.password {
            tracing::warn!(username, "rejected login attempt");
            return Err(AuthError::InvalidCredentials);
        }

        let token = Uuid::new_v4().to_string();
        let expires_at = OffsetDateTime::now_utc() + self.ttl;

        self.sessions.write().insert(
            token.clone(),
            Session {
                username: username.to_string(),
                expires_at,
            },
        );

        tracing::info!(username, "issued session token");

        Ok(IssuedSession {
            token,
            username: username.to_string(),
            expires_at,
        })
    }

    /// Invalidate a session token. Returns whether a live session was
    /// removed.
    pub fn revoke(&self, token: &str) -> bool {
        self.sessions.write().remove(token).is_some()
    }

    /// Number of live sessions (expired ones may still be counted until
    /// they are next presented).
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }
}

#[async_trait]
impl AccessGate for SessionGate {
    async fn verify(&self, credential: &str) -> Verdict {
        let mut sessions = self.sessions.write();

        match sessions.get(credential) {
            Some(session) if session.expires_at > OffsetDateTime::now_utc() => {
                Verdict::Allowed(Identity {
                    username: session.username.clone(),
                })
            }
            Some(_) => {
                sessions.remove(credential);
                Verdict::Denied
            }
            None => Verdict::Denied,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> SessionGate {
        SessionGate::new("admin", "secret", Duration::minutes(30))
    }

    #[test]
    fn login_rejects_bad_credentials() {
        let gate = gate();
        assert!(gate.login("admin", "wrong").is_err());
        assert!(gate.login("intruder", "secret").is_err());
        assert_eq!(gate.session_count(), 0);
    }

    #[tokio::test]
    async fn issued_token_verifies() {
        let gate = gate();
        let session = gate.login("admin", "secret").unwrap();

        let verdict = gate.verify(&session.token).await;
        assert_eq!(
            verdict,
            Verdict::Allowed(Identity {
                username: "admin".to_string()
            })
        );
    }

    #[tokio::test]
    async fn unknown_token_is_denied() {
        let gate = gate();
        assert_eq!(gate.verify("no-such-token").await, Verdict::Denied);
    }

    #[tokio::test]
    async fn expired_token_is_denied_and_removed() {
        let gate = SessionGate::new("admin", "secret", Duration::minutes(-1));
        let session = gate.login("admin", "secret").unwrap();
        assert_eq!(gate.session_count(), 1);

        assert_eq!(gate.verify(&session.token).await, Verdict::Denied);
        assert_eq!(gate.session_count(), 0);
    }

    #[tokio::test]
    async fn revoked_token_is_denied() {
        let gate = gate();
        let session = gate.login("admin", "secret").unwrap();

        assert!(gate.revoke(&session.token));
        assert!(!gate.revoke(&session.token));
        assert_eq!(gate.verify(&session.token).await, Verdict::Denied);
    }
}
