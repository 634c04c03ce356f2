//! Access gate for shelfstack.
//!
//! The inventory service depends only on [`AccessGate`]: a credential goes
//! in, an allow/deny verdict comes out. [`SessionGate`] is the shipped
//! implementation — configured credentials exchanged for opaque session
//! tokens with a TTL. Tests substitute their own gates.

pub mod session;

use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, HeaderMap};

pub use session::{AuthError, IssuedSession, SessionGate};

/// Who the credential belongs to. Carried on an allow verdict; the rest of
/// the system does not depend on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
}

/// Outcome of verifying a credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allowed(Identity),
    Denied,
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allowed(_))
    }
}

/// Capability interface consulted once per request before any inventory
/// operation executes.
#[async_trait]
pub trait AccessGate: Send + Sync {
    async fn verify(&self, credential: &str) -> Verdict;
}

/// Extract the bearer credential from an `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_extracts_credential() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), Some("abc123"));
    }

    #[test]
    fn bearer_token_rejects_other_schemes_and_empty_tokens() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc123"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);

        headers.remove(AUTHORIZATION);
        assert_eq!(bearer_token(&headers), None);
    }
}
