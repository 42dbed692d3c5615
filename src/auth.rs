//! Bearer-token authentication for the HTTP front door.
//!
//! Enabled when at least one token is configured; covers `/execute`, `/tools`
//! and the MCP endpoint alike.

use crate::error::{DbError, DbResult};
use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::warn;

/// Accepted bearer tokens.
#[derive(Clone, Default)]
pub struct BearerAuth {
    tokens: Vec<Vec<u8>>,
}

impl std::fmt::Debug for BearerAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerAuth")
            .field("tokens", &self.tokens.len())
            .finish()
    }
}

impl BearerAuth {
    /// Build from configured tokens. Blank entries are a configuration error;
    /// duplicates are collapsed.
    pub fn from_tokens<I, S>(tokens: I) -> DbResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut accepted: Vec<Vec<u8>> = Vec::new();
        for token in tokens {
            let trimmed = token.as_ref().trim();
            if trimmed.is_empty() {
                return Err(DbError::invalid_argument("--auth-token must not be blank"));
            }
            let bytes = trimmed.as_bytes().to_vec();
            if !accepted.contains(&bytes) {
                accepted.push(bytes);
            }
        }
        Ok(Self { tokens: accepted })
    }

    pub fn is_enabled(&self) -> bool {
        !self.tokens.is_empty()
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Compare against every configured token without short-circuiting.
    pub fn verify(&self, provided: &str) -> bool {
        let provided = provided.as_bytes();
        self.tokens.iter().fold(false, |found, expected| {
            let matches = expected.len() == provided.len() && bool::from(expected.ct_eq(provided));
            found | matches
        })
    }
}

/// axum middleware rejecting requests without a valid bearer token.
pub async fn require_bearer(
    State(auth): State<Arc<BearerAuth>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match extract_bearer_token(&request) {
        Ok(token) if auth.verify(token) => next.run(request).await,
        Ok(token) => {
            warn!(token_prefix = %mask_token(token), "Authentication failed: invalid token");
            unauthorized("Invalid bearer token")
        }
        Err(reason) => {
            warn!(reason, "Authentication failed");
            unauthorized(reason)
        }
    }
}

fn extract_bearer_token(request: &Request<Body>) -> Result<&str, &'static str> {
    let value = request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or("Missing Authorization header")?
        .to_str()
        .map_err(|_| "Authorization header contains invalid characters")?;

    let token = value
        .strip_prefix("Bearer ")
        .ok_or("Expected 'Authorization: Bearer <token>'")?
        .trim();
    if token.is_empty() {
        return Err("Bearer token is empty");
    }
    Ok(token)
}

fn mask_token(token: &str) -> String {
    let prefix: String = token.chars().take(3).collect();
    format!("{}***", prefix)
}

fn unauthorized(detail: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Bearer")],
        Json(serde_json::json!({ "detail": detail })),
    )
        .into_response()
}
