use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use sha2::{Digest, Sha256};

use crate::error::ApiError;
use crate::AppState;

/// The caller identity as established by the token verifier. Handlers read
/// this from request extensions; `subject` is the user id everywhere else.
#[derive(Clone, Debug)]
pub struct Identity {
    pub subject: String,
}

/// Collaborator seam for the external identity provider: maps a bearer token
/// to a subject. The service itself never parses token contents.
#[async_trait]
pub trait TokenVerifier: Send + Sync + 'static {
    async fn verify(&self, token: &str) -> Option<Identity>;
}

/// Verifier over a fixed token set (from `ISSUES_API_TOKENS`). Tokens are
/// held as SHA-256 digests and compared in constant time.
pub struct StaticTokenVerifier {
    entries: Vec<(String, String)>,
}

impl StaticTokenVerifier {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        let entries = pairs
            .into_iter()
            .map(|(token, subject)| (hash_token(&token), subject))
            .collect();
        Self { entries }
    }
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Option<Identity> {
        let digest = hash_token(token);
        self.entries
            .iter()
            .find(|(hash, _)| ct_equal(hash, &digest))
            .map(|(_, subject)| Identity { subject: subject.clone() })
    }
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn extract_bearer(req: &Request) -> Option<String> {
    let header = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let parts: Vec<&str> = header.split_whitespace().collect();
    if parts.len() == 2 && parts[0].eq_ignore_ascii_case("Bearer") {
        Some(parts[1].trim().to_string())
    } else {
        None
    }
}

// Constant-time equality
fn ct_equal(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Operational endpoints stay reachable without a token.
fn is_exempt(path: &str) -> bool {
    matches!(path, "/health" | "/readyz" | "/metrics" | "/openapi.json" | "/swagger")
}

pub async fn auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let path = req.uri().path().to_string();
    if is_exempt(&path) {
        return Ok(next.run(req).await);
    }
    let Some(token) = extract_bearer(&req) else {
        tracing::debug!(%path, "auth_missing_bearer");
        return Err(ApiError::unauthorized("missing bearer token").into_response());
    };
    let Some(identity) = state.verifier.verify(&token).await else {
        tracing::debug!(%path, "auth_invalid_token");
        return Err(ApiError::unauthorized("invalid token").into_response());
    };
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}
