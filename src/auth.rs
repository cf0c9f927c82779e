use std::{collections::HashSet, sync::Arc};

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http_objects::BlobgateAPIError;

/// Decides whether a bearer token grants access to the blob API.
pub trait TokenValidator: Send + Sync {
    fn is_valid(&self, token: &str) -> bool;
}

/// Accepts the tokens listed in the configuration.
pub struct StaticTokens {
    tokens: HashSet<String>,
}

impl StaticTokens {
    pub fn new<I, T>(tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }
}

impl TokenValidator for StaticTokens {
    fn is_valid(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Rejects requests without a valid `Authorization: Bearer` header before
/// they reach a handler.
pub async fn require_bearer(
    State(validator): State<Arc<dyn TokenValidator>>,
    request: Request,
    next: Next,
) -> Response {
    let verdict = match bearer_token(request.headers()) {
        None => Err("missing or malformed bearer token"),
        Some(token) if validator.is_valid(token) => Ok(()),
        Some(_) => Err("invalid bearer token"),
    };
    match verdict {
        Ok(()) => next.run(request).await,
        Err(message) => BlobgateAPIError::unauthorized(message).into_response(),
    }
}
