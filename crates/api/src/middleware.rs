use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use quill_auth::JwtValidator;

use crate::app::errors::ApiError;
use crate::context::PrincipalContext;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
}

/// Resolve the caller from the bearer token, if one is sent.
///
/// No `Authorization` header means an anonymous request; handlers that need a
/// caller extract [`PrincipalContext`] and reject it. A header that is present
/// but malformed, expired or badly signed is rejected here on every route.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(token) = extract_bearer(req.headers())? {
        let claims = state.jwt.validate(token, Utc::now()).map_err(|e| {
            tracing::debug!(error = %e, "rejected bearer token");
            ApiError::AuthenticationRequired
        })?;

        req.extensions_mut().insert(PrincipalContext::new(claims.sub));
    }

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<Option<&str>, ApiError> {
    let Some(header) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };

    let header = header
        .to_str()
        .map_err(|_| ApiError::AuthenticationRequired)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::AuthenticationRequired)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(ApiError::AuthenticationRequired);
    }

    Ok(Some(token))
}
