use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use quill_core::UserId;

use crate::app::errors::ApiError;

/// Authenticated caller, inserted by the auth middleware when a valid token
/// is presented.
///
/// Used as an extractor it makes the route require authentication: anonymous
/// requests are rejected with 401.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    user_id: UserId,
}

impl PrincipalContext {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for PrincipalContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<PrincipalContext>()
            .copied()
            .ok_or(ApiError::AuthenticationRequired)
    }
}
