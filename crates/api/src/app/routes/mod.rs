use axum::Router;

use quill_core::PostId;

use crate::app::errors::ApiError;

pub mod comments;
pub mod hashtags;
pub mod posts;
pub mod system;

/// Router for every endpoint behind the auth middleware.
///
/// Reads are open to anonymous callers; mutating handlers extract a
/// [`crate::context::PrincipalContext`] and so require a token.
pub fn router() -> Router {
    Router::new()
        .nest("/posts", posts::router().merge(comments::router()))
        .nest("/hashtags", hashtags::router())
}

pub(crate) fn parse_post_id(raw: &str) -> Result<PostId, ApiError> {
    Ok(raw.parse::<PostId>()?)
}
