use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    routing::post,
    Json, Router,
};

use crate::app::dto::{CommentView, CreateCommentRequest};
use crate::app::errors::ApiError;
use crate::app::routes::parse_post_id;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

/// Mounted under `/posts`.
pub fn router() -> Router {
    Router::new().route("/:id/comments", post(create_comment))
}

pub async fn create_comment(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Path(id): Path<String>,
    body: Result<Json<CreateCommentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CommentView>), ApiError> {
    let post_id = parse_post_id(&id)?;
    let Json(body) = body?;

    let comment = services
        .create_comment(&principal, post_id, body.into())
        .await?;

    Ok((StatusCode::CREATED, Json(comment)))
}
