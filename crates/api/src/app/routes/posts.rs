use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Path, Query,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use quill_auth::Mutation;

use crate::app::dto::{
    self, CreatePostRequest, LikeState, PatchPostRequest, PostDetail, PostListItem,
    ReplacePostRequest,
};
use crate::app::errors::ApiError;
use crate::app::routes::parse_post_id;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_posts).post(create_post))
        .route(
            "/:id",
            get(retrieve_post)
                .put(replace_post)
                .patch(patch_post)
                .delete(destroy_post),
        )
        .route("/:id/like", post(toggle_like))
}

pub async fn list_posts(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::ListPostsQuery>, QueryRejection>,
) -> Result<Json<Vec<PostListItem>>, ApiError> {
    let Query(query) = query?;
    Ok(Json(services.list_posts(query.hashtag.as_deref()).await?))
}

pub async fn create_post(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    body: Result<Json<CreatePostRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PostDetail>), ApiError> {
    let Json(body) = body?;
    let detail = services.create_post(&principal, body.into()).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn retrieve_post(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Json<PostDetail>, ApiError> {
    let id = parse_post_id(&id)?;
    Ok(Json(services.retrieve_post(id).await?))
}

pub async fn replace_post(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Path(id): Path<String>,
    body: Result<Json<ReplacePostRequest>, JsonRejection>,
) -> Result<Json<PostDetail>, ApiError> {
    let id = parse_post_id(&id)?;
    let post = services.owned_post(&principal, id, Mutation::Update).await?;
    let Json(body) = body?;

    Ok(Json(services.update_post(&principal, post, body.into()).await?))
}

pub async fn patch_post(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Path(id): Path<String>,
    body: Result<Json<PatchPostRequest>, JsonRejection>,
) -> Result<Json<PostDetail>, ApiError> {
    let id = parse_post_id(&id)?;
    let post = services.owned_post(&principal, id, Mutation::Update).await?;
    let Json(body) = body?;

    Ok(Json(services.update_post(&principal, post, body.into()).await?))
}

pub async fn destroy_post(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_post_id(&id)?;
    services.destroy_post(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_like(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Path(id): Path<String>,
) -> Result<Json<LikeState>, ApiError> {
    let id = parse_post_id(&id)?;
    Ok(Json(services.toggle_like(&principal, id).await?))
}
