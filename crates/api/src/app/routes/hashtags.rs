use std::sync::Arc;

use axum::{extract::Extension, routing::get, Json, Router};

use crate::app::dto::HashTagView;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/", get(list_hashtags))
}

pub async fn list_hashtags(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Json<Vec<HashTagView>>, ApiError> {
    Ok(Json(services.list_hashtags().await?))
}
