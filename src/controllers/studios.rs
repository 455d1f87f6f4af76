use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use crate::controllers::{api_error, ApiResult};
use crate::models::Studio;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/studios", get(list_studios))
}

async fn list_studios(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let studios: Vec<Studio> = sqlx::query_as(
        "SELECT id, name, slug, description, audio_only FROM studios ORDER BY name",
    )
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("list_studios sql error: {:?}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "Could not load studios")
    })?;

    Ok((StatusCode::OK, Json(studios)))
}
