use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::controllers::{api_error, is_unique_violation, ApiResult};
use crate::middleware::AdminUser;
use crate::models::Post;
use crate::validation::validate_slug;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/posts", get(list_published))
        .route("/posts/{slug}", get(get_by_slug))
        .route("/admin/posts", get(list_all).post(create_post))
        .route("/admin/posts/{id}", put(update_post).delete(delete_post))
}

const POST_COLUMNS: &str =
    "id, title, slug, content, excerpt, published, image_url, created_at, updated_at";

/* ---------- public ---------- */

async fn list_published(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let posts: Vec<Post> = sqlx::query_as(&format!(
        "SELECT {POST_COLUMNS} FROM posts WHERE published = true ORDER BY created_at DESC"
    ))
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("list_published sql error: {:?}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "Could not load posts")
    })?;

    Ok((StatusCode::OK, Json(posts)))
}

async fn get_by_slug(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let post: Option<Post> = sqlx::query_as(&format!(
        "SELECT {POST_COLUMNS} FROM posts WHERE slug = $1 AND published = true"
    ))
    .bind(&slug)
    .fetch_optional(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("get_by_slug sql error: {:?}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "Could not load post")
    })?;

    match post {
        Some(post) => Ok((StatusCode::OK, Json(post))),
        None => Err(api_error(StatusCode::NOT_FOUND, "Post not found")),
    }
}

/* ---------- admin ---------- */

#[derive(Debug, Deserialize, Validate)]
struct PostBody {
    #[validate(length(min = 1, message = "title is required"))]
    title: String,
    #[validate(custom(function = "validate_slug", message = "slug must be URL-safe"))]
    slug: String,
    #[validate(length(min = 1, message = "content is required"))]
    content: String,
    excerpt: Option<String>,
    #[serde(default)]
    published: bool,
    image_url: Option<String>,
}

async fn list_all(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> ApiResult<impl IntoResponse> {
    let posts: Vec<Post> = sqlx::query_as(&format!(
        "SELECT {POST_COLUMNS} FROM posts ORDER BY created_at DESC"
    ))
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("list_all posts sql error: {:?}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "Could not load posts")
    })?;

    Ok((StatusCode::OK, Json(posts)))
}

async fn create_post(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(body): Json<PostBody>,
) -> ApiResult<impl IntoResponse> {
    if let Err(errors) = body.validate() {
        return Err(api_error(StatusCode::BAD_REQUEST, &errors.to_string()));
    }

    let post: Post = sqlx::query_as(&format!(
        "INSERT INTO posts (title, slug, content, excerpt, published, image_url)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {POST_COLUMNS}"
    ))
    .bind(&body.title)
    .bind(&body.slug)
    .bind(&body.content)
    .bind(&body.excerpt)
    .bind(body.published)
    .bind(&body.image_url)
    .fetch_one(&state.db.pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            return api_error(StatusCode::CONFLICT, "A post with this slug already exists");
        }
        tracing::error!("create_post sql error: {:?}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "Could not save post")
    })?;

    Ok((StatusCode::CREATED, Json(post)))
}

async fn update_post(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<PostBody>,
) -> ApiResult<impl IntoResponse> {
    if let Err(errors) = body.validate() {
        return Err(api_error(StatusCode::BAD_REQUEST, &errors.to_string()));
    }

    let post: Option<Post> = sqlx::query_as(&format!(
        "UPDATE posts
         SET title = $1, slug = $2, content = $3, excerpt = $4,
             published = $5, image_url = $6, updated_at = NOW()
         WHERE id = $7
         RETURNING {POST_COLUMNS}"
    ))
    .bind(&body.title)
    .bind(&body.slug)
    .bind(&body.content)
    .bind(&body.excerpt)
    .bind(body.published)
    .bind(&body.image_url)
    .bind(id)
    .fetch_optional(&state.db.pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            return api_error(StatusCode::CONFLICT, "A post with this slug already exists");
        }
        tracing::error!("update_post sql error: {:?}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "Could not save post")
    })?;

    match post {
        Some(post) => Ok((StatusCode::OK, Json(post))),
        None => Err(api_error(StatusCode::NOT_FOUND, "Post not found")),
    }
}

async fn delete_post(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let deleted = sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(id)
        .execute(&state.db.pool)
        .await
        .map_err(|e| {
            tracing::error!("delete_post sql error: {:?}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Could not delete post")
        })?
        .rows_affected();

    if deleted == 0 {
        return Err(api_error(StatusCode::NOT_FOUND, "Post not found"));
    }
    Ok((StatusCode::OK, Json(json!({ "success": true }))))
}
