pub mod appointments;
pub mod bookings;
pub mod checkout;
pub mod contact;
pub mod posts;
pub mod schedule;
pub mod studios;

use axum::{http::StatusCode, Json, Router};
use serde::Serialize;
use std::sync::Arc;

/* ---------- shared response envelope ---------- */

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub success: bool,
    pub message: String,
}

pub type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

pub fn api_error(status: StatusCode, message: &str) -> (StatusCode, Json<ApiError>) {
    (
        status,
        Json(ApiError {
            success: false,
            message: message.to_string(),
        }),
    )
}

/// Postgres unique_violation, raised on duplicate keyed rows.
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|d| d.code())
        .is_some_and(|code| code == "23505")
}

/// Postgres exclusion_violation, raised when an appointment insert loses
/// the race against the booking_range exclusion constraint.
pub fn is_exclusion_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|d| d.code())
        .is_some_and(|code| code == "23P01")
}

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(studios::routes())
        .merge(posts::routes())
        .merge(appointments::routes())
        .merge(schedule::routes())
        .merge(bookings::routes())
        .merge(checkout::routes())
        .merge(contact::routes())
}
