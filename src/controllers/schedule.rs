//! Working-hours, blocked-date and blocked-slot administration.
//!
//! These tables drive local slot generation: working hours define the
//! weekly open window per studio, blocked dates remove whole days globally,
//! blocked slots remove one recurring weekly start time for one studio.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::controllers::{api_error, is_unique_violation, ApiResult};
use crate::middleware::AdminUser;
use crate::models::{BlockedDate, BlockedSlot, WorkingHour};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/time", get(server_time))
        .route("/studios/{studio_id}/working-hours", get(list_working_hours))
        .route(
            "/admin/studios/{studio_id}/working-hours/initialize",
            post(initialize_schedule),
        )
        .route(
            "/admin/studios/{studio_id}/working-hours/{day}",
            put(upsert_working_hours),
        )
        .route(
            "/admin/blocked-dates",
            get(list_blocked_dates).post(create_blocked_date),
        )
        .route("/admin/blocked-dates/{id}", delete(delete_blocked_date))
        .route(
            "/admin/studios/{studio_id}/blocked-slots",
            get(list_blocked_slots).post(create_blocked_slot),
        )
        .route("/admin/blocked-slots/{id}", delete(delete_blocked_slot))
}

/// The SPA asks the server for the current time instead of trusting the
/// browser clock; clients fall back to their local clock if this fails.
async fn server_time() -> impl IntoResponse {
    Json(json!({ "now": Utc::now() }))
}

/* ---------- working hours ---------- */

async fn list_working_hours(
    State(state): State<Arc<AppState>>,
    Path(studio_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let hours: Vec<WorkingHour> = sqlx::query_as(
        "SELECT id, studio_id, day_of_week, start_time, end_time, is_closed
         FROM studio_working_hours
         WHERE studio_id = $1
         ORDER BY day_of_week",
    )
    .bind(studio_id)
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("list_working_hours sql error: {:?}", e);
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Could not load working hours",
        )
    })?;

    Ok((StatusCode::OK, Json(hours)))
}

#[derive(Debug, Deserialize)]
struct WorkingHoursBody {
    start_time: NaiveTime,
    end_time: NaiveTime,
    is_closed: bool,
}

async fn upsert_working_hours(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path((studio_id, day)): Path<(Uuid, i16)>,
    Json(body): Json<WorkingHoursBody>,
) -> ApiResult<impl IntoResponse> {
    if !(0..=6).contains(&day) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "day_of_week must be between 0 (Sunday) and 6 (Saturday)",
        ));
    }
    if !body.is_closed && body.start_time >= body.end_time {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "start_time must be before end_time on an open day",
        ));
    }

    let row: WorkingHour = sqlx::query_as(
        "INSERT INTO studio_working_hours (studio_id, day_of_week, start_time, end_time, is_closed)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (studio_id, day_of_week)
         DO UPDATE SET start_time = $3, end_time = $4, is_closed = $5
         RETURNING id, studio_id, day_of_week, start_time, end_time, is_closed",
    )
    .bind(studio_id)
    .bind(day)
    .bind(body.start_time)
    .bind(body.end_time)
    .bind(body.is_closed)
    .fetch_one(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("upsert_working_hours sql error: {:?}", e);
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Could not save working hours",
        )
    })?;

    Ok((StatusCode::OK, Json(row)))
}

/// Bulk-inserts the default weekly schedule: Monday through Friday open
/// 09:00–18:00, weekend rows pre-marked closed. Existing rows are kept.
async fn initialize_schedule(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(studio_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let open = NaiveTime::from_hms_opt(9, 0, 0).expect("valid time");
    let close = NaiveTime::from_hms_opt(18, 0, 0).expect("valid time");

    let mut inserted = 0u64;
    for day in 0i16..=6 {
        let is_weekend = day == 0 || day == 6;
        let result = sqlx::query(
            "INSERT INTO studio_working_hours (studio_id, day_of_week, start_time, end_time, is_closed)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (studio_id, day_of_week) DO NOTHING",
        )
        .bind(studio_id)
        .bind(day)
        .bind(open)
        .bind(close)
        .bind(is_weekend)
        .execute(&state.db.pool)
        .await
        .map_err(|e| {
            tracing::error!("initialize_schedule sql error: {:?}", e);
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Could not initialize the schedule",
            )
        })?;
        inserted += result.rows_affected();
    }

    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "created": inserted })),
    ))
}

/* ---------- blocked dates (global) ---------- */

async fn list_blocked_dates(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> ApiResult<impl IntoResponse> {
    let dates: Vec<BlockedDate> = sqlx::query_as(
        "SELECT id, blocked_date, reason FROM blocked_dates ORDER BY blocked_date",
    )
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("list_blocked_dates sql error: {:?}", e);
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Could not load blocked dates",
        )
    })?;

    Ok((StatusCode::OK, Json(dates)))
}

#[derive(Debug, Deserialize)]
struct BlockedDateBody {
    blocked_date: NaiveDate,
    reason: Option<String>,
}

async fn create_blocked_date(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(body): Json<BlockedDateBody>,
) -> ApiResult<impl IntoResponse> {
    let row: BlockedDate = sqlx::query_as(
        "INSERT INTO blocked_dates (blocked_date, reason)
         VALUES ($1, $2)
         RETURNING id, blocked_date, reason",
    )
    .bind(body.blocked_date)
    .bind(&body.reason)
    .fetch_one(&state.db.pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            return api_error(StatusCode::CONFLICT, "This date is already blocked");
        }
        tracing::error!("create_blocked_date sql error: {:?}", e);
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Could not block the date",
        )
    })?;

    Ok((StatusCode::CREATED, Json(row)))
}

async fn delete_blocked_date(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let deleted = sqlx::query("DELETE FROM blocked_dates WHERE id = $1")
        .bind(id)
        .execute(&state.db.pool)
        .await
        .map_err(|e| {
            tracing::error!("delete_blocked_date sql error: {:?}", e);
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Could not remove the blocked date",
            )
        })?
        .rows_affected();

    if deleted == 0 {
        return Err(api_error(StatusCode::NOT_FOUND, "Blocked date not found"));
    }
    Ok((StatusCode::OK, Json(json!({ "success": true }))))
}

/* ---------- blocked slots (per studio, weekly recurring) ---------- */

async fn list_blocked_slots(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(studio_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let slots: Vec<BlockedSlot> = sqlx::query_as(
        "SELECT id, studio_id, day_of_week, slot_time, reason
         FROM blocked_slots
         WHERE studio_id = $1
         ORDER BY day_of_week, slot_time",
    )
    .bind(studio_id)
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("list_blocked_slots sql error: {:?}", e);
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Could not load blocked slots",
        )
    })?;

    Ok((StatusCode::OK, Json(slots)))
}

#[derive(Debug, Deserialize)]
struct BlockedSlotBody {
    day_of_week: i16,
    slot_time: NaiveTime,
    reason: Option<String>,
}

async fn create_blocked_slot(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(studio_id): Path<Uuid>,
    Json(body): Json<BlockedSlotBody>,
) -> ApiResult<impl IntoResponse> {
    if !(0..=6).contains(&body.day_of_week) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "day_of_week must be between 0 (Sunday) and 6 (Saturday)",
        ));
    }

    let row: BlockedSlot = sqlx::query_as(
        "INSERT INTO blocked_slots (studio_id, day_of_week, slot_time, reason)
         VALUES ($1, $2, $3, $4)
         RETURNING id, studio_id, day_of_week, slot_time, reason",
    )
    .bind(studio_id)
    .bind(body.day_of_week)
    .bind(body.slot_time)
    .bind(&body.reason)
    .fetch_one(&state.db.pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            return api_error(StatusCode::CONFLICT, "This slot is already blocked");
        }
        tracing::error!("create_blocked_slot sql error: {:?}", e);
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Could not block the slot",
        )
    })?;

    Ok((StatusCode::CREATED, Json(row)))
}

async fn delete_blocked_slot(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let deleted = sqlx::query("DELETE FROM blocked_slots WHERE id = $1")
        .bind(id)
        .execute(&state.db.pool)
        .await
        .map_err(|e| {
            tracing::error!("delete_blocked_slot sql error: {:?}", e);
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Could not remove the blocked slot",
            )
        })?
        .rows_affected();

    if deleted == 0 {
        return Err(api_error(StatusCode::NOT_FOUND, "Blocked slot not found"));
    }
    Ok((StatusCode::OK, Json(json!({ "success": true }))))
}
