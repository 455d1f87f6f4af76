use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, patch},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::controllers::{api_error, is_exclusion_violation, ApiResult};
use crate::middleware::AdminUser;
use crate::models::{Appointment, AppointmentStatus};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/appointments", get(list_appointments))
        .route("/admin/appointments/{id}/status", patch(update_status))
        .route("/admin/appointments/{id}", delete(delete_appointment))
}

const APPOINTMENT_COLUMNS: &str = "id, studio_id, booking_date, start_time, duration_hours, \
     status, total_price, plan, theme, addons, customer_name, customer_email, customer_phone, \
     square_booking_id, stripe_session_id, created_at";

#[derive(Debug, Deserialize)]
struct AppointmentsQuery {
    status: Option<AppointmentStatus>,
    date: Option<NaiveDate>,
}

async fn list_appointments(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(params): Query<AppointmentsQuery>,
) -> ApiResult<impl IntoResponse> {
    // Optional filters, composed the same way for every combination.
    let mut sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE true");
    let mut bind_idx = 1;
    if params.status.is_some() {
        sql.push_str(&format!(" AND status = ${bind_idx}"));
        bind_idx += 1;
    }
    if params.date.is_some() {
        sql.push_str(&format!(" AND booking_date = ${bind_idx}"));
    }
    sql.push_str(" ORDER BY booking_date DESC, start_time DESC");

    let mut query = sqlx::query_as::<_, Appointment>(&sql);
    if let Some(status) = params.status {
        query = query.bind(status);
    }
    if let Some(date) = params.date {
        query = query.bind(date);
    }

    let appointments = query.fetch_all(&state.db.pool).await.map_err(|e| {
        tracing::error!("list_appointments sql error: {:?}", e);
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Could not load appointments",
        )
    })?;

    Ok((StatusCode::OK, Json(appointments)))
}

#[derive(Debug, Deserialize)]
struct UpdateStatusRequest {
    status: AppointmentStatus,
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<impl IntoResponse> {
    let updated: Option<Appointment> = sqlx::query_as(&format!(
        "UPDATE appointments SET status = $1 WHERE id = $2 RETURNING {APPOINTMENT_COLUMNS}"
    ))
    .bind(req.status)
    .bind(id)
    .fetch_optional(&state.db.pool)
    .await
    .map_err(|e| {
        // Reviving a cancelled appointment can collide with a booking that
        // took the slot in the meantime.
        if is_exclusion_violation(&e) {
            return api_error(
                StatusCode::CONFLICT,
                "That time slot has since been booked by another appointment",
            );
        }
        tracing::error!("update_status sql error: {:?}", e);
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Could not update appointment",
        )
    })?;

    match updated {
        Some(appointment) => Ok((StatusCode::OK, Json(appointment))),
        None => Err(api_error(StatusCode::NOT_FOUND, "Appointment not found")),
    }
}

async fn delete_appointment(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let deleted = sqlx::query("DELETE FROM appointments WHERE id = $1")
        .bind(id)
        .execute(&state.db.pool)
        .await
        .map_err(|e| {
            tracing::error!("delete_appointment sql error: {:?}", e);
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Could not delete appointment",
            )
        })?
        .rows_affected();

    if deleted == 0 {
        return Err(api_error(StatusCode::NOT_FOUND, "Appointment not found"));
    }
    Ok((StatusCode::OK, Json(json!({ "success": true }))))
}
