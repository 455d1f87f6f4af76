//! Public booking flow: service catalog, slot availability, and the
//! wizard's confirm-step submission.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::booking::availability::{day_slots, BookedSlot, TimeRange};
use crate::booking::wizard::{self, BookingDraft};
use crate::controllers::{api_error, is_exclusion_violation, ApiResult};
use crate::models::{AppointmentStatus, WorkingHour};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/services", get(list_services))
        .route("/availability", post(search_availability))
        .route("/bookings", post(create_booking))
}

/* ---------- service catalog ---------- */

async fn list_services(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let catalog = state.square.list_services().await.map_err(|e| {
        tracing::error!("service catalog fetch failed: {:?}", e);
        api_error(
            StatusCode::BAD_GATEWAY,
            "The scheduling service is unavailable. Please try again later.",
        )
    })?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "services": catalog.services,
            "team_member_id": catalog.team_member_id,
        })),
    ))
}

/* ---------- availability ---------- */

#[derive(Debug, Deserialize)]
struct AvailabilityRequest {
    studio_id: Uuid,
    date: NaiveDate,
    duration_hours: u32,
    service_variation_id: Option<String>,
}

/// Asks the scheduling service for bookable start times; if that call
/// fails, falls back to slots computed from the local schedule tables so
/// the wizard always has something to offer.
async fn search_availability(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AvailabilityRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.duration_hours == 0 {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "duration_hours must be greater than zero",
        ));
    }

    let day_start = Utc.from_utc_datetime(&req.date.and_hms_opt(0, 0, 0).expect("valid time"));
    let day_end = day_start + Duration::days(1);
    let service_id = req
        .service_variation_id
        .clone()
        .unwrap_or_else(|| state.square.service_variation_id.clone());

    match state
        .square
        .search_availability(day_start, day_end, &service_id)
        .await
    {
        Ok(availabilities) => Ok((
            StatusCode::OK,
            Json(json!({
                "success": true,
                "availabilities": availabilities,
                "source": "square",
            })),
        )),
        Err(e) => {
            tracing::warn!("availability search failed, using local schedule: {:?}", e);
            let slots = local_slots(&state, req.studio_id, req.date, req.duration_hours).await?;
            let availabilities: Vec<serde_json::Value> = slots
                .into_iter()
                .map(|t| json!({ "start_at": Utc.from_utc_datetime(&req.date.and_time(t)) }))
                .collect();
            Ok((
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "availabilities": availabilities,
                    "source": "local",
                })),
            ))
        }
    }
}

/// Slot list from the schedule tables: working window for the weekday,
/// minus blocked dates, blocked slots and existing non-cancelled bookings.
async fn local_slots(
    state: &Arc<AppState>,
    studio_id: Uuid,
    date: NaiveDate,
    duration_hours: u32,
) -> ApiResult<Vec<NaiveTime>> {
    let internal = |e: sqlx::Error| {
        tracing::error!("local availability sql error: {:?}", e);
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Could not compute availability",
        )
    };

    let day_of_week = date.weekday().num_days_from_sunday() as i16;

    let date_blocked: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM blocked_dates WHERE blocked_date = $1)",
    )
    .bind(date)
    .fetch_one(&state.db.pool)
    .await
    .map_err(internal)?;

    let hours: Option<WorkingHour> = sqlx::query_as(
        "SELECT id, studio_id, day_of_week, start_time, end_time, is_closed
         FROM studio_working_hours
         WHERE studio_id = $1 AND day_of_week = $2",
    )
    .bind(studio_id)
    .bind(day_of_week)
    .fetch_optional(&state.db.pool)
    .await
    .map_err(internal)?;

    // No schedule configured yet: offer the default 09:00-18:00 window.
    let hours = hours.unwrap_or(WorkingHour {
        id: Uuid::nil(),
        studio_id,
        day_of_week,
        start_time: NaiveTime::from_hms_opt(9, 0, 0).expect("valid time"),
        end_time: NaiveTime::from_hms_opt(18, 0, 0).expect("valid time"),
        is_closed: false,
    });

    let blocked_slots: Vec<NaiveTime> = sqlx::query_scalar(
        "SELECT slot_time FROM blocked_slots WHERE studio_id = $1 AND day_of_week = $2",
    )
    .bind(studio_id)
    .bind(day_of_week)
    .fetch_all(&state.db.pool)
    .await
    .map_err(internal)?;

    // All of the day's appointments; the `blocks` rule decides which ones
    // actually shadow a slot for this studio.
    let booked: Vec<(Uuid, AppointmentStatus, NaiveDate, NaiveTime, i32)> = sqlx::query_as(
        "SELECT studio_id, status, booking_date, start_time, duration_hours
         FROM appointments
         WHERE booking_date = $1",
    )
    .bind(date)
    .fetch_all(&state.db.pool)
    .await
    .map_err(internal)?;

    let booked: Vec<BookedSlot> = booked
        .into_iter()
        .map(|(sid, status, d, t, h)| BookedSlot {
            studio_id: sid,
            status,
            range: TimeRange::from_slot(d, t, h as u32),
        })
        .collect();

    Ok(day_slots(
        &hours,
        date,
        duration_hours,
        &blocked_slots,
        &booked,
        date_blocked,
    ))
}

/* ---------- booking submission ---------- */

/// Confirm-step protocol: (1) create the external scheduling booking,
/// (2) insert the local appointment referencing it, (3) best-effort
/// confirmation email. Failure of (1) or (2) aborts with a surfaced
/// error; (3) never fails the booking.
async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<BookingDraft>,
) -> ApiResult<impl IntoResponse> {
    let booked = wizard::replay(&draft)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, &e.to_string()))?;

    let studio_id: Uuid = sqlx::query_scalar("SELECT id FROM studios WHERE slug = $1")
        .bind(booked.room.slug())
        .fetch_optional(&state.db.pool)
        .await
        .map_err(|e| {
            tracing::error!("studio lookup sql error: {:?}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Could not load studio")
        })?
        .ok_or_else(|| {
            tracing::error!("studio row missing for slug {}", booked.room.slug());
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Studio is not configured")
        })?;

    let start_at = Utc.from_utc_datetime(&booked.date.and_time(booked.time));
    let end_at = start_at + Duration::hours(booked.duration_hours as i64);

    ensure_slot_free(&state, studio_id, start_at, end_at).await?;

    let square_booking_id = state
        .square
        .create_booking(
            &booked.customer_name,
            &booked.customer_email,
            start_at,
            booked.duration_hours as i64 * 60,
        )
        .await
        .map_err(|e| {
            tracing::error!("external booking creation failed: {:?}", e);
            api_error(
                StatusCode::BAD_GATEWAY,
                "Could not reach the scheduling service. Please try again later.",
            )
        })?;

    let appointment_id: Uuid = sqlx::query_scalar(
        "INSERT INTO appointments
            (studio_id, booking_date, start_time, duration_hours, booking_range,
             status, total_price, plan, theme, addons,
             customer_name, customer_email, customer_phone, square_booking_id)
         VALUES ($1, $2, $3, $4, tstzrange($5, $6, '[)'),
                 'confirmed', $7, $8, $9, $10, $11, $12, $13, $14)
         RETURNING id",
    )
    .bind(studio_id)
    .bind(booked.date)
    .bind(booked.time)
    .bind(booked.duration_hours as i32)
    .bind(start_at)
    .bind(end_at)
    .bind(booked.estimate_total)
    .bind(booked.plan.as_str())
    .bind(&booked.theme)
    .bind(json!(booked.addons))
    .bind(&booked.customer_name)
    .bind(&booked.customer_email)
    .bind(&booked.customer_phone)
    .bind(&square_booking_id)
    .fetch_one(&state.db.pool)
    .await
    .map_err(|e| {
        if is_exclusion_violation(&e) {
            return api_error(
                StatusCode::CONFLICT,
                "This slot is no longer available. Please pick another time.",
            );
        }
        tracing::error!("appointment insert sql error: {:?}", e);
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Could not save the booking",
        )
    })?;

    // Best effort; the booking stands even if the email fails.
    if let Err(e) = state
        .mailer
        .send_template(
            "booking_confirmation",
            &booked.customer_email,
            &[
                ("name", booked.customer_name.as_str()),
                ("date", &booked.date.to_string()),
                ("time", &booked.time.format("%H:%M").to_string()),
                ("total", &booked.estimate_total.to_string()),
            ],
            Some(appointment_id),
        )
        .await
    {
        tracing::warn!("booking confirmation email failed: {:?}", e);
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "appointment_id": appointment_id,
            "square_booking_id": square_booking_id,
            "total": booked.estimate_total,
        })),
    ))
}

/// Friendly pre-check against the booking_range column. The gist exclusion
/// constraint remains the authoritative guard; this only exists to refuse
/// clearly-taken slots before spending an external API call.
pub(crate) async fn ensure_slot_free(
    state: &Arc<AppState>,
    studio_id: Uuid,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
) -> ApiResult<()> {
    let taken: bool = sqlx::query_scalar(
        "SELECT EXISTS(
           SELECT 1 FROM appointments
           WHERE studio_id = $1
             AND status <> 'cancelled'
             AND booking_range && tstzrange($2, $3, '[)')
         )",
    )
    .bind(studio_id)
    .bind(start_at)
    .bind(end_at)
    .fetch_one(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("overlap pre-check sql error: {:?}", e);
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Could not verify availability",
        )
    })?;

    if taken {
        return Err(api_error(
            StatusCode::CONFLICT,
            "This slot is no longer available. Please pick another time.",
        ));
    }
    Ok(())
}
