//! Paid checkout: hosted payment sessions and the webhook that confirms
//! them.
//!
//! The appointment is inserted as `pending` when the session is created
//! and flipped to `confirmed` only by a signature-verified
//! `checkout.session.completed` event. Pending rows that never complete
//! are swept by the cleanup service.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::booking::pricing;
use crate::booking::wizard::{self, BookingDraft};
use crate::controllers::bookings::ensure_slot_free;
use crate::controllers::{api_error, is_exclusion_violation, ApiResult};
use crate::services::cleanup::CHECKOUT_WINDOW_MINUTES;
use crate::services::stripe::CheckoutParams;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/checkout", post(create_checkout))
        .route("/webhooks/stripe", post(stripe_webhook))
}

#[derive(Debug, Deserialize)]
struct CheckoutRequest {
    booking_data: BookingDraft,
}

async fn create_checkout(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckoutRequest>,
) -> ApiResult<impl IntoResponse> {
    let booked = wizard::replay(&req.booking_data)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, &e.to_string()))?;

    // Checkout bills the discounted ladder price, not the wizard estimate.
    let total = pricing::charged_total(
        booked.plan,
        booked.room,
        booked.duration_hours,
        &booked.addons,
    )
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

    let product_name = format!(
        "{} session, {}h on {}",
        booked.plan.as_str(),
        booked.duration_hours,
        booked.date
    );
    // The session dies when the pending-appointment sweep would release
    // the slot, so a late payment cannot buy a freed slot.
    let expires_at = Utc::now() + Duration::minutes(CHECKOUT_WINDOW_MINUTES as i64);

    let session = state
        .stripe
        .create_checkout_session(CheckoutParams {
            amount_cents: total * 100,
            product_name,
            customer_email: booked.customer_email.clone(),
            expires_at_unix: expires_at.timestamp(),
            metadata: vec![
                ("plan".into(), booked.plan.as_str().into()),
                ("studio".into(), booked.room.slug().into()),
                ("date".into(), booked.date.to_string()),
                ("time".into(), booked.time.format("%H:%M").to_string()),
                (
                    "duration_hours".into(),
                    booked.duration_hours.to_string(),
                ),
            ],
        })
        .await
        .map_err(|e| {
            tracing::error!("checkout session creation failed: {:?}", e);
            api_error(
                StatusCode::BAD_GATEWAY,
                "Could not start checkout. Please try again later.",
            )
        })?;

    sqlx::query(
        "INSERT INTO appointments
            (studio_id, booking_date, start_time, duration_hours, booking_range,
             status, total_price, plan, theme, addons,
             customer_name, customer_email, customer_phone, stripe_session_id)
         VALUES ($1, $2, $3, $4, tstzrange($5, $6, '[)'),
                 'pending', $7, $8, $9, $10, $11, $12, $13, $14)",
    )
    .bind(studio_id)
    .bind(booked.date)
    .bind(booked.time)
    .bind(booked.duration_hours as i32)
    .bind(start_at)
    .bind(end_at)
    .bind(total)
    .bind(booked.plan.as_str())
    .bind(&booked.theme)
    .bind(json!(booked.addons))
    .bind(&booked.customer_name)
    .bind(&booked.customer_email)
    .bind(&booked.customer_phone)
    .bind(&session.id)
    .execute(&state.db.pool)
    .await
    .map_err(|e| {
        if is_exclusion_violation(&e) {
            return api_error(
                StatusCode::CONFLICT,
                "This slot is no longer available. Please pick another time.",
            );
        }
        tracing::error!("pending appointment insert sql error: {:?}", e);
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Could not reserve the slot",
        )
    })?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "id": session.id,
            "url": session.url,
            "total": total,
        })),
    ))
}

/// Completion webhook. Signature failures are 400s so the sender retries
/// nothing; everything else is acknowledged with 200 to stop redelivery.
async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Missing Stripe-Signature header"))?;

    let event = state
        .stripe
        .verify_webhook(&body, signature, Utc::now().timestamp())
        .map_err(|e| {
            tracing::warn!("webhook rejected: {:?}", e);
            api_error(StatusCode::BAD_REQUEST, "Invalid webhook signature")
        })?;

    if event.event_type == "checkout.session.completed" {
        match event.data.object.get("id").and_then(|v| v.as_str()) {
            Some(session_id) => confirm_paid_appointment(&state, session_id).await?,
            None => tracing::warn!("completed session event without a session id"),
        }
    } else {
        tracing::debug!("ignoring webhook event type {}", event.event_type);
    }

    Ok((StatusCode::OK, Json(json!({ "received": true }))))
}

async fn confirm_paid_appointment(state: &Arc<AppState>, session_id: &str) -> ApiResult<()> {
    let confirmed: Option<(Uuid, String, String, NaiveDate, NaiveTime, i64)> = sqlx::query_as(
        "UPDATE appointments
         SET status = 'confirmed'
         WHERE stripe_session_id = $1 AND status = 'pending'
         RETURNING id, customer_name, customer_email, booking_date, start_time, total_price",
    )
    .bind(session_id)
    .fetch_optional(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("appointment confirmation sql error: {:?}", e);
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Could not confirm the appointment",
        )
    })?;

    let confirmed = match confirmed {
        Some(row) => Some(row),
        // The session outlived the pending sweep; try reviving the
        // cancelled row as long as its slot is still free.
        None => revive_swept_appointment(state, session_id).await?,
    };

    let Some((id, name, email, date, time, total)) = confirmed else {
        // Replayed event or an unknown session.
        tracing::warn!("no appointment to confirm for session {}", session_id);
        return Ok(());
    };

    if let Err(e) = state
        .mailer
        .send_template(
            "booking_confirmation",
            &email,
            &[
                ("name", name.as_str()),
                ("date", &date.to_string()),
                ("time", &time.format("%H:%M").to_string()),
                ("total", &total.to_string()),
            ],
            Some(id),
        )
        .await
    {
        tracing::warn!("payment confirmation email failed: {:?}", e);
    }
    Ok(())
}

/// Re-confirms an appointment the cleanup sweep already cancelled. The
/// exclusion constraint decides: if another booking took the slot in the
/// meantime, the update fails and the charge needs a manual refund.
async fn revive_swept_appointment(
    state: &Arc<AppState>,
    session_id: &str,
) -> ApiResult<Option<(Uuid, String, String, NaiveDate, NaiveTime, i64)>> {
    let revived = sqlx::query_as(
        "UPDATE appointments
         SET status = 'confirmed'
         WHERE stripe_session_id = $1
           AND status = 'cancelled'
           AND created_at > NOW() - interval '1 day'
         RETURNING id, customer_name, customer_email, booking_date, start_time, total_price",
    )
    .bind(session_id)
    .fetch_optional(&state.db.pool)
    .await;

    match revived {
        Ok(Some(row)) => {
            tracing::info!("revived swept appointment for session {}", session_id);
            Ok(Some(row))
        }
        Ok(None) => Ok(None),
        Err(e) if is_exclusion_violation(&e) => {
            tracing::error!(
                "payment received for session {} but the slot was rebooked; manual refund required",
                session_id
            );
            Ok(None)
        }
        Err(e) => {
            tracing::error!("appointment revival sql error: {:?}", e);
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Could not confirm the appointment",
            ))
        }
    }
}
