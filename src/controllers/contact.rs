use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::controllers::{api_error, ApiResult};
use crate::validation::validate_nanp_phone;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/contact", post(submit_contact))
}

/// Validated before anything leaves the process; a malformed submission
/// never costs an email API call.
#[derive(Debug, Deserialize, Validate)]
struct ContactRequest {
    #[validate(length(min = 1, message = "name is required"))]
    name: String,
    #[validate(email(message = "email address is not valid"))]
    email: String,
    #[validate(custom(function = "validate_nanp_phone"))]
    phone: Option<String>,
    #[validate(length(min = 1, message = "message is required"))]
    message: String,
}

async fn submit_contact(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ContactRequest>,
) -> ApiResult<impl IntoResponse> {
    if let Err(errors) = req.validate() {
        return Err(api_error(StatusCode::BAD_REQUEST, &errors.to_string()));
    }
    // Empty phone is treated as absent, not invalid.
    let phone = req.phone.as_deref().map(str::trim).filter(|p| !p.is_empty());

    let message_id: Uuid = sqlx::query_scalar(
        "INSERT INTO contact_messages (name, email, phone, message)
         VALUES ($1, $2, $3, $4)
         RETURNING id",
    )
    .bind(&req.name)
    .bind(&req.email)
    .bind(phone)
    .bind(&req.message)
    .fetch_one(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("contact insert sql error: {:?}", e);
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Could not save your message. Please try again.",
        )
    })?;

    // Best effort: the message is stored either way.
    let admin = state.mailer.admin_address.clone();
    if let Err(e) = state
        .mailer
        .send_template(
            "contact_notification",
            &admin,
            &[
                ("name", req.name.as_str()),
                ("email", req.email.as_str()),
                ("phone", phone.unwrap_or("not provided")),
                ("message", req.message.as_str()),
            ],
            None,
        )
        .await
    {
        tracing::warn!("contact notification email failed: {:?}", e);
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "id": message_id })),
    ))
}
