use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
};
use base64::{engine::general_purpose, Engine as _};
use std::sync::Arc;
use uuid::Uuid;

/// Authenticated admin, extracted from Basic Auth credentials checked
/// against the profiles table.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    id: Uuid,
    email: String,
    password_hash: String,
    display_name: String,
}

impl FromRequestParts<Arc<crate::AppState>> for AdminUser {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let encoded = auth_header
            .strip_prefix("Basic ")
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let decoded = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|_| StatusCode::UNAUTHORIZED)?;
        let credentials =
            String::from_utf8(decoded).map_err(|_| StatusCode::UNAUTHORIZED)?;

        let (email, password) = credentials
            .split_once(':')
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let row: Option<ProfileRow> = sqlx::query_as(
            "SELECT id, email, password_hash, display_name
             FROM profiles
             WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&state.db.pool)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let profile = row.ok_or(StatusCode::UNAUTHORIZED)?;

        // Wrong password and unknown email look the same to the caller.
        let valid = bcrypt::verify(password, &profile.password_hash).unwrap_or(false);
        if !valid {
            return Err(StatusCode::UNAUTHORIZED);
        }

        Ok(AdminUser {
            id: profile.id,
            email: profile.email,
            display_name: profile.display_name,
        })
    }
}
