use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Appointment lifecycle. The range-exclusion constraint on the table
/// ignores cancelled rows, so cancelling frees the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "appointment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::InProgress => "in_progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }
}

// booking_range is derived from (booking_date, start_time, duration_hours)
// at insert time and never read back into the model.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub studio_id: Uuid,
    pub booking_date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_hours: i32,
    pub status: AppointmentStatus,
    pub total_price: i64,
    pub plan: String,
    pub theme: Option<String>,
    pub addons: serde_json::Value,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub square_booking_id: Option<String>,
    pub stripe_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
}
