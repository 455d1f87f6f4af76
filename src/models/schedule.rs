use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One row per (studio, weekday). day_of_week is 0 = Sunday .. 6 = Saturday.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WorkingHour {
    pub id: Uuid,
    pub studio_id: Uuid,
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_closed: bool,
}

/// A fully blocked calendar date, global across studios.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BlockedDate {
    pub id: Uuid,
    pub blocked_date: NaiveDate,
    pub reason: Option<String>,
}

/// A recurring weekly blocked time slot, scoped to one studio.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BlockedSlot {
    pub id: Uuid,
    pub studio_id: Uuid,
    pub day_of_week: i16,
    pub slot_time: NaiveTime,
    pub reason: Option<String>,
}
