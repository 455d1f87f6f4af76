//! Slot availability rules.
//!
//! An appointment occupies the half-open range
//! `[date + start_time, date + start_time + duration)`. Two bookings for the
//! same studio conflict iff their ranges intersect and neither is cancelled.
//! The database enforces this with a gist exclusion constraint; the
//! predicate here backs the friendly pre-check and local slot generation.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

use crate::models::{AppointmentStatus, WorkingHour};

/// Half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// Range occupied by a session starting at `time` on `date`.
    pub fn from_slot(date: NaiveDate, time: NaiveTime, duration_hours: u32) -> Self {
        let start = date.and_time(time);
        Self {
            start,
            end: start + Duration::hours(duration_hours as i64),
        }
    }

    /// Standard half-open overlap: `a.start < b.end && b.start < a.end`.
    /// Back-to-back sessions (end == start) do not overlap.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// An existing appointment as seen by the conflict check.
#[derive(Debug, Clone)]
pub struct BookedSlot {
    pub studio_id: Uuid,
    pub status: AppointmentStatus,
    pub range: TimeRange,
}

/// The conflict rule, in one place: only a non-cancelled appointment in
/// the same studio can block a candidate range. Mirrors the database
/// exclusion constraint (`studio_id WITH =` ... `WHERE status <> 'cancelled'`).
pub fn blocks(candidate_studio: Uuid, candidate: &TimeRange, existing: &BookedSlot) -> bool {
    existing.studio_id == candidate_studio
        && existing.status != AppointmentStatus::Cancelled
        && existing.range.overlaps(candidate)
}

/// Computes the bookable start times for one studio on one date.
///
/// Walks the working window on an hourly grid and keeps a start time iff the
/// whole session fits before closing, the slot is not administratively
/// blocked for that weekday, and no existing appointment blocks the session
/// range (`blocks` rule; appointments in other studios and cancelled rows
/// never count). The studio is taken from the working-hours row.
pub fn day_slots(
    hours: &WorkingHour,
    date: NaiveDate,
    duration_hours: u32,
    blocked_slots: &[NaiveTime],
    booked: &[BookedSlot],
    date_blocked: bool,
) -> Vec<NaiveTime> {
    if date_blocked || hours.is_closed || duration_hours == 0 {
        return Vec::new();
    }

    let mut slots = Vec::new();
    let mut cursor = hours.start_time;
    let session = Duration::hours(duration_hours as i64);

    loop {
        let start = date.and_time(cursor);
        let end = start + session;
        if end > date.and_time(hours.end_time) {
            break;
        }

        let candidate = TimeRange::new(start, end);
        let free = !blocked_slots.contains(&cursor)
            && !booked.iter().any(|b| blocks(hours.studio_id, &candidate, b));
        if free {
            slots.push(cursor);
        }

        cursor = match cursor.overflowing_add_signed(Duration::hours(1)) {
            (next, 0) => next,
            // Wrapped past midnight, nothing further to offer.
            _ => break,
        };
    }

    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
    }

    const STUDIO: Uuid = Uuid::from_u128(1);
    const OTHER_STUDIO: Uuid = Uuid::from_u128(2);

    fn open_hours(start: NaiveTime, end: NaiveTime) -> WorkingHour {
        WorkingHour {
            id: Uuid::new_v4(),
            studio_id: STUDIO,
            day_of_week: 2,
            start_time: start,
            end_time: end,
            is_closed: false,
        }
    }

    fn live(studio_id: Uuid, range: TimeRange) -> BookedSlot {
        BookedSlot {
            studio_id,
            status: AppointmentStatus::Confirmed,
            range,
        }
    }

    #[test]
    fn ranges_overlap_iff_half_open_intervals_intersect() {
        let a = TimeRange::from_slot(d(10), t(10, 0), 2); // [10:00, 12:00)
        assert!(a.overlaps(&TimeRange::from_slot(d(10), t(11, 0), 2)));
        assert!(a.overlaps(&TimeRange::from_slot(d(10), t(9, 0), 2)));
        assert!(a.overlaps(&TimeRange::from_slot(d(10), t(10, 0), 1)));
        // Touching endpoints are free.
        assert!(!a.overlaps(&TimeRange::from_slot(d(10), t(12, 0), 1)));
        assert!(!a.overlaps(&TimeRange::from_slot(d(10), t(8, 0), 2)));
        // Different day never overlaps.
        assert!(!a.overlaps(&TimeRange::from_slot(d(11), t(10, 0), 2)));
    }

    #[test]
    fn open_day_offers_hourly_grid_that_fits_before_closing() {
        let hours = open_hours(t(9, 0), t(13, 0));
        let slots = day_slots(&hours, d(10), 2, &[], &[], false);
        assert_eq!(slots, vec![t(9, 0), t(10, 0), t(11, 0)]);
    }

    #[test]
    fn closed_day_and_blocked_date_offer_nothing() {
        let mut hours = open_hours(t(9, 0), t(18, 0));
        assert!(day_slots(&hours, d(10), 1, &[], &[], true).is_empty());
        hours.is_closed = true;
        assert!(day_slots(&hours, d(10), 1, &[], &[], false).is_empty());
    }

    #[test]
    fn blocked_slot_removes_only_that_start_time() {
        let hours = open_hours(t(9, 0), t(12, 0));
        let slots = day_slots(&hours, d(10), 1, &[t(10, 0)], &[], false);
        assert_eq!(slots, vec![t(9, 0), t(11, 0)]);
    }

    #[test]
    fn booked_range_shadows_every_overlapping_start() {
        let hours = open_hours(t(9, 0), t(14, 0));
        let booked = vec![live(STUDIO, TimeRange::from_slot(d(10), t(10, 0), 2))]; // [10, 12)
        // A 2h session at 9:00 would run into the booking; 12:00 is free.
        let slots = day_slots(&hours, d(10), 2, &[], &booked, false);
        assert_eq!(slots, vec![t(12, 0)]);
    }

    #[test]
    fn other_studio_bookings_never_block() {
        let range = TimeRange::from_slot(d(10), t(10, 0), 2);
        let candidate = TimeRange::from_slot(d(10), t(10, 0), 2);
        assert!(blocks(STUDIO, &candidate, &live(STUDIO, range)));
        assert!(!blocks(STUDIO, &candidate, &live(OTHER_STUDIO, range)));

        // The same overlapping booking removes slots only in its own studio.
        let hours = open_hours(t(9, 0), t(13, 0));
        let booked = vec![live(OTHER_STUDIO, range)];
        let slots = day_slots(&hours, d(10), 2, &[], &booked, false);
        assert_eq!(slots, vec![t(9, 0), t(10, 0), t(11, 0)]);
    }

    #[test]
    fn cancelled_bookings_never_block() {
        let range = TimeRange::from_slot(d(10), t(10, 0), 2);
        let candidate = TimeRange::from_slot(d(10), t(10, 0), 2);
        let cancelled = BookedSlot {
            studio_id: STUDIO,
            status: AppointmentStatus::Cancelled,
            range,
        };
        assert!(!blocks(STUDIO, &candidate, &cancelled));

        let hours = open_hours(t(9, 0), t(13, 0));
        let slots = day_slots(&hours, d(10), 2, &[], &[cancelled], false);
        assert_eq!(slots, vec![t(9, 0), t(10, 0), t(11, 0)]);

        // Every other status holds the slot.
        for status in [
            AppointmentStatus::Pending,
            AppointmentStatus::Confirmed,
            AppointmentStatus::InProgress,
            AppointmentStatus::Completed,
        ] {
            let held = BookedSlot {
                studio_id: STUDIO,
                status,
                range,
            };
            assert!(blocks(STUDIO, &candidate, &held), "{status:?}");
        }
    }

    #[test]
    fn session_longer_than_the_window_offers_nothing() {
        let hours = open_hours(t(9, 0), t(12, 0));
        assert!(day_slots(&hours, d(10), 4, &[], &[], false).is_empty());
    }

    proptest! {
        // Overlap is symmetric and irreflexive-on-touch for arbitrary slots.
        #[test]
        fn overlap_is_symmetric(h1 in 0u32..22, d1 in 1u32..3, h2 in 0u32..22, d2 in 1u32..3) {
            let a = TimeRange::from_slot(d(10), t(h1, 0), d1);
            let b = TimeRange::from_slot(d(10), t(h2, 0), d2);
            prop_assert_eq!(a.overlaps(&b), b.overlaps(&a));
        }

        // No slot returned by day_slots ever collides with a live booked
        // range in the same studio.
        #[test]
        fn generated_slots_never_collide(booked_start in 9u32..16, booked_len in 1u32..3, len in 1u32..3) {
            let hours = open_hours(t(9, 0), t(18, 0));
            let booked = vec![live(STUDIO, TimeRange::from_slot(d(10), t(booked_start, 0), booked_len))];
            for slot in day_slots(&hours, d(10), len, &[], &booked, false) {
                let candidate = TimeRange::from_slot(d(10), slot, len);
                prop_assert!(!candidate.overlaps(&booked[0].range));
            }
        }
    }
}
