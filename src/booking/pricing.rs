//! Price arithmetic for booking sessions.
//!
//! Two totals exist on purpose and they are not the same number:
//!
//! 1. `estimate_total` is the figure the booking wizard shows while the
//!    customer assembles a session. It is purely additive, no discounts.
//! 2. `charged_total` is what checkout actually bills. It applies a
//!    duration-based discount ladder to the studio-time block (add-ons are
//!    never discounted).
//!
//! Do not unify them: the divergence is an inherited product behavior and
//! is asserted by tests below.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Session plan picked at the first wizard step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    Audio,
    AudioVideo,
    General,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Audio => "audio",
            Plan::AudioVideo => "audio_video",
            Plan::General => "general",
        }
    }
}

/// The two bookable rooms. Studio B is the audio-only room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Room {
    #[serde(rename = "a")]
    A,
    #[serde(rename = "b")]
    B,
}

impl Room {
    pub fn slug(&self) -> &'static str {
        match self {
            Room::A => "studio-a",
            Room::B => "studio-b",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddonBilling {
    /// Billed per booked hour.
    Hourly,
    /// Billed once per session.
    Flat,
}

#[derive(Debug, Clone, Copy)]
pub struct Addon {
    pub key: &'static str,
    pub label: &'static str,
    pub billing: AddonBilling,
    /// Whole dollars.
    pub price: i64,
}

/// Fixed add-on catalog offered at the details step.
pub const ADDONS: &[Addon] = &[
    Addon {
        key: "live_switching",
        label: "Live video switching",
        billing: AddonBilling::Hourly,
        price: 75,
    },
    Addon {
        key: "extra_camera",
        label: "Additional camera operator",
        billing: AddonBilling::Hourly,
        price: 50,
    },
    Addon {
        key: "teleprompter",
        label: "Teleprompter",
        billing: AddonBilling::Flat,
        price: 60,
    },
    Addon {
        key: "episode_edit",
        label: "Post-production episode edit",
        billing: AddonBilling::Flat,
        price: 150,
    },
];

/// Bookable session lengths in hours. Not free-form.
pub const DURATIONS: &[u32] = &[1, 2, 3, 4, 6, 8];

pub fn find_addon(key: &str) -> Option<&'static Addon> {
    ADDONS.iter().find(|a| a.key == key)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("unknown add-on: {0}")]
    UnknownAddon(String),
    #[error("unsupported duration: {0} hours")]
    UnsupportedDuration(u32),
}

/// Hourly base rate for a plan in a given room, whole dollars.
pub fn base_rate(plan: Plan, room: Room) -> i64 {
    match (plan, room) {
        (Plan::Audio, _) => 170,
        (Plan::AudioVideo, Room::A) => 300,
        (Plan::AudioVideo, Room::B) => 250,
        (Plan::General, Room::A) => 250,
        (Plan::General, Room::B) => 200,
    }
}

/// Discount percentage billed by checkout for a given session length.
/// 0% at one hour rising to 40% at eight hours and beyond.
pub fn discount_percent(duration_hours: u32) -> i64 {
    match duration_hours {
        0 | 1 => 0,
        2 => 10,
        3 => 20,
        4 | 5 => 30,
        6 | 7 => 35,
        _ => 40,
    }
}

fn split_addons(addon_keys: &[String]) -> Result<(i64, i64), PricingError> {
    let mut hourly = 0i64;
    let mut flat = 0i64;
    for key in addon_keys {
        let addon = find_addon(key).ok_or_else(|| PricingError::UnknownAddon(key.clone()))?;
        match addon.billing {
            AddonBilling::Hourly => hourly += addon.price,
            AddonBilling::Flat => flat += addon.price,
        }
    }
    Ok((hourly, flat))
}

/// Undiscounted total shown by the wizard:
/// `(base_rate + hourly add-ons) * duration + flat add-ons`.
pub fn estimate_total(
    plan: Plan,
    room: Room,
    duration_hours: u32,
    addon_keys: &[String],
) -> Result<i64, PricingError> {
    if !DURATIONS.contains(&duration_hours) {
        return Err(PricingError::UnsupportedDuration(duration_hours));
    }
    let (hourly, flat) = split_addons(addon_keys)?;
    Ok((base_rate(plan, room) + hourly) * duration_hours as i64 + flat)
}

/// Total billed at checkout. The discount ladder applies to the studio-time
/// block only; add-ons stay at face value. Rounded down to whole dollars.
pub fn charged_total(
    plan: Plan,
    room: Room,
    duration_hours: u32,
    addon_keys: &[String],
) -> Result<i64, PricingError> {
    if !DURATIONS.contains(&duration_hours) {
        return Err(PricingError::UnsupportedDuration(duration_hours));
    }
    let (hourly, flat) = split_addons(addon_keys)?;
    let hours = duration_hours as i64;
    let block = base_rate(plan, room) * hours;
    let discounted_block = block * (100 - discount_percent(duration_hours)) / 100;
    Ok(discounted_block + hourly * hours + flat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_hour_video_session_costs_the_base_rate() {
        assert_eq!(
            estimate_total(Plan::AudioVideo, Room::A, 1, &[]).unwrap(),
            300
        );
        assert_eq!(
            estimate_total(Plan::AudioVideo, Room::B, 1, &[]).unwrap(),
            250
        );
    }

    #[test]
    fn estimate_adds_hourly_addons_per_hour_and_flat_addons_once() {
        // (300 + 75) * 3 + 60
        let addons = vec!["live_switching".to_string(), "teleprompter".to_string()];
        assert_eq!(
            estimate_total(Plan::AudioVideo, Room::A, 3, &addons).unwrap(),
            1185
        );
    }

    #[test]
    fn audio_rate_does_not_depend_on_room() {
        assert_eq!(base_rate(Plan::Audio, Room::A), 170);
        assert_eq!(base_rate(Plan::Audio, Room::B), 170);
    }

    #[test]
    fn four_hour_block_at_250_bills_700() {
        assert_eq!(charged_total(Plan::General, Room::A, 4, &[]).unwrap(), 700);
    }

    #[test]
    fn estimate_and_charged_diverge_by_exactly_the_ladder_discount() {
        for &hours in DURATIONS {
            let estimate = estimate_total(Plan::General, Room::A, hours, &[]).unwrap();
            let charged = charged_total(Plan::General, Room::A, hours, &[]).unwrap();
            let expected_gap = estimate * discount_percent(hours) / 100;
            assert_eq!(estimate - charged, expected_gap, "duration {hours}");
        }
    }

    #[test]
    fn addons_are_never_discounted() {
        let addons = vec!["teleprompter".to_string()];
        let without = charged_total(Plan::General, Room::B, 8, &[]).unwrap();
        let with = charged_total(Plan::General, Room::B, 8, &addons).unwrap();
        assert_eq!(with - without, 60);
    }

    #[test]
    fn ladder_is_monotonic_and_capped_at_40() {
        let mut last = -1;
        for hours in 1..=12 {
            let pct = discount_percent(hours);
            assert!(pct >= last);
            assert!(pct <= 40);
            last = pct;
        }
        assert_eq!(discount_percent(1), 0);
        assert_eq!(discount_percent(8), 40);
        assert_eq!(discount_percent(12), 40);
    }

    #[test]
    fn unknown_addon_is_rejected() {
        let addons = vec!["fog_machine".to_string()];
        assert_eq!(
            estimate_total(Plan::General, Room::A, 2, &addons),
            Err(PricingError::UnknownAddon("fog_machine".to_string()))
        );
    }

    #[test]
    fn free_form_durations_are_rejected() {
        assert_eq!(
            estimate_total(Plan::General, Room::A, 5, &[]),
            Err(PricingError::UnsupportedDuration(5))
        );
        assert!(charged_total(Plan::General, Room::A, 7, &[]).is_err());
    }
}
