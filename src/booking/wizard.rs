//! The five-step booking wizard.
//!
//! Steps run strictly linearly: plan -> studio -> details -> schedule ->
//! confirm. Picking the audio plan skips the studio step entirely (the
//! session is pinned to the audio-only room with its fixed theme), and
//! going back from details retraces the same skip. The checkout and booking
//! controllers replay a submitted draft through this machine, so a client
//! cannot hand us a draft the wizard could not have produced.

use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use thiserror::Error;
use validator::ValidateEmail;

use super::pricing::{self, Plan, PricingError, Room};

/// Room used for audio-only sessions; the wizard never asks.
pub const AUDIO_ROOM: Room = Room::B;
pub const AUDIO_THEME: &str = "podcast";

/// Backdrop themes, selectable for Studio A only.
pub const STUDIO_A_THEMES: &[&str] = &["modern", "industrial", "cozy", "neon"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Plan,
    Studio,
    Details,
    Schedule,
    Confirm,
    Done,
}

impl Step {
    fn next(self, plan: Plan) -> Step {
        match self {
            Step::Plan if plan == Plan::Audio => Step::Details,
            Step::Plan => Step::Studio,
            Step::Studio => Step::Details,
            Step::Details => Step::Schedule,
            Step::Schedule => Step::Confirm,
            Step::Confirm | Step::Done => Step::Done,
        }
    }

    fn back(self, plan: Plan) -> Option<Step> {
        match self {
            Step::Plan => None,
            Step::Studio => Some(Step::Plan),
            Step::Details if plan == Plan::Audio => Some(Step::Plan),
            Step::Details => Some(Step::Studio),
            Step::Schedule => Some(Step::Details),
            Step::Confirm => Some(Step::Schedule),
            Step::Done => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WizardError {
    #[error("plan is required")]
    MissingPlan,
    #[error("studio selection is required")]
    MissingStudio,
    #[error("duration and add-ons are required")]
    MissingDetails,
    #[error("date and time are required")]
    MissingSchedule,
    #[error("name and email are required")]
    MissingCustomer,
    #[error("email address is not valid")]
    InvalidEmail,
    #[error("theme '{0}' is not offered")]
    UnknownTheme(String),
    #[error("themes are only available in Studio A")]
    ThemeNotAllowed,
    #[error("wizard step taken out of order")]
    OutOfOrder,
    #[error(transparent)]
    Pricing(#[from] PricingError),
}

/// Raw wizard selections as submitted by the client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingDraft {
    pub plan: Option<Plan>,
    pub studio: Option<Room>,
    pub theme: Option<String>,
    #[serde(alias = "duration")]
    pub duration_hours: Option<u32>,
    #[serde(default)]
    pub addons: Vec<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
}

/// A draft that made it through every step.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedBooking {
    pub plan: Plan,
    pub room: Room,
    pub theme: Option<String>,
    pub duration_hours: u32,
    pub addons: Vec<String>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    /// Undiscounted wizard estimate; checkout recomputes the billed total.
    pub estimate_total: i64,
}

#[derive(Debug)]
pub struct Wizard {
    step: Step,
    plan: Option<Plan>,
    room: Option<Room>,
    theme: Option<String>,
    duration_hours: Option<u32>,
    addons: Vec<String>,
    date: Option<NaiveDate>,
    time: Option<NaiveTime>,
}

impl Wizard {
    pub fn new() -> Self {
        Self {
            step: Step::Plan,
            plan: None,
            room: None,
            theme: None,
            duration_hours: None,
            addons: Vec::new(),
            date: None,
            time: None,
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn select_plan(&mut self, plan: Plan) -> Result<(), WizardError> {
        if self.step != Step::Plan {
            return Err(WizardError::OutOfOrder);
        }
        self.plan = Some(plan);
        if plan == Plan::Audio {
            self.room = Some(AUDIO_ROOM);
            self.theme = Some(AUDIO_THEME.to_string());
        }
        self.step = self.step.next(plan);
        Ok(())
    }

    pub fn select_studio(&mut self, room: Room, theme: Option<&str>) -> Result<(), WizardError> {
        if self.step != Step::Studio {
            return Err(WizardError::OutOfOrder);
        }
        match (room, theme) {
            (Room::A, Some(t)) if !STUDIO_A_THEMES.contains(&t) => {
                return Err(WizardError::UnknownTheme(t.to_string()));
            }
            (Room::B, Some(_)) => return Err(WizardError::ThemeNotAllowed),
            _ => {}
        }
        self.room = Some(room);
        self.theme = theme.map(str::to_string);
        self.step = self.step.next(self.plan.expect("plan set before studio"));
        Ok(())
    }

    pub fn set_details(&mut self, duration_hours: u32, addons: Vec<String>) -> Result<(), WizardError> {
        if self.step != Step::Details {
            return Err(WizardError::OutOfOrder);
        }
        // Validate eagerly so the step cannot advance with a bad selection.
        let plan = self.plan.ok_or(WizardError::MissingPlan)?;
        let room = self.room.ok_or(WizardError::MissingStudio)?;
        pricing::estimate_total(plan, room, duration_hours, &addons)?;
        self.duration_hours = Some(duration_hours);
        self.addons = addons;
        self.step = self.step.next(plan);
        Ok(())
    }

    pub fn set_schedule(&mut self, date: NaiveDate, time: NaiveTime) -> Result<(), WizardError> {
        if self.step != Step::Schedule {
            return Err(WizardError::OutOfOrder);
        }
        self.date = Some(date);
        self.time = Some(time);
        self.step = self.step.next(self.plan.expect("plan set before schedule"));
        Ok(())
    }

    /// Final step: non-empty name, well-formed email.
    pub fn confirm(
        self,
        name: &str,
        email: &str,
        phone: Option<&str>,
    ) -> Result<CompletedBooking, WizardError> {
        if self.step != Step::Confirm {
            return Err(WizardError::OutOfOrder);
        }
        let name = name.trim();
        let email = email.trim();
        if name.is_empty() || email.is_empty() {
            return Err(WizardError::MissingCustomer);
        }
        if !email.validate_email() {
            return Err(WizardError::InvalidEmail);
        }

        let plan = self.plan.ok_or(WizardError::MissingPlan)?;
        let room = self.room.ok_or(WizardError::MissingStudio)?;
        let duration_hours = self.duration_hours.ok_or(WizardError::MissingDetails)?;
        let estimate_total = pricing::estimate_total(plan, room, duration_hours, &self.addons)?;

        Ok(CompletedBooking {
            plan,
            room,
            theme: self.theme,
            duration_hours,
            addons: self.addons,
            date: self.date.ok_or(WizardError::MissingSchedule)?,
            time: self.time.ok_or(WizardError::MissingSchedule)?,
            customer_name: name.to_string(),
            customer_email: email.to_string(),
            customer_phone: phone.map(str::trim).filter(|p| !p.is_empty()).map(str::to_string),
            estimate_total,
        })
    }

    /// Retraces one step, honoring the audio skip rule.
    pub fn back(&mut self) -> Result<(), WizardError> {
        let plan = self.plan.unwrap_or(Plan::General);
        match self.step.back(plan) {
            Some(prev) => {
                self.step = prev;
                Ok(())
            }
            None => Err(WizardError::OutOfOrder),
        }
    }
}

impl Default for Wizard {
    fn default() -> Self {
        Self::new()
    }
}

/// Replays a submitted draft through the machine, yielding the completed
/// booking or the first validation failure a real wizard run would hit.
pub fn replay(draft: &BookingDraft) -> Result<CompletedBooking, WizardError> {
    let mut wizard = Wizard::new();
    wizard.select_plan(draft.plan.ok_or(WizardError::MissingPlan)?)?;

    if wizard.step() == Step::Studio {
        let room = draft.studio.ok_or(WizardError::MissingStudio)?;
        wizard.select_studio(room, draft.theme.as_deref())?;
    }

    wizard.set_details(
        draft.duration_hours.ok_or(WizardError::MissingDetails)?,
        draft.addons.clone(),
    )?;
    wizard.set_schedule(
        draft.date.ok_or(WizardError::MissingSchedule)?,
        draft.time.ok_or(WizardError::MissingSchedule)?,
    )?;

    wizard.confirm(
        draft.customer_name.as_deref().unwrap_or_default(),
        draft.customer_email.as_deref().unwrap_or_default(),
        draft.customer_phone.as_deref(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_draft() -> BookingDraft {
        BookingDraft {
            plan: Some(Plan::AudioVideo),
            studio: Some(Room::A),
            theme: Some("modern".to_string()),
            duration_hours: Some(3),
            addons: vec!["live_switching".to_string(), "teleprompter".to_string()],
            date: NaiveDate::from_ymd_opt(2025, 7, 14),
            time: NaiveTime::from_hms_opt(10, 0, 0),
            customer_name: Some("Ada Lovelace".to_string()),
            customer_email: Some("ada@example.com".to_string()),
            customer_phone: Some("(555) 234-5678".to_string()),
        }
    }

    #[test]
    fn audio_plan_skips_the_studio_step_and_pins_the_room() {
        let mut w = Wizard::new();
        w.select_plan(Plan::Audio).unwrap();
        assert_eq!(w.step(), Step::Details);
        // The studio step is unreachable for audio.
        assert_eq!(
            w.select_studio(Room::A, None).unwrap_err(),
            WizardError::OutOfOrder
        );

        let draft = BookingDraft {
            plan: Some(Plan::Audio),
            studio: None,
            theme: None,
            duration_hours: Some(2),
            ..full_draft()
        };
        let booked = replay(&draft).unwrap();
        assert_eq!(booked.room, AUDIO_ROOM);
        assert_eq!(booked.theme.as_deref(), Some(AUDIO_THEME));
    }

    #[test]
    fn back_from_details_retraces_the_audio_skip() {
        let mut w = Wizard::new();
        w.select_plan(Plan::Audio).unwrap();
        w.back().unwrap();
        assert_eq!(w.step(), Step::Plan);

        let mut w = Wizard::new();
        w.select_plan(Plan::General).unwrap();
        w.select_studio(Room::B, None).unwrap();
        w.back().unwrap();
        assert_eq!(w.step(), Step::Studio);
    }

    #[test]
    fn steps_cannot_run_out_of_order() {
        let mut w = Wizard::new();
        assert_eq!(
            w.set_details(2, vec![]).unwrap_err(),
            WizardError::OutOfOrder
        );
        let d = NaiveDate::from_ymd_opt(2025, 7, 14).unwrap();
        let t = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        assert_eq!(w.set_schedule(d, t).unwrap_err(), WizardError::OutOfOrder);
        assert!(w.back().is_err());
    }

    #[test]
    fn replay_of_a_complete_draft_produces_the_wizard_estimate() {
        let booked = replay(&full_draft()).unwrap();
        assert_eq!(booked.estimate_total, 1185); // (300 + 75) * 3 + 60
        assert_eq!(booked.customer_phone.as_deref(), Some("(555) 234-5678"));
    }

    #[test]
    fn themes_are_studio_a_only_and_must_be_known() {
        let mut draft = full_draft();
        draft.theme = Some("baroque".to_string());
        assert_eq!(
            replay(&draft).unwrap_err(),
            WizardError::UnknownTheme("baroque".to_string())
        );

        let mut draft = full_draft();
        draft.studio = Some(Room::B);
        assert_eq!(replay(&draft).unwrap_err(), WizardError::ThemeNotAllowed);
    }

    #[test]
    fn confirm_requires_name_and_a_well_formed_email() {
        let mut draft = full_draft();
        draft.customer_name = Some("   ".to_string());
        assert_eq!(replay(&draft).unwrap_err(), WizardError::MissingCustomer);

        let mut draft = full_draft();
        draft.customer_email = Some("not-an-email".to_string());
        assert_eq!(replay(&draft).unwrap_err(), WizardError::InvalidEmail);
    }

    #[test]
    fn empty_phone_collapses_to_none() {
        let mut draft = full_draft();
        draft.customer_phone = Some("  ".to_string());
        assert_eq!(replay(&draft).unwrap().customer_phone, None);
    }

    #[test]
    fn bad_details_keep_the_wizard_on_the_details_step() {
        let mut w = Wizard::new();
        w.select_plan(Plan::General).unwrap();
        w.select_studio(Room::A, None).unwrap();
        assert!(w.set_details(5, vec![]).is_err());
        assert_eq!(w.step(), Step::Details);
        w.set_details(4, vec![]).unwrap();
        assert_eq!(w.step(), Step::Schedule);
    }
}
