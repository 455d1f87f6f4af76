pub mod appointment;
pub mod contact;
pub mod post;
pub mod schedule;
pub mod studio;

pub use appointment::{Appointment, AppointmentStatus};
pub use contact::ContactMessage;
pub use post::Post;
pub use schedule::{BlockedDate, BlockedSlot, WorkingHour};
pub use studio::Studio;
