pub mod circuit;
pub mod cleanup;
pub mod mailer;
pub mod square;
pub mod stripe;
