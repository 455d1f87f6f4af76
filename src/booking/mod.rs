pub mod availability;
pub mod pricing;
pub mod wizard;
