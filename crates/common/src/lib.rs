//! Shared types used across the booking service crates.

pub mod types;

pub use types::{AppointmentId, Money, UserId};
