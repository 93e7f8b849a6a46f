//! Data model for the booking service.
//!
//! This crate defines the durable records (appointments, users, sessions,
//! email log) and the lifecycle rules every store implementation must
//! respect: payment/agreement status transitions, the fixed audit fee, and
//! validation of booking input.

pub mod appointment;
pub mod email_log;
pub mod error;
pub mod user;

pub use appointment::{
    AUDIT_FEE, AgreementStatus, Appointment, AppointmentStats, AppointmentStatus,
    AppointmentUpdate, BookingDetails, PaymentStatus, REMINDER_LEAD_HOURS,
};
pub use email_log::{DeliveryStatus, EmailLog, EmailType, NewEmailLog};
pub use error::{DomainError, ValidationError};
pub use user::{NewUser, PasswordResetToken, Session, User};
