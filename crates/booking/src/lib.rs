//! Booking workflow for the appointment service.
//!
//! The [`BookingOrchestrator`] coordinates the store with three external
//! gateways (payment, agreement e-signature, notification email) to turn
//! a booking request into a confirmed appointment. Payment failure is the
//! only fatal path; agreement and email dispatch are best-effort.
//!
//! Reminders are durable: due-ness is derived from the appointment row
//! itself and the [`ReminderWorker`] polls the store, so scheduled
//! reminders survive process restarts.

pub mod error;
pub mod orchestrator;
pub mod reminder;
pub mod services;

pub use error::{BookingError, GatewayError};
pub use orchestrator::{BookingOrchestrator, BookingRequest};
pub use reminder::ReminderWorker;
pub use services::agreement::{AgreementGateway, EnvelopeOutcome, InMemoryAgreementGateway};
pub use services::notification::{InMemoryMailer, Notice, NotificationGateway, OutboundEmail};
pub use services::payment::{ChargeOutcome, ChargeRequest, InMemoryPaymentGateway, PaymentGateway};
