//! Booking workflow error types.

use domain::ValidationError;
use store::StoreError;
use thiserror::Error;

/// Errors raised by an external gateway call.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The gateway processed the request and rejected it.
    #[error("declined: {0}")]
    Declined(String),

    /// The gateway could not be reached or timed out.
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur during the booking workflow.
#[derive(Debug, Error)]
pub enum BookingError {
    /// The booking details failed validation; no record was created.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The payment charge was declined or unreachable. The appointment
    /// record is retained with a failed payment status.
    #[error("payment failed: {0}")]
    Payment(GatewayError),

    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
