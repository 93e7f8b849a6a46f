//! Store error types.

use common::{AppointmentId, UserId};
use domain::DomainError;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No appointment exists with the given id.
    #[error("appointment not found: {0}")]
    AppointmentNotFound(AppointmentId),

    /// No user exists with the given id.
    #[error("user not found: {0}")]
    UserNotFound(UserId),

    /// A user already exists with the given email.
    #[error("a user already exists with this email")]
    DuplicateEmail,

    /// The update violated an appointment lifecycle invariant.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Underlying database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored value could not be interpreted.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;
