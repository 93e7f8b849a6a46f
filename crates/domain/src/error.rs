//! Domain error types.

use thiserror::Error;

use crate::appointment::AgreementStatus;

/// Rejections produced while validating booking input.
///
/// Returned before any record is created or gateway invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("full name is required")]
    FullNameRequired,

    #[error("valid email is required")]
    InvalidEmail,

    #[error("valid phone number is required")]
    PhoneRequired,

    #[error("complete address is required")]
    AddressRequired,

    #[error("you must confirm readiness to proceed")]
    NotReady,
}

/// Violations of appointment lifecycle invariants.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Input validation failed.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// The payment amount is fixed at creation.
    #[error("payment amount is fixed at creation and cannot be changed")]
    AmountImmutable,

    /// Agreement status only moves forward.
    #[error("agreement status cannot move from {from} to {to}")]
    AgreementRegression {
        from: AgreementStatus,
        to: AgreementStatus,
    },

    /// Confirmation requires a successful payment.
    #[error("appointment cannot be confirmed before payment succeeds")]
    ConfirmedWithoutPayment,

    /// A paid appointment must reference its charge.
    #[error("paid appointment requires a payment transaction id")]
    PaidWithoutTransaction,
}
