//! Payment gateway trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::Money;

use crate::error::GatewayError;

/// A charge request forwarded to the payment processor.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub amount: Money,
    pub currency: String,
    /// Opaque single-use token representing the payment method.
    pub source_token: String,
    /// Idempotency key; repeated charges with the same reference do not
    /// charge twice.
    pub reference_id: String,
}

/// Result of a successful charge.
#[derive(Debug, Clone)]
pub struct ChargeOutcome {
    /// The transaction ID assigned by the payment processor.
    pub payment_id: String,
    /// Processor-reported state, e.g. `"captured"`.
    pub status: String,
}

/// Trait for payment processing operations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charges the payment method. Idempotent per `reference_id`.
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeOutcome, GatewayError>;

    /// Refunds a previously made charge.
    async fn refund(&self, payment_id: &str) -> Result<(), GatewayError>;
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    /// reference_id -> payment_id, for idempotent replays.
    by_reference: HashMap<String, String>,
    payments: HashMap<String, Money>,
    next_id: u32,
    charge_calls: u32,
    fail_on_charge: bool,
}

/// In-memory payment gateway for tests and development.
///
/// Tokens starting with `declined` are rejected, mirroring how real
/// processors expose test tokens.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory payment gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the gateway to fail every charge call.
    pub fn set_fail_on_charge(&self, fail: bool) {
        self.state.write().unwrap().fail_on_charge = fail;
    }

    /// Number of successful charges currently held.
    pub fn payment_count(&self) -> usize {
        self.state.read().unwrap().payments.len()
    }

    /// Number of charge calls received, including idempotent replays.
    pub fn charge_calls(&self) -> u32 {
        self.state.read().unwrap().charge_calls
    }

    /// Returns true if a charge exists with the given transaction ID.
    pub fn has_payment(&self, payment_id: &str) -> bool {
        self.state.read().unwrap().payments.contains_key(payment_id)
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeOutcome, GatewayError> {
        let mut state = self.state.write().unwrap();
        state.charge_calls += 1;

        if state.fail_on_charge {
            return Err(GatewayError::Unavailable(
                "payment service down".to_string(),
            ));
        }
        if request.source_token.starts_with("declined") {
            return Err(GatewayError::Declined("card declined".to_string()));
        }

        if let Some(existing) = state.by_reference.get(&request.reference_id) {
            return Ok(ChargeOutcome {
                payment_id: existing.clone(),
                status: "captured".to_string(),
            });
        }

        state.next_id += 1;
        let payment_id = format!("PAY-{:04}", state.next_id);
        state
            .by_reference
            .insert(request.reference_id, payment_id.clone());
        state.payments.insert(payment_id.clone(), request.amount);

        Ok(ChargeOutcome {
            payment_id,
            status: "captured".to_string(),
        })
    }

    async fn refund(&self, payment_id: &str) -> Result<(), GatewayError> {
        let mut state = self.state.write().unwrap();
        state.payments.remove(payment_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(reference: &str, token: &str) -> ChargeRequest {
        ChargeRequest {
            amount: Money::from_cents(22_500),
            currency: "USD".to_string(),
            source_token: token.to_string(),
            reference_id: reference.to_string(),
        }
    }

    #[tokio::test]
    async fn test_charge_and_refund() {
        let gateway = InMemoryPaymentGateway::new();

        let outcome = gateway.charge(request("appt-1", "tok_ok")).await.unwrap();
        assert!(outcome.payment_id.starts_with("PAY-"));
        assert_eq!(outcome.status, "captured");
        assert_eq!(gateway.payment_count(), 1);
        assert!(gateway.has_payment(&outcome.payment_id));

        gateway.refund(&outcome.payment_id).await.unwrap();
        assert_eq!(gateway.payment_count(), 0);
    }

    #[tokio::test]
    async fn test_charge_is_idempotent_per_reference() {
        let gateway = InMemoryPaymentGateway::new();

        let first = gateway.charge(request("appt-1", "tok_ok")).await.unwrap();
        let second = gateway.charge(request("appt-1", "tok_ok")).await.unwrap();

        assert_eq!(first.payment_id, second.payment_id);
        assert_eq!(gateway.payment_count(), 1);
        assert_eq!(gateway.charge_calls(), 2);
    }

    #[tokio::test]
    async fn test_declined_token() {
        let gateway = InMemoryPaymentGateway::new();

        let result = gateway.charge(request("appt-1", "declined_tok")).await;
        assert!(matches!(result, Err(GatewayError::Declined(_))));
        assert_eq!(gateway.payment_count(), 0);
    }

    #[tokio::test]
    async fn test_fail_on_charge() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_fail_on_charge(true);

        let result = gateway.charge(request("appt-1", "tok_ok")).await;
        assert!(matches!(result, Err(GatewayError::Unavailable(_))));
        assert_eq!(gateway.payment_count(), 0);
    }
}
