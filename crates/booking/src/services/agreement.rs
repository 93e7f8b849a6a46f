//! Agreement e-signature gateway trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::AgreementStatus;

use crate::error::GatewayError;

/// Result of dispatching a document for signature.
#[derive(Debug, Clone)]
pub struct EnvelopeOutcome {
    /// The envelope ID assigned by the e-signature provider.
    pub envelope_id: String,
    pub status: AgreementStatus,
}

/// Trait for e-signature envelope operations.
#[async_trait]
pub trait AgreementGateway: Send + Sync {
    /// Sends the service agreement to a recipient for signature.
    async fn send_for_signature(
        &self,
        recipient_email: &str,
        recipient_name: &str,
        reference_id: &str,
    ) -> Result<EnvelopeOutcome, GatewayError>;
}

#[derive(Debug, Default)]
struct InMemoryAgreementState {
    /// envelope_id -> (recipient email, reference id).
    envelopes: HashMap<String, (String, String)>,
    next_id: u32,
    fail_on_send: bool,
}

/// In-memory agreement gateway for tests and development.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAgreementGateway {
    state: Arc<RwLock<InMemoryAgreementState>>,
}

impl InMemoryAgreementGateway {
    /// Creates a new in-memory agreement gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the gateway to fail every send call.
    pub fn set_fail_on_send(&self, fail: bool) {
        self.state.write().unwrap().fail_on_send = fail;
    }

    /// Number of envelopes sent.
    pub fn envelope_count(&self) -> usize {
        self.state.read().unwrap().envelopes.len()
    }

    /// Returns true if an envelope exists with the given ID.
    pub fn has_envelope(&self, envelope_id: &str) -> bool {
        self.state.read().unwrap().envelopes.contains_key(envelope_id)
    }
}

#[async_trait]
impl AgreementGateway for InMemoryAgreementGateway {
    async fn send_for_signature(
        &self,
        recipient_email: &str,
        _recipient_name: &str,
        reference_id: &str,
    ) -> Result<EnvelopeOutcome, GatewayError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_send {
            return Err(GatewayError::Unavailable(
                "e-signature service down".to_string(),
            ));
        }

        state.next_id += 1;
        let envelope_id = format!("ENV-{:04}", state.next_id);
        state.envelopes.insert(
            envelope_id.clone(),
            (recipient_email.to_string(), reference_id.to_string()),
        );

        Ok(EnvelopeOutcome {
            envelope_id,
            status: AgreementStatus::Sent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_for_signature() {
        let gateway = InMemoryAgreementGateway::new();

        let outcome = gateway
            .send_for_signature("jane@x.com", "Jane Doe", "appt-1")
            .await
            .unwrap();
        assert_eq!(outcome.envelope_id, "ENV-0001");
        assert_eq!(outcome.status, AgreementStatus::Sent);
        assert!(gateway.has_envelope("ENV-0001"));
        assert_eq!(gateway.envelope_count(), 1);
    }

    #[tokio::test]
    async fn test_fail_on_send() {
        let gateway = InMemoryAgreementGateway::new();
        gateway.set_fail_on_send(true);

        let result = gateway
            .send_for_signature("jane@x.com", "Jane Doe", "appt-1")
            .await;
        assert!(matches!(result, Err(GatewayError::Unavailable(_))));
        assert_eq!(gateway.envelope_count(), 0);
    }
}
