//! Agreement gateway status callback.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use domain::{AgreementStatus, AppointmentUpdate, DomainError};
use serde::{Deserialize, Serialize};
use store::{Store, StoreError};

use crate::error::ApiError;
use crate::routes::AppState;

#[derive(Deserialize)]
pub struct WebhookRequest {
    pub envelope_id: String,
    pub status: String,
}

#[derive(Serialize)]
pub struct WebhookResponse {
    pub envelope_id: String,
    pub agreement_status: String,
}

/// POST /agreement/webhook — gateway-originated envelope status update.
///
/// Unauthenticated by design; the envelope id is the correlation key.
/// Out-of-order callbacks that would regress the agreement status are
/// acknowledged and dropped.
#[tracing::instrument(skip(state, req))]
pub async fn webhook<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<WebhookRequest>,
) -> Result<Json<WebhookResponse>, ApiError> {
    let status = map_gateway_status(&req.status);

    let appointment = state
        .store
        .appointment_by_envelope(&req.envelope_id)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("No appointment for envelope {}", req.envelope_id))
        })?;

    let current = match state
        .store
        .update_appointment(appointment.id, AppointmentUpdate::agreement_callback(status))
        .await
    {
        Ok(updated) => updated,
        Err(StoreError::Domain(DomainError::AgreementRegression { from, to })) => {
            tracing::warn!(
                envelope_id = %req.envelope_id,
                %from,
                %to,
                "ignoring out-of-order agreement callback"
            );
            appointment
        }
        Err(err) => return Err(err.into()),
    };

    Ok(Json(WebhookResponse {
        envelope_id: req.envelope_id,
        agreement_status: current.agreement_status.to_string(),
    }))
}

/// Translates the gateway's envelope vocabulary into our lifecycle.
/// Anything that is neither terminal state counts as still in flight.
fn map_gateway_status(raw: &str) -> AgreementStatus {
    match raw {
        "completed" | "signed" => AgreementStatus::Signed,
        "declined" | "voided" => AgreementStatus::Declined,
        _ => AgreementStatus::Sent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_vocabulary_maps_to_lifecycle() {
        assert_eq!(map_gateway_status("completed"), AgreementStatus::Signed);
        assert_eq!(map_gateway_status("signed"), AgreementStatus::Signed);
        assert_eq!(map_gateway_status("declined"), AgreementStatus::Declined);
        assert_eq!(map_gateway_status("voided"), AgreementStatus::Declined);
        assert_eq!(map_gateway_status("sent"), AgreementStatus::Sent);
        assert_eq!(map_gateway_status("delivered"), AgreementStatus::Sent);
    }
}
