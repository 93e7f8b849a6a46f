//! Standalone payment endpoint, independent of the booking workflow.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use booking::{ChargeRequest, PaymentGateway};
use common::Money;
use domain::AUDIT_FEE;
use serde::{Deserialize, Serialize};
use store::Store;

use crate::error::ApiError;
use crate::routes::{AppState, AuthUser};

#[derive(Deserialize)]
pub struct ProcessPaymentRequest {
    pub payment_token: String,
    /// Defaults to the audit fee when omitted.
    pub amount_cents: Option<i64>,
    /// Caller-supplied idempotency key; generated when omitted.
    pub reference_id: Option<String>,
}

#[derive(Serialize)]
pub struct ProcessPaymentResponse {
    pub payment_id: String,
    pub amount: String,
    pub status: String,
}

/// POST /payment/process — charge a payment method directly.
#[tracing::instrument(skip(state, req, user), fields(user_id = %user.id))]
pub async fn process<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Json(req): Json<ProcessPaymentRequest>,
) -> Result<Json<ProcessPaymentResponse>, ApiError> {
    let amount = match req.amount_cents {
        Some(cents) if cents <= 0 => {
            return Err(ApiError::BadRequest("amount must be positive".to_string()));
        }
        Some(cents) => Money::from_cents(cents),
        None => AUDIT_FEE,
    };
    let reference_id = req
        .reference_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let outcome = state
        .payment
        .charge(ChargeRequest {
            amount,
            currency: "USD".to_string(),
            source_token: req.payment_token,
            reference_id,
        })
        .await
        .map_err(|e| ApiError::PaymentFailed(e.to_string()))?;

    Ok(Json(ProcessPaymentResponse {
        payment_id: outcome.payment_id,
        amount: amount.formatted(),
        status: outcome.status,
    }))
}
