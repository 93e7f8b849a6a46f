//! HTTP route handlers and shared application state.

pub mod admin;
pub mod agreement;
pub mod appointments;
pub mod auth;
pub mod health;
pub mod metrics;
pub mod payment;

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use booking::{
    BookingOrchestrator, InMemoryAgreementGateway, InMemoryMailer, InMemoryPaymentGateway,
};
use domain::User;
use store::Store;

use crate::auth::AuthService;
use crate::error::ApiError;

/// Shared application state accessible from all handlers.
///
/// The gateways are handles over shared interior state, so the copies
/// held here observe everything the orchestrator and auth service do.
pub struct AppState<S: Store> {
    pub store: S,
    pub auth: AuthService<S, InMemoryMailer>,
    pub orchestrator:
        BookingOrchestrator<S, InMemoryPaymentGateway, InMemoryAgreementGateway, InMemoryMailer>,
    pub payment: InMemoryPaymentGateway,
    pub agreement: InMemoryAgreementGateway,
    pub mailer: InMemoryMailer,
}

/// Extractor resolving the `Authorization: Bearer` token to a user.
pub struct AuthUser(pub User);

impl<S> FromRequestParts<Arc<AppState<S>>> for AuthUser
where
    S: Store + Clone,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;
        let user = state.auth.authenticate(token).await?;
        Ok(AuthUser(user))
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Admin-only routes call this before touching anything.
pub fn require_admin(user: &User) -> Result<(), ApiError> {
    if user.is_admin {
        Ok(())
    } else {
        Err(ApiError::Forbidden("admin access required".to_string()))
    }
}
