//! Account endpoints: signup, login, password reset, current user.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Utc};
use domain::{Session, User};
use serde::{Deserialize, Serialize};
use store::Store;

use crate::auth::SignupRequest;
use crate::error::ApiError;
use crate::routes::{AppState, AuthUser};

// -- Request types --

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

// -- Response types --

/// Public view of an account. The credential hash never appears here.
#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            is_admin: user.is_admin,
            created_at: user.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub user: UserResponse,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionResponse {
    fn new(user: User, session: Session) -> Self {
        Self {
            user: user.into(),
            token: session.token,
            expires_at: session.expires_at,
        }
    }
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// -- Handlers --

/// POST /auth/signup — create an account and issue a session.
#[tracing::instrument(skip(state, req))]
pub async fn signup<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<SignupRequest>,
) -> Result<(axum::http::StatusCode, Json<SessionResponse>), ApiError> {
    let (user, session) = state.auth.signup(req).await?;
    Ok((
        axum::http::StatusCode::CREATED,
        Json(SessionResponse::new(user, session)),
    ))
}

/// POST /auth/login — verify credentials and issue a session.
#[tracing::instrument(skip(state, req))]
pub async fn login<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let (user, session) = state.auth.login(&req.email, &req.password).await?;
    Ok(Json(SessionResponse::new(user, session)))
}

/// POST /auth/forgot-password — request a reset token.
///
/// The response is identical whether or not the email matches an
/// account.
#[tracing::instrument(skip(state, req))]
pub async fn forgot_password<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.auth.forgot_password(&req.email).await?;
    Ok(Json(MessageResponse {
        message: "If that email is registered, a reset link has been sent".to_string(),
    }))
}

/// POST /auth/reset-password — consume a reset token once.
#[tracing::instrument(skip(state, req))]
pub async fn reset_password<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.auth.reset_password(&req.token, &req.password).await?;
    Ok(Json(MessageResponse {
        message: "Password updated".to_string(),
    }))
}

/// GET /auth/user — the authenticated user's profile.
pub async fn current_user(AuthUser(user): AuthUser) -> Json<UserResponse> {
    Json(user.into())
}
