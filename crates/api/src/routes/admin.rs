//! Admin-only endpoints: appointment listing and aggregate stats.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use domain::AppointmentStatus;
use serde::{Deserialize, Serialize};
use store::Store;

use crate::error::ApiError;
use crate::routes::appointments::AppointmentResponse;
use crate::routes::{AppState, AuthUser, require_admin};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub total: u64,
    pub pending: u64,
    pub confirmed: u64,
    pub completed: u64,
    pub cancelled: u64,
    /// Sum of paid amounts, as a decimal string ("450.00").
    pub revenue: String,
}

/// GET /admin/appointments — all appointments, optionally filtered by
/// status.
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<AppointmentResponse>>, ApiError> {
    require_admin(&user)?;

    let appointments = match query.status.as_deref() {
        Some(raw) => {
            let status = AppointmentStatus::parse(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("Unknown status '{raw}'")))?;
            state.store.appointments_by_status(status).await?
        }
        None => state.store.all_appointments().await?,
    };

    Ok(Json(appointments.into_iter().map(Into::into).collect()))
}

/// GET /admin/stats — counts by status plus total paid revenue.
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn stats<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
) -> Result<Json<StatsResponse>, ApiError> {
    require_admin(&user)?;

    let stats = state.store.appointment_stats().await?;
    Ok(Json(StatsResponse {
        total: stats.total,
        pending: stats.pending,
        confirmed: stats.confirmed,
        completed: stats.completed,
        cancelled: stats.cancelled,
        revenue: stats.revenue.formatted(),
    }))
}
