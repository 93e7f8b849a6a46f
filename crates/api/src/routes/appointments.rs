//! Appointment booking and retrieval endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use booking::BookingRequest;
use chrono::{DateTime, Utc};
use common::AppointmentId;
use domain::{Appointment, AppointmentUpdate, BookingDetails};
use serde::{Deserialize, Serialize};
use store::Store;

use crate::error::ApiError;
use crate::policy::can_access_appointment;
use crate::routes::{AppState, AuthUser};

// -- Request types --

#[derive(Deserialize)]
pub struct BookAppointmentRequest {
    #[serde(flatten)]
    pub details: BookingDetails,
    pub payment_token: String,
}

// -- Response types --

/// Wire form of an appointment. Money renders as a decimal string
/// ("225.00"), dates as RFC 3339.
#[derive(Serialize)]
pub struct AppointmentResponse {
    pub id: String,
    pub user_id: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub preferred_date: DateTime<Utc>,
    pub preferred_time: Option<String>,
    pub status: String,
    pub payment_status: String,
    pub payment_amount: String,
    pub payment_id: Option<String>,
    pub agreement_status: String,
    pub envelope_id: Option<String>,
    pub is_ready: bool,
    pub reminder_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Appointment> for AppointmentResponse {
    fn from(appt: Appointment) -> Self {
        Self {
            id: appt.id.to_string(),
            user_id: appt.user_id.to_string(),
            full_name: appt.full_name,
            email: appt.email,
            phone: appt.phone,
            address: appt.address,
            preferred_date: appt.preferred_date,
            preferred_time: appt.preferred_time,
            status: appt.status.to_string(),
            payment_status: appt.payment_status.to_string(),
            payment_amount: appt.payment_amount.formatted(),
            payment_id: appt.payment_id,
            agreement_status: appt.agreement_status.to_string(),
            envelope_id: appt.envelope_id,
            is_ready: appt.is_ready,
            reminder_sent: appt.reminder_sent,
            created_at: appt.created_at,
            updated_at: appt.updated_at,
        }
    }
}

#[derive(Serialize)]
pub struct BookingResponse {
    pub appointment: AppointmentResponse,
    pub message: String,
}

// -- Handlers --

/// POST /appointments — run the booking workflow for the caller.
#[tracing::instrument(skip(state, req, user), fields(user_id = %user.id))]
pub async fn book<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Json(req): Json<BookAppointmentRequest>,
) -> Result<(axum::http::StatusCode, Json<BookingResponse>), ApiError> {
    let appointment = state
        .orchestrator
        .book(
            user.id,
            BookingRequest {
                details: req.details,
                payment_token: req.payment_token,
            },
        )
        .await?;

    Ok((
        axum::http::StatusCode::CREATED,
        Json(BookingResponse {
            appointment: appointment.into(),
            message: "Appointment booked and payment confirmed".to_string(),
        }),
    ))
}

/// GET /appointments/my — the caller's appointments, newest first.
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list_mine<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<AppointmentResponse>>, ApiError> {
    let appointments = state.store.appointments_for_user(user.id).await?;
    Ok(Json(
        appointments.into_iter().map(Into::into).collect(),
    ))
}

/// GET /appointments/:id — fetch one appointment (owner or admin).
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    let appointment = load_for(&state, &user, &id).await?;
    Ok(Json(appointment.into()))
}

/// PATCH /appointments/:id — partial update (owner or admin).
///
/// The update merges into the record; lifecycle violations (amount
/// changes, agreement regressions, confirming an unpaid appointment)
/// are rejected with 400.
#[tracing::instrument(skip(state, user, update), fields(user_id = %user.id))]
pub async fn update<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(update): Json<AppointmentUpdate>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    let appointment = load_for(&state, &user, &id).await?;
    let updated = state.store.update_appointment(appointment.id, update).await?;
    Ok(Json(updated.into()))
}

/// Loads the appointment and applies the access policy.
async fn load_for<S: Store + Clone>(
    state: &AppState<S>,
    user: &domain::User,
    id: &str,
) -> Result<Appointment, ApiError> {
    let appointment_id = parse_appointment_id(id)?;
    let appointment = state
        .store
        .get_appointment(appointment_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Appointment {id} not found")))?;

    if !can_access_appointment(user, &appointment) {
        return Err(ApiError::Forbidden(
            "not allowed to access this appointment".to_string(),
        ));
    }
    Ok(appointment)
}

pub(crate) fn parse_appointment_id(id: &str) -> Result<AppointmentId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))?;
    Ok(AppointmentId::from_uuid(uuid))
}
