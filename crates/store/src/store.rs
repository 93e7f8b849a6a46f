//! The storage contract consumed by the booking workflow and API.

use async_trait::async_trait;
use common::{AppointmentId, UserId};
use domain::{
    Appointment, AppointmentStats, AppointmentStatus, AppointmentUpdate, EmailLog, NewEmailLog,
    NewUser, PasswordResetToken, Session, User,
};

use crate::error::Result;

/// Durable storage for appointment and user records.
///
/// Implementations must serialize concurrent updates to the same
/// appointment id; callers never perform their own conflict resolution.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    // -- Users --

    /// Creates a user. Fails with `DuplicateEmail` when the email is taken.
    async fn create_user(&self, new_user: NewUser) -> Result<User>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Replaces the stored credential hash and bumps `updated_at`.
    async fn update_user_password(&self, id: UserId, password_hash: &str) -> Result<()>;

    // -- Sessions --

    async fn create_session(&self, session: Session) -> Result<()>;

    async fn get_session(&self, token: &str) -> Result<Option<Session>>;

    // -- Password reset tokens --

    /// Saves a reset token, superseding any prior tokens for the user.
    async fn save_reset_token(&self, token: PasswordResetToken) -> Result<()>;

    async fn get_reset_token(&self, token: &str) -> Result<Option<PasswordResetToken>>;

    /// Removes a token so it cannot be consumed twice.
    async fn delete_reset_token(&self, token: &str) -> Result<()>;

    // -- Appointments --

    /// Persists a freshly built appointment record exactly as given.
    async fn create_appointment(&self, appointment: Appointment) -> Result<Appointment>;

    async fn get_appointment(&self, id: AppointmentId) -> Result<Option<Appointment>>;

    /// Merges a partial update into the appointment, enforcing domain
    /// invariants and setting `updated_at`. Returns the updated record.
    async fn update_appointment(
        &self,
        id: AppointmentId,
        update: AppointmentUpdate,
    ) -> Result<Appointment>;

    /// The user's appointments, newest first.
    async fn appointments_for_user(&self, user_id: UserId) -> Result<Vec<Appointment>>;

    /// All appointments in the given lifecycle state, newest first.
    async fn appointments_by_status(&self, status: AppointmentStatus) -> Result<Vec<Appointment>>;

    /// Every appointment, newest first.
    async fn all_appointments(&self) -> Result<Vec<Appointment>>;

    /// Looks up the appointment linked to an agreement envelope.
    async fn appointment_by_envelope(&self, envelope_id: &str) -> Result<Option<Appointment>>;

    /// Counts by status plus the sum of paid amounts.
    async fn appointment_stats(&self) -> Result<AppointmentStats>;

    // -- Email audit trail --

    /// Appends an entry to the audit trail.
    async fn log_email(&self, entry: NewEmailLog) -> Result<EmailLog>;

    async fn emails_for_appointment(&self, id: AppointmentId) -> Result<Vec<EmailLog>>;
}

/// Folds appointments into aggregate stats. Shared by both backends so
/// the revenue definition (sum of paid amounts) cannot drift.
pub(crate) fn fold_stats<'a>(appointments: impl Iterator<Item = &'a Appointment>) -> AppointmentStats {
    let mut stats = AppointmentStats::default();
    for appt in appointments {
        stats.total += 1;
        match appt.status {
            AppointmentStatus::Pending => stats.pending += 1,
            AppointmentStatus::Confirmed => stats.confirmed += 1,
            AppointmentStatus::Completed => stats.completed += 1,
            AppointmentStatus::Cancelled => stats.cancelled += 1,
        }
        if appt.payment_status == domain::PaymentStatus::Paid {
            stats.revenue += appt.payment_amount;
        }
    }
    stats
}
