use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{AppointmentId, UserId};
use domain::{
    Appointment, AppointmentStats, AppointmentStatus, AppointmentUpdate, EmailLog, NewEmailLog,
    NewUser, PasswordResetToken, Session, User,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::store::{Store, fold_stats};

#[derive(Default)]
struct State {
    users: HashMap<UserId, User>,
    sessions: HashMap<String, Session>,
    reset_tokens: HashMap<String, PasswordResetToken>,
    appointments: HashMap<AppointmentId, Appointment>,
    email_logs: Vec<EmailLog>,
}

/// In-memory store implementation for testing and development.
///
/// Provides the same interface as the PostgreSQL implementation; the
/// single write lock serializes updates to any appointment id.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of audit-trail entries.
    pub async fn email_log_count(&self) -> usize {
        self.state.read().await.email_logs.len()
    }
}

fn newest_first(mut appointments: Vec<Appointment>) -> Vec<Appointment> {
    appointments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    appointments
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_user(&self, new_user: NewUser) -> Result<User> {
        let mut state = self.state.write().await;
        if state
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&new_user.email))
        {
            return Err(StoreError::DuplicateEmail);
        }

        let now = Utc::now();
        let user = User {
            id: UserId::new(),
            email: new_user.email,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            password_hash: new_user.password_hash,
            is_admin: new_user.is_admin,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .state
            .read()
            .await
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn update_user_password(&self, id: UserId, password_hash: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .get_mut(&id)
            .ok_or(StoreError::UserNotFound(id))?;
        user.password_hash = password_hash.to_string();
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn create_session(&self, session: Session) -> Result<()> {
        self.state
            .write()
            .await
            .sessions
            .insert(session.token.clone(), session);
        Ok(())
    }

    async fn get_session(&self, token: &str) -> Result<Option<Session>> {
        Ok(self.state.read().await.sessions.get(token).cloned())
    }

    async fn save_reset_token(&self, token: PasswordResetToken) -> Result<()> {
        let mut state = self.state.write().await;
        let user_id = token.user_id;
        state.reset_tokens.retain(|_, t| t.user_id != user_id);
        state.reset_tokens.insert(token.token.clone(), token);
        Ok(())
    }

    async fn get_reset_token(&self, token: &str) -> Result<Option<PasswordResetToken>> {
        Ok(self.state.read().await.reset_tokens.get(token).cloned())
    }

    async fn delete_reset_token(&self, token: &str) -> Result<()> {
        self.state.write().await.reset_tokens.remove(token);
        Ok(())
    }

    async fn create_appointment(&self, appointment: Appointment) -> Result<Appointment> {
        self.state
            .write()
            .await
            .appointments
            .insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn get_appointment(&self, id: AppointmentId) -> Result<Option<Appointment>> {
        Ok(self.state.read().await.appointments.get(&id).cloned())
    }

    async fn update_appointment(
        &self,
        id: AppointmentId,
        update: AppointmentUpdate,
    ) -> Result<Appointment> {
        let mut state = self.state.write().await;
        let appointment = state
            .appointments
            .get_mut(&id)
            .ok_or(StoreError::AppointmentNotFound(id))?;
        appointment.apply_update(&update, Utc::now())?;
        Ok(appointment.clone())
    }

    async fn appointments_for_user(&self, user_id: UserId) -> Result<Vec<Appointment>> {
        let state = self.state.read().await;
        Ok(newest_first(
            state
                .appointments
                .values()
                .filter(|a| a.user_id == user_id)
                .cloned()
                .collect(),
        ))
    }

    async fn appointments_by_status(&self, status: AppointmentStatus) -> Result<Vec<Appointment>> {
        let state = self.state.read().await;
        Ok(newest_first(
            state
                .appointments
                .values()
                .filter(|a| a.status == status)
                .cloned()
                .collect(),
        ))
    }

    async fn all_appointments(&self) -> Result<Vec<Appointment>> {
        let state = self.state.read().await;
        Ok(newest_first(state.appointments.values().cloned().collect()))
    }

    async fn appointment_by_envelope(&self, envelope_id: &str) -> Result<Option<Appointment>> {
        Ok(self
            .state
            .read()
            .await
            .appointments
            .values()
            .find(|a| a.envelope_id.as_deref() == Some(envelope_id))
            .cloned())
    }

    async fn appointment_stats(&self) -> Result<AppointmentStats> {
        let state = self.state.read().await;
        Ok(fold_stats(state.appointments.values()))
    }

    async fn log_email(&self, entry: NewEmailLog) -> Result<EmailLog> {
        let log = EmailLog {
            id: Uuid::new_v4(),
            appointment_id: entry.appointment_id,
            email_type: entry.email_type,
            sent_to: entry.sent_to,
            status: entry.status,
            sent_at: Utc::now(),
        };
        self.state.write().await.email_logs.push(log.clone());
        Ok(log)
    }

    async fn emails_for_appointment(&self, id: AppointmentId) -> Result<Vec<EmailLog>> {
        Ok(self
            .state
            .read()
            .await
            .email_logs
            .iter()
            .filter(|l| l.appointment_id == Some(id))
            .cloned()
            .collect())
    }
}
