use async_trait::async_trait;
use chrono::Utc;
use common::{AppointmentId, Money, UserId};
use domain::{
    AgreementStatus, Appointment, AppointmentStats, AppointmentStatus, AppointmentUpdate,
    DeliveryStatus, EmailLog, EmailType, NewEmailLog, NewUser, PasswordResetToken, PaymentStatus,
    Session, User,
};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::store::{Store, fold_stats};

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_user(row: &PgRow) -> Result<User> {
        Ok(User {
            id: UserId::from_uuid(row.try_get::<Uuid, _>("id")?),
            email: row.try_get("email")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            password_hash: row.try_get("password_hash")?,
            is_admin: row.try_get("is_admin")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_appointment(row: &PgRow) -> Result<Appointment> {
        let status: String = row.try_get("status")?;
        let payment_status: String = row.try_get("payment_status")?;
        let agreement_status: String = row.try_get("agreement_status")?;

        Ok(Appointment {
            id: AppointmentId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            full_name: row.try_get("full_name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            address: row.try_get("address")?,
            preferred_date: row.try_get("preferred_date")?,
            preferred_time: row.try_get("preferred_time")?,
            status: AppointmentStatus::parse(&status)
                .ok_or_else(|| StoreError::Corrupt(format!("unknown status '{status}'")))?,
            payment_status: PaymentStatus::parse(&payment_status).ok_or_else(|| {
                StoreError::Corrupt(format!("unknown payment status '{payment_status}'"))
            })?,
            payment_amount: Money::from_cents(row.try_get("payment_amount_cents")?),
            payment_id: row.try_get("payment_id")?,
            agreement_status: AgreementStatus::parse(&agreement_status).ok_or_else(|| {
                StoreError::Corrupt(format!("unknown agreement status '{agreement_status}'"))
            })?,
            envelope_id: row.try_get("envelope_id")?,
            is_ready: row.try_get("is_ready")?,
            reminder_sent: row.try_get("reminder_sent")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_email_log(row: &PgRow) -> Result<EmailLog> {
        let email_type: String = row.try_get("email_type")?;
        let status: String = row.try_get("status")?;

        Ok(EmailLog {
            id: row.try_get("id")?,
            appointment_id: row
                .try_get::<Option<Uuid>, _>("appointment_id")?
                .map(AppointmentId::from_uuid),
            email_type: EmailType::parse(&email_type)
                .ok_or_else(|| StoreError::Corrupt(format!("unknown email type '{email_type}'")))?,
            sent_to: row.try_get("sent_to")?,
            status: DeliveryStatus::parse(&status)
                .ok_or_else(|| StoreError::Corrupt(format!("unknown delivery status '{status}'")))?,
            sent_at: row.try_get("sent_at")?,
        })
    }

    fn row_to_reset_token(row: &PgRow) -> Result<PasswordResetToken> {
        Ok(PasswordResetToken {
            token: row.try_get("token")?,
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            expires_at: row.try_get("expires_at")?,
            created_at: row.try_get("created_at")?,
        })
    }

    async fn list_appointments(&self, sql: &str, bind: Option<&str>) -> Result<Vec<Appointment>> {
        let mut query = sqlx::query(sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_appointment).collect()
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn create_user(&self, new_user: NewUser) -> Result<User> {
        let now = Utc::now();
        let id = UserId::new();

        sqlx::query(
            r#"
            INSERT INTO users (id, email, first_name, last_name, password_hash, is_admin, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(id.as_uuid())
        .bind(&new_user.email)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(&new_user.password_hash)
        .bind(new_user.is_admin)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("users_email_key")
            {
                return StoreError::DuplicateEmail;
            }
            StoreError::Database(e)
        })?;

        Ok(User {
            id,
            email: new_user.email,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            password_hash: new_user.password_hash,
            is_admin: new_user.is_admin,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_user).transpose()
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE lower(email) = lower($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_user).transpose()
    }

    async fn update_user_password(&self, id: UserId, password_hash: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(password_hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::UserNotFound(id));
        }
        Ok(())
    }

    async fn create_session(&self, session: Session) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (token, user_id, expires_at, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&session.token)
        .bind(session.user_id.as_uuid())
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_session(&self, token: &str) -> Result<Option<Session>> {
        let row = sqlx::query("SELECT * FROM sessions WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            Ok(Session {
                token: row.try_get("token")?,
                user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
                expires_at: row.try_get("expires_at")?,
                created_at: row.try_get("created_at")?,
            })
        })
        .transpose()
    }

    async fn save_reset_token(&self, token: PasswordResetToken) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // A fresh request invalidates any outstanding token for the user.
        sqlx::query("DELETE FROM password_reset_tokens WHERE user_id = $1")
            .bind(token.user_id.as_uuid())
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (token, user_id, expires_at, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&token.token)
        .bind(token.user_id.as_uuid())
        .bind(token.expires_at)
        .bind(token.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_reset_token(&self, token: &str) -> Result<Option<PasswordResetToken>> {
        let row = sqlx::query("SELECT * FROM password_reset_tokens WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_reset_token).transpose()
    }

    async fn delete_reset_token(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM password_reset_tokens WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_appointment(&self, appointment: Appointment) -> Result<Appointment> {
        sqlx::query(
            r#"
            INSERT INTO appointments (id, user_id, full_name, email, phone, address,
                preferred_date, preferred_time, status, payment_status, payment_amount_cents,
                payment_id, agreement_status, envelope_id, is_ready, reminder_sent,
                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(appointment.id.as_uuid())
        .bind(appointment.user_id.as_uuid())
        .bind(&appointment.full_name)
        .bind(&appointment.email)
        .bind(&appointment.phone)
        .bind(&appointment.address)
        .bind(appointment.preferred_date)
        .bind(&appointment.preferred_time)
        .bind(appointment.status.as_str())
        .bind(appointment.payment_status.as_str())
        .bind(appointment.payment_amount.cents())
        .bind(&appointment.payment_id)
        .bind(appointment.agreement_status.as_str())
        .bind(&appointment.envelope_id)
        .bind(appointment.is_ready)
        .bind(appointment.reminder_sent)
        .bind(appointment.created_at)
        .bind(appointment.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(appointment)
    }

    async fn get_appointment(&self, id: AppointmentId) -> Result<Option<Appointment>> {
        let row = sqlx::query("SELECT * FROM appointments WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_appointment).transpose()
    }

    async fn update_appointment(
        &self,
        id: AppointmentId,
        update: AppointmentUpdate,
    ) -> Result<Appointment> {
        // Row-level lock serializes concurrent updates to the same id.
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT * FROM appointments WHERE id = $1 FOR UPDATE")
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::AppointmentNotFound(id))?;

        let mut appointment = Self::row_to_appointment(&row)?;
        appointment.apply_update(&update, Utc::now())?;

        sqlx::query(
            r#"
            UPDATE appointments SET full_name = $2, email = $3, phone = $4, address = $5,
                preferred_date = $6, preferred_time = $7, status = $8, payment_status = $9,
                payment_id = $10, agreement_status = $11, envelope_id = $12, is_ready = $13,
                reminder_sent = $14, updated_at = $15
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(&appointment.full_name)
        .bind(&appointment.email)
        .bind(&appointment.phone)
        .bind(&appointment.address)
        .bind(appointment.preferred_date)
        .bind(&appointment.preferred_time)
        .bind(appointment.status.as_str())
        .bind(appointment.payment_status.as_str())
        .bind(&appointment.payment_id)
        .bind(appointment.agreement_status.as_str())
        .bind(&appointment.envelope_id)
        .bind(appointment.is_ready)
        .bind(appointment.reminder_sent)
        .bind(appointment.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(appointment)
    }

    async fn appointments_for_user(&self, user_id: UserId) -> Result<Vec<Appointment>> {
        let rows = sqlx::query(
            "SELECT * FROM appointments WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_appointment).collect()
    }

    async fn appointments_by_status(&self, status: AppointmentStatus) -> Result<Vec<Appointment>> {
        self.list_appointments(
            "SELECT * FROM appointments WHERE status = $1 ORDER BY created_at DESC",
            Some(status.as_str()),
        )
        .await
    }

    async fn all_appointments(&self) -> Result<Vec<Appointment>> {
        self.list_appointments("SELECT * FROM appointments ORDER BY created_at DESC", None)
            .await
    }

    async fn appointment_by_envelope(&self, envelope_id: &str) -> Result<Option<Appointment>> {
        let row = sqlx::query("SELECT * FROM appointments WHERE envelope_id = $1")
            .bind(envelope_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_appointment).transpose()
    }

    async fn appointment_stats(&self) -> Result<AppointmentStats> {
        let appointments = self.all_appointments().await?;
        Ok(fold_stats(appointments.iter()))
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

        sqlx::query(
            r#"
            INSERT INTO email_logs (id, appointment_id, email_type, sent_to, status, sent_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(log.id)
        .bind(log.appointment_id.map(|id| id.as_uuid()))
        .bind(log.email_type.as_str())
        .bind(&log.sent_to)
        .bind(log.status.as_str())
        .bind(log.sent_at)
        .execute(&self.pool)
        .await?;

        Ok(log)
    }

    async fn emails_for_appointment(&self, id: AppointmentId) -> Result<Vec<EmailLog>> {
        let rows = sqlx::query(
            "SELECT * FROM email_logs WHERE appointment_id = $1 ORDER BY sent_at",
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_email_log).collect()
    }
}
