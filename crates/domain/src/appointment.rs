//! Appointment record, lifecycle enums, and update rules.

use chrono::{DateTime, Utc};
use common::{AppointmentId, Money, UserId};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, ValidationError};

/// Fixed fee for a security audit, in cents.
pub const AUDIT_FEE: Money = Money::from_cents(22_500);

/// How far ahead of the appointment the reminder is due.
pub const REMINDER_LEAD_HOURS: i64 = 24;

/// Lifecycle state of an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    /// Parses a status from its wire/database form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AppointmentStatus::Pending),
            "confirmed" => Some(AppointmentStatus::Confirmed),
            "completed" => Some(AppointmentStatus::Completed),
            "cancelled" => Some(AppointmentStatus::Cancelled),
            _ => None,
        }
    }

    /// True for states in which a reminder may still be delivered.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Pending | AppointmentStatus::Confirmed
        )
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment state of an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "paid" => Some(PaymentStatus::Paid),
            "failed" => Some(PaymentStatus::Failed),
            "refunded" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// E-signature state of an appointment's agreement envelope.
///
/// Advances only not_sent → sent → {signed, declined}; never regresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgreementStatus {
    NotSent,
    Sent,
    Signed,
    Declined,
}

impl AgreementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgreementStatus::NotSent => "not_sent",
            AgreementStatus::Sent => "sent",
            AgreementStatus::Signed => "signed",
            AgreementStatus::Declined => "declined",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not_sent" => Some(AgreementStatus::NotSent),
            "sent" => Some(AgreementStatus::Sent),
            "signed" => Some(AgreementStatus::Signed),
            "declined" => Some(AgreementStatus::Declined),
            _ => None,
        }
    }

    /// Whether moving to `next` is a legal (forward or no-op) transition.
    pub fn can_advance_to(&self, next: AgreementStatus) -> bool {
        match self {
            AgreementStatus::NotSent => true,
            AgreementStatus::Sent => next != AgreementStatus::NotSent,
            AgreementStatus::Signed => next == AgreementStatus::Signed,
            AgreementStatus::Declined => next == AgreementStatus::Declined,
        }
    }
}

impl std::fmt::Display for AgreementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scheduled security-audit appointment tied to one user and one payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub user_id: UserId,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub preferred_date: DateTime<Utc>,
    pub preferred_time: Option<String>,
    pub status: AppointmentStatus,
    pub payment_status: PaymentStatus,
    /// Fixed at creation; updates that touch it are rejected.
    pub payment_amount: Money,
    pub payment_id: Option<String>,
    pub agreement_status: AgreementStatus,
    pub envelope_id: Option<String>,
    pub is_ready: bool,
    pub reminder_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Builds a fresh pending appointment from validated booking details.
    pub fn new(user_id: UserId, details: BookingDetails, now: DateTime<Utc>) -> Self {
        Self {
            id: AppointmentId::new(),
            user_id,
            full_name: details.full_name,
            email: details.email,
            phone: details.phone,
            address: details.address,
            preferred_date: details.preferred_date,
            preferred_time: details.preferred_time,
            status: AppointmentStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_amount: AUDIT_FEE,
            payment_id: None,
            agreement_status: AgreementStatus::NotSent,
            envelope_id: None,
            is_ready: details.is_ready,
            reminder_sent: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// The point in time at which the reminder becomes due.
    pub fn reminder_due_at(&self) -> DateTime<Utc> {
        self.preferred_date - chrono::Duration::hours(REMINDER_LEAD_HOURS)
    }

    /// Merges a partial update into this appointment, enforcing lifecycle
    /// invariants. On success `updated_at` is set to `now`; on error the
    /// appointment is left unchanged.
    pub fn apply_update(
        &mut self,
        update: &AppointmentUpdate,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if update.payment_amount.is_some() {
            return Err(DomainError::AmountImmutable);
        }
        if let Some(next) = update.agreement_status
            && !self.agreement_status.can_advance_to(next)
        {
            return Err(DomainError::AgreementRegression {
                from: self.agreement_status,
                to: next,
            });
        }

        let mut merged = self.clone();
        if let Some(ref v) = update.full_name {
            merged.full_name = v.clone();
        }
        if let Some(ref v) = update.email {
            merged.email = v.clone();
        }
        if let Some(ref v) = update.phone {
            merged.phone = v.clone();
        }
        if let Some(ref v) = update.address {
            merged.address = v.clone();
        }
        if let Some(v) = update.preferred_date {
            merged.preferred_date = v;
        }
        if let Some(ref v) = update.preferred_time {
            merged.preferred_time = Some(v.clone());
        }
        if let Some(v) = update.status {
            merged.status = v;
        }
        if let Some(v) = update.payment_status {
            merged.payment_status = v;
        }
        if let Some(ref v) = update.payment_id {
            merged.payment_id = Some(v.clone());
        }
        if let Some(v) = update.agreement_status {
            merged.agreement_status = v;
        }
        if let Some(ref v) = update.envelope_id {
            merged.envelope_id = Some(v.clone());
        }
        if let Some(v) = update.is_ready {
            merged.is_ready = v;
        }
        if let Some(v) = update.reminder_sent {
            merged.reminder_sent = v;
        }

        if merged.status == AppointmentStatus::Confirmed
            && merged.payment_status != PaymentStatus::Paid
        {
            return Err(DomainError::ConfirmedWithoutPayment);
        }
        if merged.payment_status == PaymentStatus::Paid && merged.payment_id.is_none() {
            return Err(DomainError::PaidWithoutTransaction);
        }

        merged.updated_at = now;
        *self = merged;
        Ok(())
    }
}

/// Booking input as submitted by the user, validated before any side effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingDetails {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub preferred_date: DateTime<Utc>,
    #[serde(default)]
    pub preferred_time: Option<String>,
    #[serde(default)]
    pub is_ready: bool,
}

impl BookingDetails {
    /// Validates the appointment shape. Mirrors the signup form rules:
    /// name >= 2 chars, plausible email, phone >= 10 chars, address >= 5
    /// chars, and the readiness confirmation checked.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.full_name.trim().len() < 2 {
            return Err(ValidationError::FullNameRequired);
        }
        if !is_plausible_email(&self.email) {
            return Err(ValidationError::InvalidEmail);
        }
        if self.phone.trim().len() < 10 {
            return Err(ValidationError::PhoneRequired);
        }
        if self.address.trim().len() < 5 {
            return Err(ValidationError::AddressRequired);
        }
        if !self.is_ready {
            return Err(ValidationError::NotReady);
        }
        Ok(())
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((user, host)) => !user.is_empty() && host.contains('.') && !host.starts_with('.'),
        None => false,
    }
}

/// Partial update applied to an appointment; unset fields are left as-is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub preferred_date: Option<DateTime<Utc>>,
    pub preferred_time: Option<String>,
    pub status: Option<AppointmentStatus>,
    pub payment_status: Option<PaymentStatus>,
    /// Always rejected; present so a PATCH carrying it fails loudly
    /// instead of being silently dropped.
    pub payment_amount: Option<String>,
    pub payment_id: Option<String>,
    pub agreement_status: Option<AgreementStatus>,
    pub envelope_id: Option<String>,
    pub is_ready: Option<bool>,
    pub reminder_sent: Option<bool>,
}

impl AppointmentUpdate {
    /// Update recorded after a successful charge.
    pub fn payment_succeeded(payment_id: impl Into<String>) -> Self {
        Self {
            status: Some(AppointmentStatus::Confirmed),
            payment_status: Some(PaymentStatus::Paid),
            payment_id: Some(payment_id.into()),
            ..Self::default()
        }
    }

    /// Update recorded after a declined or unreachable charge.
    pub fn payment_failed() -> Self {
        Self {
            payment_status: Some(PaymentStatus::Failed),
            ..Self::default()
        }
    }

    /// Update recorded after the agreement envelope goes out.
    pub fn agreement_sent(envelope_id: impl Into<String>) -> Self {
        Self {
            agreement_status: Some(AgreementStatus::Sent),
            envelope_id: Some(envelope_id.into()),
            ..Self::default()
        }
    }

    /// Update recorded from an agreement-gateway status callback.
    pub fn agreement_callback(status: AgreementStatus) -> Self {
        Self {
            agreement_status: Some(status),
            ..Self::default()
        }
    }

    /// Marks the reminder as handled (sent, or skipped as obsolete).
    pub fn reminder_handled() -> Self {
        Self {
            reminder_sent: Some(true),
            ..Self::default()
        }
    }
}

/// Aggregate counts and paid revenue across all appointments.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppointmentStats {
    pub total: u64,
    pub pending: u64,
    pub confirmed: u64,
    pub completed: u64,
    pub cancelled: u64,
    pub revenue: Money,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details() -> BookingDetails {
        BookingDetails {
            full_name: "Jane Doe".to_string(),
            email: "jane@x.com".to_string(),
            phone: "555-123-4567".to_string(),
            address: "1 Main Street, Springfield".to_string(),
            preferred_date: Utc::now() + chrono::Duration::days(7),
            preferred_time: Some("10:00".to_string()),
            is_ready: true,
        }
    }

    #[test]
    fn new_appointment_starts_pending_with_fixed_fee() {
        let appt = Appointment::new(UserId::new(), details(), Utc::now());
        assert_eq!(appt.status, AppointmentStatus::Pending);
        assert_eq!(appt.payment_status, PaymentStatus::Pending);
        assert_eq!(appt.agreement_status, AgreementStatus::NotSent);
        assert_eq!(appt.payment_amount, AUDIT_FEE);
        assert!(appt.payment_id.is_none());
        assert!(!appt.reminder_sent);
    }

    #[test]
    fn validate_rejects_each_bad_field() {
        let mut d = details();
        d.full_name = "J".to_string();
        assert_eq!(d.validate(), Err(ValidationError::FullNameRequired));

        let mut d = details();
        d.email = "not-an-email".to_string();
        assert_eq!(d.validate(), Err(ValidationError::InvalidEmail));

        let mut d = details();
        d.phone = "555".to_string();
        assert_eq!(d.validate(), Err(ValidationError::PhoneRequired));

        let mut d = details();
        d.address = "x".to_string();
        assert_eq!(d.validate(), Err(ValidationError::AddressRequired));

        let mut d = details();
        d.is_ready = false;
        assert_eq!(d.validate(), Err(ValidationError::NotReady));

        assert!(details().validate().is_ok());
    }

    #[test]
    fn payment_success_confirms_appointment() {
        let mut appt = Appointment::new(UserId::new(), details(), Utc::now());
        appt.apply_update(&AppointmentUpdate::payment_succeeded("PAY-1"), Utc::now())
            .unwrap();
        assert_eq!(appt.status, AppointmentStatus::Confirmed);
        assert_eq!(appt.payment_status, PaymentStatus::Paid);
        assert_eq!(appt.payment_id.as_deref(), Some("PAY-1"));
    }

    #[test]
    fn cannot_confirm_without_paid_status() {
        let mut appt = Appointment::new(UserId::new(), details(), Utc::now());
        let update = AppointmentUpdate {
            status: Some(AppointmentStatus::Confirmed),
            ..AppointmentUpdate::default()
        };
        let err = appt.apply_update(&update, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::ConfirmedWithoutPayment));
        assert_eq!(appt.status, AppointmentStatus::Pending);
    }

    #[test]
    fn paid_requires_transaction_id() {
        let mut appt = Appointment::new(UserId::new(), details(), Utc::now());
        let update = AppointmentUpdate {
            payment_status: Some(PaymentStatus::Paid),
            ..AppointmentUpdate::default()
        };
        let err = appt.apply_update(&update, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::PaidWithoutTransaction));
    }

    #[test]
    fn agreement_status_never_regresses() {
        let mut appt = Appointment::new(UserId::new(), details(), Utc::now());
        appt.apply_update(&AppointmentUpdate::agreement_sent("ENV-1"), Utc::now())
            .unwrap();
        appt.apply_update(
            &AppointmentUpdate::agreement_callback(AgreementStatus::Signed),
            Utc::now(),
        )
        .unwrap();

        let err = appt
            .apply_update(
                &AppointmentUpdate::agreement_callback(AgreementStatus::Sent),
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::AgreementRegression { .. }));
        assert_eq!(appt.agreement_status, AgreementStatus::Signed);
    }

    #[test]
    fn amount_is_immutable() {
        let mut appt = Appointment::new(UserId::new(), details(), Utc::now());
        let update = AppointmentUpdate {
            payment_amount: Some("99.00".to_string()),
            ..AppointmentUpdate::default()
        };
        let err = appt.apply_update(&update, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::AmountImmutable));
        assert_eq!(appt.payment_amount, AUDIT_FEE);
    }

    #[test]
    fn reminder_due_at_is_24h_before() {
        let appt = Appointment::new(UserId::new(), details(), Utc::now());
        assert_eq!(
            appt.preferred_date - appt.reminder_due_at(),
            chrono::Duration::hours(24)
        );
    }

    #[test]
    fn status_enum_round_trips_through_strings() {
        for s in [
            AppointmentStatus::Pending,
            AppointmentStatus::Confirmed,
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
        ] {
            assert_eq!(AppointmentStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(AppointmentStatus::parse("unknown"), None);
        assert_eq!(AgreementStatus::parse("not_sent"), Some(AgreementStatus::NotSent));
    }
}
