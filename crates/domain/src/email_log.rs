//! Append-only audit trail of dispatched notifications.

use chrono::{DateTime, Utc};
use common::AppointmentId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of transactional email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailType {
    Confirmation,
    Reminder,
    Welcome,
    PasswordReset,
    PasswordChanged,
}

impl EmailType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailType::Confirmation => "confirmation",
            EmailType::Reminder => "reminder",
            EmailType::Welcome => "welcome",
            EmailType::PasswordReset => "password_reset",
            EmailType::PasswordChanged => "password_changed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "confirmation" => Some(EmailType::Confirmation),
            "reminder" => Some(EmailType::Reminder),
            "welcome" => Some(EmailType::Welcome),
            "password_reset" => Some(EmailType::PasswordReset),
            "password_changed" => Some(EmailType::PasswordChanged),
            _ => None,
        }
    }
}

impl std::fmt::Display for EmailType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the dispatch attempt succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sent" => Some(DeliveryStatus::Sent),
            "failed" => Some(DeliveryStatus::Failed),
            _ => None,
        }
    }
}

/// One row of the notification audit trail. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailLog {
    pub id: Uuid,
    /// Absent for account-level mail (welcome, password reset).
    pub appointment_id: Option<AppointmentId>,
    pub email_type: EmailType,
    pub sent_to: String,
    pub status: DeliveryStatus,
    pub sent_at: DateTime<Utc>,
}

/// Input for appending to the audit trail.
#[derive(Debug, Clone)]
pub struct NewEmailLog {
    pub appointment_id: Option<AppointmentId>,
    pub email_type: EmailType,
    pub sent_to: String,
    pub status: DeliveryStatus,
}

impl NewEmailLog {
    pub fn sent(
        appointment_id: Option<AppointmentId>,
        email_type: EmailType,
        sent_to: impl Into<String>,
    ) -> Self {
        Self {
            appointment_id,
            email_type,
            sent_to: sent_to.into(),
            status: DeliveryStatus::Sent,
        }
    }

    pub fn failed(
        appointment_id: Option<AppointmentId>,
        email_type: EmailType,
        sent_to: impl Into<String>,
    ) -> Self {
        Self {
            appointment_id,
            email_type,
            sent_to: sent_to.into(),
            status: DeliveryStatus::Failed,
        }
    }
}
