//! Notification gateway trait and in-memory implementation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::EmailType;

use crate::error::GatewayError;

/// A transactional email, addressed by template rather than raw body.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Confirmation {
        full_name: String,
        preferred_date: DateTime<Utc>,
    },
    Reminder {
        full_name: String,
        preferred_date: DateTime<Utc>,
    },
    Welcome {
        first_name: String,
    },
    PasswordReset {
        reset_token: String,
    },
    PasswordChanged,
}

impl Notice {
    /// The audit-trail category this notice is logged under.
    pub fn email_type(&self) -> EmailType {
        match self {
            Notice::Confirmation { .. } => EmailType::Confirmation,
            Notice::Reminder { .. } => EmailType::Reminder,
            Notice::Welcome { .. } => EmailType::Welcome,
            Notice::PasswordReset { .. } => EmailType::PasswordReset,
            Notice::PasswordChanged => EmailType::PasswordChanged,
        }
    }
}

/// Trait for dispatching transactional email.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    /// Sends a notice to the recipient immediately.
    async fn send(&self, recipient: &str, notice: Notice) -> Result<(), GatewayError>;
}

/// A dispatched email captured by the in-memory mailer.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEmail {
    pub recipient: String,
    pub notice: Notice,
}

#[derive(Debug, Default)]
struct InMemoryMailerState {
    outbox: Vec<OutboundEmail>,
    fail_on_send: bool,
}

/// In-memory mailer for tests and development. Records every dispatched
/// notice instead of sending it.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMailer {
    state: Arc<RwLock<InMemoryMailerState>>,
}

impl InMemoryMailer {
    /// Creates a new in-memory mailer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the mailer to fail every send call.
    pub fn set_fail_on_send(&self, fail: bool) {
        self.state.write().unwrap().fail_on_send = fail;
    }

    /// Number of notices dispatched.
    pub fn sent_count(&self) -> usize {
        self.state.read().unwrap().outbox.len()
    }

    /// Everything dispatched so far, in order.
    pub fn outbox(&self) -> Vec<OutboundEmail> {
        self.state.read().unwrap().outbox.clone()
    }

    /// Notices dispatched to the given recipient, in order.
    pub fn sent_to(&self, recipient: &str) -> Vec<Notice> {
        self.state
            .read()
            .unwrap()
            .outbox
            .iter()
            .filter(|email| email.recipient == recipient)
            .map(|email| email.notice.clone())
            .collect()
    }
}

#[async_trait]
impl NotificationGateway for InMemoryMailer {
    async fn send(&self, recipient: &str, notice: Notice) -> Result<(), GatewayError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_send {
            return Err(GatewayError::Unavailable("mail relay down".to_string()));
        }

        state.outbox.push(OutboundEmail {
            recipient: recipient.to_string(),
            notice,
        });
        Ok(())
    }
}
