//! Durable reminder delivery.
//!
//! No schedule rows exist: an appointment is due for a reminder exactly
//! when it is confirmed, not yet reminded, and within the 24-hour lead
//! window of its date. The worker polls the store on an interval, so
//! reminders survive process restarts.

use std::time::Duration;

use chrono::{DateTime, Utc};
use domain::{Appointment, AppointmentStatus, AppointmentUpdate, EmailType, NewEmailLog};
use store::Store;

use crate::services::notification::{Notice, NotificationGateway};

/// Polls the store and dispatches due appointment reminders.
pub struct ReminderWorker<S, N>
where
    S: Store,
    N: NotificationGateway,
{
    store: S,
    notifier: N,
    poll_interval: Duration,
}

impl<S, N> ReminderWorker<S, N>
where
    S: Store,
    N: NotificationGateway,
{
    /// Creates a reminder worker polling at the given interval.
    pub fn new(store: S, notifier: N, poll_interval: Duration) -> Self {
        Self {
            store,
            notifier,
            poll_interval,
        }
    }

    /// Runs the polling loop until the task is aborted.
    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(err) = self.tick(Utc::now()).await {
                tracing::error!(error = %err, "reminder sweep failed");
            }
        }
    }

    /// One sweep: finds every appointment whose reminder is due at `now`
    /// and dispatches it. Returns the number of reminders sent.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<usize, store::StoreError> {
        let confirmed = self
            .store
            .appointments_by_status(AppointmentStatus::Confirmed)
            .await?;

        let mut sent = 0;
        for appointment in confirmed {
            if appointment.reminder_sent || appointment.reminder_due_at() > now {
                continue;
            }
            // The date itself has already passed; mark the reminder
            // handled so the sweep stops listing it.
            if appointment.preferred_date <= now {
                self.mark_handled(&appointment).await?;
                continue;
            }
            if self.dispatch(&appointment).await? {
                sent += 1;
            }
        }
        Ok(sent)
    }

    async fn dispatch(&self, appointment: &Appointment) -> Result<bool, store::StoreError> {
        // Re-check right before sending: an admin may have cancelled or
        // completed the appointment since the sweep listed it.
        let Some(current) = self.store.get_appointment(appointment.id).await? else {
            return Ok(false);
        };
        if current.reminder_sent {
            return Ok(false);
        }
        if !current.status.is_active() {
            self.mark_handled(&current).await?;
            return Ok(false);
        }

        let notice = Notice::Reminder {
            full_name: current.full_name.clone(),
            preferred_date: current.preferred_date,
        };
        let entry = match self.notifier.send(&current.email, notice).await {
            Ok(()) => {
                tracing::info!(appointment_id = %current.id, "reminder sent");
                NewEmailLog::sent(Some(current.id), EmailType::Reminder, &current.email)
            }
            Err(err) => {
                // Leave reminder_sent unset so the next sweep retries.
                tracing::warn!(appointment_id = %current.id, error = %err, "reminder dispatch failed");
                self.store
                    .log_email(NewEmailLog::failed(
                        Some(current.id),
                        EmailType::Reminder,
                        &current.email,
                    ))
                    .await?;
                return Ok(false);
            }
        };
        self.store.log_email(entry).await?;
        self.store
            .update_appointment(current.id, AppointmentUpdate::reminder_handled())
            .await?;
        metrics::counter!("reminders_sent_total").increment(1);
        Ok(true)
    }

    async fn mark_handled(&self, appointment: &Appointment) -> Result<(), store::StoreError> {
        tracing::info!(appointment_id = %appointment.id, "skipping obsolete reminder");
        self.store
            .update_appointment(appointment.id, AppointmentUpdate::reminder_handled())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::UserId;
    use domain::{Appointment, BookingDetails, DeliveryStatus};
    use store::InMemoryStore;

    use crate::services::notification::InMemoryMailer;

    fn confirmed_appointment(hours_out: i64) -> Appointment {
        let details = BookingDetails {
            full_name: "Jane Doe".to_string(),
            email: "jane@x.com".to_string(),
            phone: "555-123-4567".to_string(),
            address: "1 Main Street, Springfield".to_string(),
            preferred_date: Utc::now() + chrono::Duration::hours(hours_out),
            preferred_time: None,
            is_ready: true,
        };
        Appointment::new(UserId::new(), details, Utc::now())
    }

    async fn seed_confirmed(store: &InMemoryStore, hours_out: i64) -> Appointment {
        let appt = confirmed_appointment(hours_out);
        let appt = store.create_appointment(appt).await.unwrap();
        store
            .update_appointment(appt.id, AppointmentUpdate::payment_succeeded("PAY-1"))
            .await
            .unwrap()
    }

    fn worker(store: InMemoryStore, mailer: InMemoryMailer) -> ReminderWorker<InMemoryStore, InMemoryMailer> {
        ReminderWorker::new(store, mailer, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_due_reminder_is_sent_once() {
        let store = InMemoryStore::new();
        let mailer = InMemoryMailer::new();
        // 12h out, inside the 24h lead window.
        let appt = seed_confirmed(&store, 12).await;

        let w = worker(store.clone(), mailer.clone());
        assert_eq!(w.tick(Utc::now()).await.unwrap(), 1);

        let sent = mailer.sent_to("jane@x.com");
        assert_eq!(sent.len(), 1);
        assert!(matches!(sent[0], Notice::Reminder { .. }));

        let current = store.get_appointment(appt.id).await.unwrap().unwrap();
        assert!(current.reminder_sent);

        let emails = store.emails_for_appointment(appt.id).await.unwrap();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].email_type, EmailType::Reminder);

        // A second sweep finds nothing to do.
        assert_eq!(w.tick(Utc::now()).await.unwrap(), 0);
        assert_eq!(mailer.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_not_yet_due_reminder_waits() {
        let store = InMemoryStore::new();
        let mailer = InMemoryMailer::new();
        seed_confirmed(&store, 24 * 7).await;

        let w = worker(store.clone(), mailer.clone());
        assert_eq!(w.tick(Utc::now()).await.unwrap(), 0);
        assert_eq!(mailer.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_appointment_gets_no_reminder() {
        let store = InMemoryStore::new();
        let mailer = InMemoryMailer::new();
        let appt = seed_confirmed(&store, 12).await;

        store
            .update_appointment(
                appt.id,
                AppointmentUpdate {
                    status: Some(AppointmentStatus::Cancelled),
                    ..AppointmentUpdate::default()
                },
            )
            .await
            .unwrap();

        let w = worker(store.clone(), mailer.clone());
        assert_eq!(w.tick(Utc::now()).await.unwrap(), 0);
        assert_eq!(mailer.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_rechecks_status_before_sending() {
        let store = InMemoryStore::new();
        let mailer = InMemoryMailer::new();
        let appt = seed_confirmed(&store, 12).await;

        let w = worker(store.clone(), mailer.clone());
        // Cancellation lands after the sweep listed the appointment but
        // before dispatch.
        let cancelled = store
            .update_appointment(
                appt.id,
                AppointmentUpdate {
                    status: Some(AppointmentStatus::Cancelled),
                    ..AppointmentUpdate::default()
                },
            )
            .await
            .unwrap();

        assert!(!w.dispatch(&cancelled).await.unwrap());
        assert_eq!(mailer.sent_count(), 0);

        // Marked handled so future sweeps never reconsider it.
        let current = store.get_appointment(appt.id).await.unwrap().unwrap();
        assert!(current.reminder_sent);
    }

    #[tokio::test]
    async fn test_past_appointment_is_marked_without_sending() {
        let store = InMemoryStore::new();
        let mailer = InMemoryMailer::new();
        // Date already two hours in the past.
        let appt = seed_confirmed(&store, -2).await;

        let w = worker(store.clone(), mailer.clone());
        assert_eq!(w.tick(Utc::now()).await.unwrap(), 0);
        assert_eq!(mailer.sent_count(), 0);

        let current = store.get_appointment(appt.id).await.unwrap().unwrap();
        assert!(current.reminder_sent);
    }

    #[tokio::test]
    async fn test_failed_dispatch_retries_next_sweep() {
        let store = InMemoryStore::new();
        let mailer = InMemoryMailer::new();
        let appt = seed_confirmed(&store, 12).await;

        mailer.set_fail_on_send(true);
        let w = worker(store.clone(), mailer.clone());
        assert_eq!(w.tick(Utc::now()).await.unwrap(), 0);

        let current = store.get_appointment(appt.id).await.unwrap().unwrap();
        assert!(!current.reminder_sent);
        let emails = store.emails_for_appointment(appt.id).await.unwrap();
        assert_eq!(emails[0].status, DeliveryStatus::Failed);

        mailer.set_fail_on_send(false);
        assert_eq!(w.tick(Utc::now()).await.unwrap(), 1);
        assert_eq!(mailer.sent_count(), 1);
    }
}
