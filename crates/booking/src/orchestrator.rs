//! Booking orchestrator: turns a booking request into a confirmed,
//! paid appointment.

use std::time::Duration;

use chrono::Utc;
use common::UserId;
use domain::{Appointment, AppointmentUpdate, BookingDetails, NewEmailLog};
use store::{Store, StoreError};

use crate::error::{BookingError, GatewayError};
use crate::services::agreement::AgreementGateway;
use crate::services::notification::{Notice, NotificationGateway};
use crate::services::payment::{ChargeRequest, PaymentGateway};

/// A charge left pending past this bound counts as failed.
const PAYMENT_TIMEOUT: Duration = Duration::from_secs(30);

/// A booking submission: validated appointment details plus a single-use
/// payment method token.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub details: BookingDetails,
    pub payment_token: String,
}

/// Coordinates the store and the three gateways for one booking.
///
/// Payment failure is the only fatal path. Agreement dispatch and the
/// confirmation email are best-effort: their failures are logged and
/// recorded in the audit trail, never surfaced to the caller.
pub struct BookingOrchestrator<S, P, A, N>
where
    S: Store,
    P: PaymentGateway,
    A: AgreementGateway,
    N: NotificationGateway,
{
    store: S,
    payment: P,
    agreement: A,
    notifier: N,
}

impl<S, P, A, N> BookingOrchestrator<S, P, A, N>
where
    S: Store,
    P: PaymentGateway,
    A: AgreementGateway,
    N: NotificationGateway,
{
    /// Creates a new booking orchestrator.
    pub fn new(store: S, payment: P, agreement: A, notifier: N) -> Self {
        Self {
            store,
            payment,
            agreement,
            notifier,
        }
    }

    /// Books an appointment for the given user.
    ///
    /// On success the returned appointment is confirmed and paid. On a
    /// payment failure the pending appointment record is retained with
    /// `payment_status = failed` and the error is returned.
    #[tracing::instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn book(
        &self,
        user_id: UserId,
        request: BookingRequest,
    ) -> Result<Appointment, BookingError> {
        metrics::counter!("bookings_total").increment(1);
        let start = std::time::Instant::now();

        // 1. Validate before any side effect.
        request.details.validate()?;

        // 2. Persist the pending record before touching any gateway, so a
        //    failed charge still leaves an auditable row.
        let appointment = self
            .store
            .create_appointment(Appointment::new(user_id, request.details, Utc::now()))
            .await?;
        let appointment_id = appointment.id;
        tracing::info!(appointment_id = %appointment_id, "appointment created");

        // 3. Charge, keyed by the appointment id so retries cannot
        //    double-charge.
        let charge = ChargeRequest {
            amount: appointment.payment_amount,
            currency: "USD".to_string(),
            source_token: request.payment_token,
            reference_id: appointment_id.to_string(),
        };
        let outcome = match tokio::time::timeout(PAYMENT_TIMEOUT, self.payment.charge(charge)).await
        {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => return self.record_payment_failure(appointment_id, err).await,
            Err(_) => {
                let err = GatewayError::Unavailable("payment charge timed out".to_string());
                return self.record_payment_failure(appointment_id, err).await;
            }
        };

        self.store
            .update_appointment(
                appointment_id,
                AppointmentUpdate::payment_succeeded(outcome.payment_id),
            )
            .await?;
        tracing::info!(appointment_id = %appointment_id, "payment captured, appointment confirmed");

        // 4/5. Best-effort side effects; neither depends on the other.
        let (_, _) = tokio::join!(
            self.send_agreement(&appointment),
            self.send_confirmation(&appointment),
        );

        // 6. The reminder worker derives due-ness from the row itself. If
        //    the reminder window has already passed, mark it handled now so
        //    the worker never fires a stale reminder.
        if appointment.reminder_due_at() <= Utc::now() {
            self.store
                .update_appointment(appointment_id, AppointmentUpdate::reminder_handled())
                .await?;
        }

        // 7. Return the reloaded record, reflecting whichever side effects
        //    landed.
        let confirmed = self
            .store
            .get_appointment(appointment_id)
            .await?
            .ok_or(StoreError::AppointmentNotFound(appointment_id))?;

        metrics::histogram!("booking_duration_seconds").record(start.elapsed().as_secs_f64());
        Ok(confirmed)
    }

    async fn record_payment_failure(
        &self,
        appointment_id: common::AppointmentId,
        err: GatewayError,
    ) -> Result<Appointment, BookingError> {
        metrics::counter!("bookings_payment_failed_total").increment(1);
        tracing::warn!(appointment_id = %appointment_id, error = %err, "payment failed");
        self.store
            .update_appointment(appointment_id, AppointmentUpdate::payment_failed())
            .await?;
        Err(BookingError::Payment(err))
    }

    async fn send_agreement(&self, appointment: &Appointment) {
        let result = self
            .agreement
            .send_for_signature(
                &appointment.email,
                &appointment.full_name,
                &appointment.id.to_string(),
            )
            .await;

        match result {
            Ok(envelope) => {
                tracing::info!(
                    appointment_id = %appointment.id,
                    envelope_id = %envelope.envelope_id,
                    "agreement sent for signature"
                );
                if let Err(err) = self
                    .store
                    .update_appointment(
                        appointment.id,
                        AppointmentUpdate::agreement_sent(envelope.envelope_id),
                    )
                    .await
                {
                    tracing::warn!(appointment_id = %appointment.id, error = %err, "failed to record agreement envelope");
                }
            }
            Err(err) => {
                tracing::warn!(appointment_id = %appointment.id, error = %err, "agreement dispatch failed");
            }
        }
    }

    async fn send_confirmation(&self, appointment: &Appointment) {
        let notice = Notice::Confirmation {
            full_name: appointment.full_name.clone(),
            preferred_date: appointment.preferred_date,
        };
        let entry = match self.notifier.send(&appointment.email, notice).await {
            Ok(()) => NewEmailLog::sent(
                Some(appointment.id),
                domain::EmailType::Confirmation,
                &appointment.email,
            ),
            Err(err) => {
                tracing::warn!(appointment_id = %appointment.id, error = %err, "confirmation email failed");
                NewEmailLog::failed(
                    Some(appointment.id),
                    domain::EmailType::Confirmation,
                    &appointment.email,
                )
            }
        };
        if let Err(err) = self.store.log_email(entry).await {
            tracing::warn!(appointment_id = %appointment.id, error = %err, "failed to append email audit entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use domain::{
        AUDIT_FEE, AgreementStatus, AppointmentStatus, DeliveryStatus, EmailType, PaymentStatus,
        ValidationError,
    };
    use store::InMemoryStore;

    use crate::services::agreement::InMemoryAgreementGateway;
    use crate::services::notification::InMemoryMailer;
    use crate::services::payment::{ChargeOutcome, InMemoryPaymentGateway};

    type TestOrchestrator = BookingOrchestrator<
        InMemoryStore,
        InMemoryPaymentGateway,
        InMemoryAgreementGateway,
        InMemoryMailer,
    >;

    struct Harness {
        orchestrator: TestOrchestrator,
        store: InMemoryStore,
        payment: InMemoryPaymentGateway,
        agreement: InMemoryAgreementGateway,
        mailer: InMemoryMailer,
    }

    fn harness() -> Harness {
        let store = InMemoryStore::new();
        let payment = InMemoryPaymentGateway::new();
        let agreement = InMemoryAgreementGateway::new();
        let mailer = InMemoryMailer::new();
        let orchestrator = BookingOrchestrator::new(
            store.clone(),
            payment.clone(),
            agreement.clone(),
            mailer.clone(),
        );
        Harness {
            orchestrator,
            store,
            payment,
            agreement,
            mailer,
        }
    }

    fn request() -> BookingRequest {
        BookingRequest {
            details: BookingDetails {
                full_name: "Jane Doe".to_string(),
                email: "jane@x.com".to_string(),
                phone: "555-123-4567".to_string(),
                address: "1 Main Street, Springfield".to_string(),
                preferred_date: Utc::now() + chrono::Duration::days(7),
                preferred_time: Some("10:00".to_string()),
                is_ready: true,
            },
            payment_token: "tok_visa".to_string(),
        }
    }

    #[tokio::test]
    async fn test_successful_booking_confirms_and_pays() {
        let h = harness();

        let appt = h.orchestrator.book(UserId::new(), request()).await.unwrap();

        assert_eq!(appt.status, AppointmentStatus::Confirmed);
        assert_eq!(appt.payment_status, PaymentStatus::Paid);
        assert_eq!(appt.payment_amount, AUDIT_FEE);
        assert!(appt.payment_id.is_some());
        assert_eq!(appt.agreement_status, AgreementStatus::Sent);
        assert!(appt.envelope_id.is_some());
        assert!(!appt.reminder_sent);

        assert_eq!(h.payment.payment_count(), 1);
        assert_eq!(h.agreement.envelope_count(), 1);

        let emails = h.store.emails_for_appointment(appt.id).await.unwrap();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].email_type, EmailType::Confirmation);
        assert_eq!(emails[0].sent_to, "jane@x.com");
        assert_eq!(emails[0].status, DeliveryStatus::Sent);
        assert_eq!(h.mailer.sent_to("jane@x.com").len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_details_create_no_record() {
        let h = harness();
        let mut req = request();
        req.details.is_ready = false;

        let err = h.orchestrator.book(UserId::new(), req).await.unwrap_err();
        assert!(matches!(
            err,
            BookingError::Validation(ValidationError::NotReady)
        ));

        assert!(h.store.all_appointments().await.unwrap().is_empty());
        assert_eq!(h.payment.charge_calls(), 0);
    }

    #[tokio::test]
    async fn test_declined_payment_retains_pending_record() {
        let h = harness();
        let mut req = request();
        req.payment_token = "declined_tok".to_string();

        let err = h.orchestrator.book(UserId::new(), req).await.unwrap_err();
        assert!(matches!(
            err,
            BookingError::Payment(GatewayError::Declined(_))
        ));

        let appointments = h.store.all_appointments().await.unwrap();
        assert_eq!(appointments.len(), 1);
        assert_eq!(appointments[0].status, AppointmentStatus::Pending);
        assert_eq!(appointments[0].payment_status, PaymentStatus::Failed);
        assert!(appointments[0].payment_id.is_none());

        // Steps after payment never ran.
        assert_eq!(h.agreement.envelope_count(), 0);
        assert_eq!(h.mailer.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_agreement_failure_does_not_fail_booking() {
        let h = harness();
        h.agreement.set_fail_on_send(true);

        let appt = h.orchestrator.book(UserId::new(), request()).await.unwrap();

        assert_eq!(appt.status, AppointmentStatus::Confirmed);
        assert_eq!(appt.payment_status, PaymentStatus::Paid);
        assert_eq!(appt.agreement_status, AgreementStatus::NotSent);
        assert!(appt.envelope_id.is_none());

        // Confirmation email still went out.
        assert_eq!(h.mailer.sent_to("jane@x.com").len(), 1);
    }

    #[tokio::test]
    async fn test_email_failure_is_recorded_not_surfaced() {
        let h = harness();
        h.mailer.set_fail_on_send(true);

        let appt = h.orchestrator.book(UserId::new(), request()).await.unwrap();

        assert_eq!(appt.status, AppointmentStatus::Confirmed);
        assert_eq!(appt.agreement_status, AgreementStatus::Sent);

        let emails = h.store.emails_for_appointment(appt.id).await.unwrap();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].status, DeliveryStatus::Failed);
    }

    /// A gateway whose charge never resolves, standing in for a hung
    /// payment processor.
    struct HangingPaymentGateway;

    #[async_trait]
    impl PaymentGateway for HangingPaymentGateway {
        async fn charge(&self, _request: ChargeRequest) -> Result<ChargeOutcome, GatewayError> {
            std::future::pending().await
        }

        async fn refund(&self, _payment_id: &str) -> Result<(), GatewayError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_charge_times_out_as_payment_failure() {
        let store = InMemoryStore::new();
        let orchestrator = BookingOrchestrator::new(
            store.clone(),
            HangingPaymentGateway,
            InMemoryAgreementGateway::new(),
            InMemoryMailer::new(),
        );

        // Paused time auto-advances past the charge timeout once the
        // runtime has nothing else to run.
        let err = orchestrator
            .book(UserId::new(), request())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BookingError::Payment(GatewayError::Unavailable(_))
        ));

        let appointments = store.all_appointments().await.unwrap();
        assert_eq!(appointments.len(), 1);
        assert_eq!(appointments[0].status, AppointmentStatus::Pending);
        assert_eq!(appointments[0].payment_status, PaymentStatus::Failed);
        assert!(appointments[0].payment_id.is_none());
    }

    #[tokio::test]
    async fn test_imminent_appointment_skips_reminder() {
        let h = harness();
        let mut req = request();
        // Less than 24h out, so the reminder window has already passed.
        req.details.preferred_date = Utc::now() + chrono::Duration::hours(3);

        let appt = h.orchestrator.book(UserId::new(), req).await.unwrap();

        assert_eq!(appt.status, AppointmentStatus::Confirmed);
        assert!(appt.reminder_sent);
    }
}
