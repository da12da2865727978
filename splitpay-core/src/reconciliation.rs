//! Reconciliation Engine.
//!
//! Payment completion is reported twice, in no particular order: once by the
//! payer's browser after the gateway redirect, once by the gateway webhook.
//! Both land in [`ReconciliationEngine::handle_payment_outcome`], which
//! re-verifies the outcome with the gateway, applies it through the ledger's
//! conditional write, and confirms the booking once every share is paid.
//!
//! Nothing here holds a lock. Concurrent duplicates race on
//! `pending -> paid`; the loser sees `AlreadyTerminal` and still runs the
//! completion check, so a crash between marking paid and confirming heals on
//! the next delivery.

use crate::booking::{BookingAggregate, BookingError, CancelOutcome};
use crate::entities::booking::Booking;
use crate::entities::split_request::SplitPaymentRequest;
use crate::entities::{BookingStatus, SplitStatus};
use crate::events::{DomainEvent, DomainEventSender};
use crate::gateway::{
    GatewayError, GatewayVerification, InitiatePayment, PaymentGateway, PaymentInitiation,
    PaymentOutcome,
};
use crate::ledger::{LedgerError, MarkExpiredOutcome, MarkPaidOutcome, SplitLedger};
use crate::store::{SplitStore, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The gateway did not confirm the reported payment; nothing was changed.
    #[error("payment verification failed: {0}")]
    VerificationFailed(String),

    #[error("split payment request {0} has expired")]
    RequestExpired(Uuid),

    #[error("split payment request {0} is already paid")]
    RequestAlreadyPaid(Uuid),

    /// The gateway reference already settled a different request.
    #[error("payment reference {0} is already applied to another request")]
    ReferenceAlreadyUsed(String),

    #[error("split payment request not found: {0}")]
    RequestNotFound(Uuid),

    #[error("booking not found: {0}")]
    BookingNotFound(Uuid),

    #[error("booking {0} is already confirmed")]
    BookingAlreadyConfirmed(Uuid),

    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("ledger error: {0}")]
    Ledger(LedgerError),

    #[error("booking error: {0}")]
    Booking(BookingError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl ReconcileError {
    /// Whether a webhook that produced this error should still be answered
    /// with 2xx.
    ///
    /// Only failures a later retry could fix are surfaced to the gateway.
    pub fn acknowledges_webhook(&self) -> bool {
        match self {
            ReconcileError::RequestExpired(_)
            | ReconcileError::RequestAlreadyPaid(_)
            | ReconcileError::ReferenceAlreadyUsed(_)
            | ReconcileError::RequestNotFound(_)
            | ReconcileError::BookingNotFound(_)
            | ReconcileError::BookingAlreadyConfirmed(_) => true,
            ReconcileError::VerificationFailed(_)
            | ReconcileError::Gateway(_)
            | ReconcileError::Ledger(_)
            | ReconcileError::Booking(_)
            | ReconcileError::Store(_) => false,
        }
    }
}

impl From<LedgerError> for ReconcileError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::RequestNotFound(id) => ReconcileError::RequestNotFound(id),
            LedgerError::BookingNotFound(id) => ReconcileError::BookingNotFound(id),
            LedgerError::ReferenceAlreadyUsed(reference) => {
                ReconcileError::ReferenceAlreadyUsed(reference)
            }
            LedgerError::Store(e) => ReconcileError::Store(e),
            other => ReconcileError::Ledger(other),
        }
    }
}

impl From<BookingError> for ReconcileError {
    fn from(value: BookingError) -> Self {
        match value {
            BookingError::NotFound(id) => ReconcileError::BookingNotFound(id),
            BookingError::AlreadyConfirmed(id) => ReconcileError::BookingAlreadyConfirmed(id),
            BookingError::Store(e) => ReconcileError::Store(e),
            BookingError::Ledger(e) => e.into(),
            other => ReconcileError::Booking(other),
        }
    }
}

/// What [`ReconciliationEngine::handle_payment_outcome`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationResult {
    /// This call marked the request paid.
    Applied {
        request: SplitPaymentRequest,
        booking_confirmed: bool,
    },
    /// The request had already been paid by an earlier delivery.
    AlreadyTerminal {
        request: SplitPaymentRequest,
        booking_confirmed: bool,
    },
    /// The payer reported a failed payment; nothing was changed.
    Declined { request_id: Uuid },
}

impl ReconciliationResult {
    pub fn booking_confirmed(&self) -> bool {
        match self {
            ReconciliationResult::Applied {
                booking_confirmed, ..
            }
            | ReconciliationResult::AlreadyTerminal {
                booking_confirmed, ..
            } => *booking_confirmed,
            ReconciliationResult::Declined { .. } => false,
        }
    }
}

pub struct ReconciliationEngine<S, G> {
    ledger: SplitLedger<S>,
    bookings: BookingAggregate<S>,
    gateway: Arc<G>,
    events: DomainEventSender,
}

impl<S, G> Clone for ReconciliationEngine<S, G> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            bookings: self.bookings.clone(),
            gateway: Arc::clone(&self.gateway),
            events: self.events.clone(),
        }
    }
}

impl<S: SplitStore, G: PaymentGateway> ReconciliationEngine<S, G> {
    pub fn new(
        ledger: SplitLedger<S>,
        bookings: BookingAggregate<S>,
        gateway: Arc<G>,
        events: DomainEventSender,
    ) -> Self {
        Self {
            ledger,
            bookings,
            gateway,
            events,
        }
    }

    pub fn ledger(&self) -> &SplitLedger<S> {
        &self.ledger
    }

    pub fn bookings(&self) -> &BookingAggregate<S> {
        &self.bookings
    }

    /// Apply a reported payment outcome from either channel.
    #[tracing::instrument(
        skip_all,
        fields(request_id = %outcome.request_id, source = %outcome.source)
    )]
    pub async fn handle_payment_outcome(
        &self,
        outcome: PaymentOutcome,
    ) -> Result<ReconciliationResult, ReconcileError> {
        debug!(reference = %outcome.external_reference, "Received payment outcome");
        let request = self.ledger.get_request(outcome.request_id).await?;

        if !outcome.succeeded {
            info!(
                booking_id = %request.booking_id,
                reference = %outcome.external_reference,
                "Payment reported as failed"
            );
            return Ok(ReconciliationResult::Declined {
                request_id: request.id,
            });
        }
        if request.status == SplitStatus::Expired {
            info!(booking_id = %request.booking_id, "Payment outcome for expired request");
            return Err(ReconcileError::RequestExpired(request.id));
        }

        let booking = self.bookings.get(request.booking_id).await?;
        self.verify(&outcome, &request, &booking).await?;

        let (request, transitioned) = match self
            .ledger
            .mark_paid(request.id, &outcome.external_reference)
            .await?
        {
            MarkPaidOutcome::Paid(request) => (request, true),
            MarkPaidOutcome::AlreadyTerminal(request) if request.status == SplitStatus::Expired => {
                info!(
                    booking_id = %request.booking_id,
                    "Request expired while payment was being verified"
                );
                return Err(ReconcileError::RequestExpired(request.id));
            }
            MarkPaidOutcome::AlreadyTerminal(request) => (request, false),
        };

        let booking_confirmed = self.settle_booking(&request, transitioned).await?;

        Ok(if transitioned {
            ReconciliationResult::Applied {
                request,
                booking_confirmed,
            }
        } else {
            ReconciliationResult::AlreadyTerminal {
                request,
                booking_confirmed,
            }
        })
    }

    /// Ask the gateway whether the outcome really happened as reported.
    async fn verify(
        &self,
        outcome: &PaymentOutcome,
        request: &SplitPaymentRequest,
        booking: &Booking,
    ) -> Result<GatewayVerification, ReconcileError> {
        let verification = self
            .gateway
            .verify(&outcome.external_reference)
            .await
            .map_err(|e| {
                warn!(error = %e, "Gateway verification call failed");
                ReconcileError::VerificationFailed(e.to_string())
            })?;

        let mismatch = if !verification.succeeded {
            Some("gateway reports the payment as unsuccessful".to_string())
        } else if verification.reference != outcome.external_reference {
            Some(format!(
                "reference mismatch: reported {}, verified {}",
                outcome.external_reference, verification.reference
            ))
        } else if verification.request_id != Some(outcome.request_id) {
            Some(format!(
                "reference {} was not issued for request {}",
                outcome.external_reference, outcome.request_id
            ))
        } else if verification.currency != booking.currency {
            Some(format!(
                "currency mismatch: expected {}, verified {}",
                booking.currency, verification.currency
            ))
        } else if verification.amount_paid != request.amount {
            Some(format!(
                "amount mismatch: expected {}, verified {}",
                request.amount, verification.amount_paid
            ))
        } else {
            None
        };

        if let Some(reason) = mismatch {
            warn!(
                booking_id = %request.booking_id,
                reference = %outcome.external_reference,
                reason = %reason,
                "Payment verification rejected"
            );
            return Err(ReconcileError::VerificationFailed(reason));
        }
        if outcome.amount_paid != verification.amount_paid {
            debug!(
                reported = %outcome.amount_paid,
                verified = %verification.amount_paid,
                "Reported amount differs from verified amount"
            );
        }
        Ok(verification)
    }

    /// Confirm the booking if every request is paid; emit the matching event.
    ///
    /// Returns whether the booking is confirmed after this call.
    async fn settle_booking(
        &self,
        request: &SplitPaymentRequest,
        transitioned: bool,
    ) -> Result<bool, ReconcileError> {
        let booking_id = request.booking_id;
        let requests = self.ledger.requests_for_booking(booking_id).await?;
        let complete =
            !requests.is_empty() && requests.iter().all(|r| r.status == SplitStatus::Paid);

        if !complete {
            if transitioned {
                self.emit(DomainEvent::PartialPaymentReceived {
                    request_id: request.id,
                    booking_id,
                })
                .await;
            }
            return Ok(false);
        }

        if self.bookings.confirm_if_pending(booking_id).await? {
            self.emit(DomainEvent::BookingConfirmed { booking_id }).await;
            return Ok(true);
        }
        let booking = self.bookings.get(booking_id).await?;
        Ok(booking.status == BookingStatus::Confirmed)
    }

    async fn emit(&self, event: DomainEvent) {
        if let Err(e) = self.events.send(event).await {
            error!(event = %event, error = %e, "Failed to send DomainEvent");
        }
    }

    /// Start a gateway charge for one pending split request.
    #[tracing::instrument(skip_all, fields(request_id = %request_id))]
    pub async fn initiate_payment(
        &self,
        request_id: Uuid,
        callback_url: Option<url::Url>,
    ) -> Result<PaymentInitiation, ReconcileError> {
        let request = self.ledger.get_request(request_id).await?;
        match request.status {
            SplitStatus::Pending => {}
            SplitStatus::Paid => return Err(ReconcileError::RequestAlreadyPaid(request_id)),
            SplitStatus::Expired => return Err(ReconcileError::RequestExpired(request_id)),
        }
        if request.expires_at <= time::OffsetDateTime::now_utc() {
            return Err(ReconcileError::RequestExpired(request_id));
        }
        let booking = self.bookings.get(request.booking_id).await?;

        let initiation = self
            .gateway
            .initiate(InitiatePayment {
                request_id,
                booking_id: booking.id,
                amount: request.amount,
                currency: booking.currency.clone(),
                callback_url,
            })
            .await?;
        info!(
            booking_id = %booking.id,
            reference = %initiation.reference,
            amount = %request.amount,
            "Payment initiated"
        );
        Ok(initiation)
    }

    /// Expire a pending request by hand. Already terminal requests are left
    /// alone and reported as they are.
    pub async fn expire_request(
        &self,
        request_id: Uuid,
    ) -> Result<SplitPaymentRequest, ReconcileError> {
        match self.ledger.mark_expired(request_id).await? {
            MarkExpiredOutcome::Expired(request) => Ok(request),
            MarkExpiredOutcome::AlreadyTerminal(request) => {
                debug!(
                    request_id = %request_id,
                    status = %request.status,
                    "Manual expiry of terminal request ignored"
                );
                Ok(request)
            }
        }
    }

    /// Cancel a pending booking and expire its pending requests.
    pub async fn cancel_booking(&self, booking_id: Uuid) -> Result<CancelOutcome, ReconcileError> {
        Ok(self.bookings.cancel(booking_id, &self.ledger).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::booking::NewBooking;
    use crate::events::{DomainEventReceiver, domain_event_channel};
    use crate::store::MemorySplitStore;
    use async_trait::async_trait;
    use compact_str::CompactString;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use splitpay_sdk::objects::OutcomeSource;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Gateway whose verification answers are set per reference.
    #[derive(Default)]
    struct ScriptedGateway {
        answers: Mutex<HashMap<String, GatewayVerification>>,
    }

    impl ScriptedGateway {
        fn settle(&self, reference: &str, request_id: Uuid, amount: Decimal, currency: &str) {
            self.answers.lock().unwrap().insert(
                reference.to_string(),
                GatewayVerification {
                    reference: reference.to_string(),
                    request_id: Some(request_id),
                    succeeded: true,
                    amount_paid: amount,
                    currency: CompactString::from(currency),
                },
            );
        }
    }

    #[async_trait]
    impl PaymentGateway for ScriptedGateway {
        async fn initiate(
            &self,
            payment: InitiatePayment,
        ) -> Result<PaymentInitiation, GatewayError> {
            Ok(PaymentInitiation {
                reference: format!("ref-{}", payment.request_id),
                redirect_url: Some("https://pay.test/checkout".to_string()),
                client_secret: None,
            })
        }

        async fn verify(&self, reference: &str) -> Result<GatewayVerification, GatewayError> {
            self.answers
                .lock()
                .unwrap()
                .get(reference)
                .cloned()
                .ok_or_else(|| GatewayError::Rejected {
                    status: 404,
                    body: "unknown reference".to_string(),
                })
        }
    }

    struct Harness {
        engine: ReconciliationEngine<MemorySplitStore, ScriptedGateway>,
        gateway: Arc<ScriptedGateway>,
        events: DomainEventReceiver,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemorySplitStore::new());
        let gateway = Arc::new(ScriptedGateway::default());
        let (tx, rx) = domain_event_channel();
        let engine = ReconciliationEngine::new(
            SplitLedger::new(store.clone(), time::Duration::hours(1)),
            BookingAggregate::new(store),
            gateway.clone(),
            tx,
        );
        Harness {
            engine,
            gateway,
            events: rx,
        }
    }

    async fn split_booking(
        engine: &ReconciliationEngine<MemorySplitStore, ScriptedGateway>,
        total: Decimal,
        participants: u32,
    ) -> (Booking, Vec<SplitPaymentRequest>) {
        let booking = engine
            .bookings()
            .register(NewBooking {
                venue_id: Uuid::new_v4(),
                initiator_id: Uuid::new_v4(),
                total_amount: total,
                currency: "NGN".into(),
                party_size: participants as i32,
            })
            .await
            .unwrap();
        let requests = engine
            .ledger()
            .create_split(booking.id, booking.initiator_id, participants)
            .await
            .unwrap();
        (booking, requests)
    }

    fn outcome(request: &SplitPaymentRequest, reference: &str) -> PaymentOutcome {
        PaymentOutcome {
            request_id: request.id,
            external_reference: reference.to_string(),
            amount_paid: request.amount,
            succeeded: true,
            source: OutcomeSource::ClientCallback,
        }
    }

    #[tokio::test]
    async fn test_partial_then_complete() {
        let mut h = harness();
        let (booking, requests) = split_booking(&h.engine, dec!(300), 2).await;
        h.gateway.settle("r1", requests[0].id, dec!(150), "NGN");
        h.gateway.settle("r2", requests[1].id, dec!(150), "NGN");

        let first = h
            .engine
            .handle_payment_outcome(outcome(&requests[0], "r1"))
            .await
            .unwrap();
        assert!(matches!(
            first,
            ReconciliationResult::Applied {
                booking_confirmed: false,
                ..
            }
        ));
        assert_eq!(
            h.events.try_recv().unwrap(),
            DomainEvent::PartialPaymentReceived {
                request_id: requests[0].id,
                booking_id: booking.id
            }
        );

        let second = h
            .engine
            .handle_payment_outcome(outcome(&requests[1], "r2"))
            .await
            .unwrap();
        assert!(second.booking_confirmed());
        assert_eq!(
            h.events.try_recv().unwrap(),
            DomainEvent::BookingConfirmed {
                booking_id: booking.id
            }
        );
        assert!(h.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_duplicate_outcome_is_already_terminal() {
        let mut h = harness();
        let (_, requests) = split_booking(&h.engine, dec!(300), 2).await;
        h.gateway.settle("r1", requests[0].id, dec!(150), "NGN");

        h.engine
            .handle_payment_outcome(outcome(&requests[0], "r1"))
            .await
            .unwrap();
        let mut webhook = outcome(&requests[0], "r1");
        webhook.source = OutcomeSource::Webhook;
        let again = h.engine.handle_payment_outcome(webhook).await.unwrap();

        assert!(matches!(again, ReconciliationResult::AlreadyTerminal { .. }));
        assert!(h.events.try_recv().is_ok());
        assert!(h.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failed_outcome_is_declined_without_mutation() {
        let h = harness();
        let (_, requests) = split_booking(&h.engine, dec!(300), 2).await;
        let mut failed = outcome(&requests[0], "r1");
        failed.succeeded = false;

        let result = h.engine.handle_payment_outcome(failed).await.unwrap();

        assert_eq!(
            result,
            ReconciliationResult::Declined {
                request_id: requests[0].id
            }
        );
        let request = h.engine.ledger().get_request(requests[0].id).await.unwrap();
        assert_eq!(request.status, SplitStatus::Pending);
    }

    #[tokio::test]
    async fn test_verification_mismatches_change_nothing() {
        let h = harness();
        let (_, requests) = split_booking(&h.engine, dec!(300), 2).await;
        h.gateway.settle("short", requests[0].id, dec!(149), "NGN");
        h.gateway.settle("usd", requests[0].id, dec!(150), "USD");

        for reference in ["short", "usd", "unknown"] {
            let err = h
                .engine
                .handle_payment_outcome(outcome(&requests[0], reference))
                .await
                .unwrap_err();
            assert!(matches!(err, ReconcileError::VerificationFailed(_)));
            assert!(!err.acknowledges_webhook());
        }
        let request = h.engine.ledger().get_request(requests[0].id).await.unwrap();
        assert_eq!(request.status, SplitStatus::Pending);
        assert!(request.payment_reference.is_none());
    }

    #[tokio::test]
    async fn test_reference_for_another_request_is_rejected() {
        let h = harness();
        let (_, requests) = split_booking(&h.engine, dec!(300), 2).await;
        h.gateway.settle("r1", requests[0].id, dec!(150), "NGN");

        let err = h
            .engine
            .handle_payment_outcome(outcome(&requests[1], "r1"))
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::VerificationFailed(_)));
        let request = h.engine.ledger().get_request(requests[1].id).await.unwrap();
        assert_eq!(request.status, SplitStatus::Pending);
    }

    #[tokio::test]
    async fn test_reference_already_applied_elsewhere() {
        let h = harness();
        let (booking, requests) = split_booking(&h.engine, dec!(300), 2).await;
        h.gateway.settle("r1", requests[0].id, dec!(150), "NGN");
        h.engine
            .handle_payment_outcome(outcome(&requests[0], "r1"))
            .await
            .unwrap();

        // Gateway now attributes the same reference to the second request.
        h.gateway.settle("r1", requests[1].id, dec!(150), "NGN");
        let err = h
            .engine
            .handle_payment_outcome(outcome(&requests[1], "r1"))
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::ReferenceAlreadyUsed(ref r) if r == "r1"));
        assert!(err.acknowledges_webhook());
        let booking = h.engine.bookings().get(booking.id).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn test_expired_request_is_rejected() {
        let h = harness();
        let (_, requests) = split_booking(&h.engine, dec!(300), 2).await;
        h.gateway.settle("r1", requests[0].id, dec!(150), "NGN");
        h.engine.expire_request(requests[0].id).await.unwrap();

        let err = h
            .engine
            .handle_payment_outcome(outcome(&requests[0], "r1"))
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::RequestExpired(id) if id == requests[0].id));
        assert!(err.acknowledges_webhook());
    }

    #[tokio::test]
    async fn test_unknown_request() {
        let h = harness();
        let err = h
            .engine
            .handle_payment_outcome(PaymentOutcome {
                request_id: Uuid::new_v4(),
                external_reference: "r".to_string(),
                amount_paid: dec!(1),
                succeeded: true,
                source: OutcomeSource::Webhook,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::RequestNotFound(_)));
    }

    #[tokio::test]
    async fn test_initiate_payment_guards_status() {
        let h = harness();
        let (_, requests) = split_booking(&h.engine, dec!(300), 2).await;
        h.gateway.settle("r1", requests[0].id, dec!(150), "NGN");

        let initiation = h
            .engine
            .initiate_payment(requests[0].id, None)
            .await
            .unwrap();
        assert_eq!(initiation.reference, format!("ref-{}", requests[0].id));

        h.engine
            .handle_payment_outcome(outcome(&requests[0], "r1"))
            .await
            .unwrap();
        assert!(matches!(
            h.engine.initiate_payment(requests[0].id, None).await,
            Err(ReconcileError::RequestAlreadyPaid(_))
        ));

        h.engine.expire_request(requests[1].id).await.unwrap();
        assert!(matches!(
            h.engine.initiate_payment(requests[1].id, None).await,
            Err(ReconcileError::RequestExpired(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_after_confirmation_is_refused() {
        let h = harness();
        let (booking, requests) = split_booking(&h.engine, dec!(100), 1).await;
        h.gateway.settle("r1", requests[0].id, dec!(100), "NGN");
        h.engine
            .handle_payment_outcome(outcome(&requests[0], "r1"))
            .await
            .unwrap();

        assert!(matches!(
            h.engine.cancel_booking(booking.id).await,
            Err(ReconcileError::BookingAlreadyConfirmed(_))
        ));
    }
}
