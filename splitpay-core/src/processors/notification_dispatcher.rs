//! NotificationDispatcher processor.
//!
//! The NotificationDispatcher is responsible for:
//! - Receiving `DomainEvent`s from the reconciliation engine
//! - Working out who should hear about each event
//! - Claiming a `(subject, event, recipient)` dedup key before every send
//! - Sending through the configured `NotificationService`
//!
//! Delivery is at-most-once. A claimed key is never sent again, and a failed
//! send is logged and dropped; booking state never depends on it.

use crate::directory::{Contact, ContactDirectory, DirectoryError};
use crate::entities::booking::Booking;
use crate::entities::notification_delivery::{NotificationEvent, NotificationKey};
use crate::entities::split_request::SplitPaymentRequest;
use crate::events::{DomainEvent, DomainEventReceiver};
use crate::notifications::NotificationService;
use crate::store::{SplitStore, StoreError};
use kanau::processor::Processor;
use serde::Serialize;
use splitpay_sdk::objects::notification::{
    BOOKING_CONFIRMED_INITIATOR_TEMPLATE, BOOKING_CONFIRMED_PARTICIPANT_TEMPLATE,
    BOOKING_CONFIRMED_VENUE_TEMPLATE, SPLIT_PAYMENT_RECEIPT_TEMPLATE,
};
use splitpay_sdk::objects::{
    InitiatorConfirmationPayload, ParticipantConfirmationPayload, SplitReceiptPayload,
    VenueConfirmationPayload,
};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("booking not found: {0}")]
    BookingNotFound(Uuid),

    #[error("split payment request not found: {0}")]
    RequestNotFound(Uuid),
}

/// Per-event delivery counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: u32,
    /// Already delivered for this key.
    pub skipped: u32,
    /// Contact lookup or provider failure.
    pub failed: u32,
}

impl DispatchReport {
    fn add(&mut self, delivery: Delivery) {
        match delivery {
            Delivery::Sent => self.sent += 1,
            Delivery::Duplicate => self.skipped += 1,
            Delivery::Failed => self.failed += 1,
        }
    }
}

enum Delivery {
    Sent,
    Duplicate,
    Failed,
}

#[derive(Debug, Clone, Copy)]
enum Recipient {
    User(Uuid),
    Venue(Uuid),
}

impl Recipient {
    fn id(self) -> Uuid {
        match self {
            Recipient::User(id) | Recipient::Venue(id) => id,
        }
    }
}

pub struct NotificationDispatcher<S> {
    store: Arc<S>,
    notifier: Arc<dyn NotificationService>,
    directory: Arc<dyn ContactDirectory>,
}

impl<S: SplitStore> NotificationDispatcher<S> {
    pub fn new(
        store: Arc<S>,
        notifier: Arc<dyn NotificationService>,
        directory: Arc<dyn ContactDirectory>,
    ) -> Self {
        Self {
            store,
            notifier,
            directory,
        }
    }

    /// Run the dispatcher until shutdown is signaled or every sender is gone.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>, mut event_rx: DomainEventReceiver) {
        info!("NotificationDispatcher started");

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("NotificationDispatcher received shutdown signal");
                        break;
                    }
                }

                Some(event) = event_rx.recv() => {
                    debug!(event = %event, "Received DomainEvent");
                    if let Err(e) = self.process(event).await {
                        error!(event = %event, error = %e, "Failed to dispatch notifications");
                    }
                }

                else => {
                    info!("DomainEvent channel closed");
                    break;
                }
            }
        }

        info!("NotificationDispatcher shutdown complete");
    }

    async fn booking(&self, booking_id: Uuid) -> Result<Booking, DispatchError> {
        self.store
            .get_booking(booking_id)
            .await?
            .ok_or(DispatchError::BookingNotFound(booking_id))
    }

    async fn partial_payment(
        &self,
        request_id: Uuid,
        booking_id: Uuid,
    ) -> Result<DispatchReport, DispatchError> {
        let request = self
            .store
            .get_split_request(request_id)
            .await?
            .ok_or(DispatchError::RequestNotFound(request_id))?;
        let booking = self.booking(booking_id).await?;
        let mut report = DispatchReport::default();

        let Some(payer) = request.recipient_id else {
            warn!(
                request_id = %request_id,
                "Paid split request has no recipient, skipping receipt"
            );
            return Ok(report);
        };

        let delivery = self
            .deliver(
                request.id,
                NotificationEvent::PartialPaymentReceived,
                Recipient::User(payer),
                SPLIT_PAYMENT_RECEIPT_TEMPLATE,
                |contact| SplitReceiptPayload {
                    booking_id: booking.id,
                    request_id: request.id,
                    recipient_name: contact.display_name.clone(),
                    amount_paid: request.amount,
                    booking_total: booking.total_amount,
                    currency: booking.currency.clone(),
                    reference: request.payment_reference.clone(),
                },
            )
            .await;
        report.add(delivery);
        Ok(report)
    }

    async fn booking_confirmed(&self, booking_id: Uuid) -> Result<DispatchReport, DispatchError> {
        let booking = self.booking(booking_id).await?;
        let requests = self.store.split_requests_for_booking(booking_id).await?;
        let event = NotificationEvent::BookingConfirmed;
        let mut report = DispatchReport::default();

        let participant_count = u32::try_from(requests.len()).unwrap_or(u32::MAX);
        report.add(
            self.deliver(
                booking.id,
                event,
                Recipient::User(booking.initiator_id),
                BOOKING_CONFIRMED_INITIATOR_TEMPLATE,
                |contact| InitiatorConfirmationPayload {
                    booking_id: booking.id,
                    recipient_name: contact.display_name.clone(),
                    total_amount: booking.total_amount,
                    currency: booking.currency.clone(),
                    participant_count,
                    party_size: booking.party_size,
                },
            )
            .await,
        );

        for request in participants(&booking, &requests) {
            let Some(recipient) = request.recipient_id else {
                continue;
            };
            report.add(
                self.deliver(
                    booking.id,
                    event,
                    Recipient::User(recipient),
                    BOOKING_CONFIRMED_PARTICIPANT_TEMPLATE,
                    |contact| ParticipantConfirmationPayload {
                        booking_id: booking.id,
                        recipient_name: contact.display_name.clone(),
                        amount_paid: request.amount,
                        total_amount: booking.total_amount,
                        currency: booking.currency.clone(),
                    },
                )
                .await,
            );
        }

        let confirmed_at = booking
            .confirmed_at
            .unwrap_or_else(time::OffsetDateTime::now_utc)
            .unix_timestamp();
        report.add(
            self.deliver(
                booking.id,
                event,
                Recipient::Venue(booking.venue_id),
                BOOKING_CONFIRMED_VENUE_TEMPLATE,
                |contact| VenueConfirmationPayload {
                    booking_id: booking.id,
                    venue_id: booking.venue_id,
                    recipient_name: contact.display_name.clone(),
                    party_size: booking.party_size,
                    total_amount: booking.total_amount,
                    currency: booking.currency.clone(),
                    confirmed_at,
                },
            )
            .await,
        );

        info!(
            booking_id = %booking_id,
            sent = report.sent,
            skipped = report.skipped,
            failed = report.failed,
            "Booking confirmation notifications dispatched"
        );
        Ok(report)
    }

    async fn resolve(&self, recipient: Recipient) -> Result<Option<Contact>, DirectoryError> {
        match recipient {
            Recipient::User(id) => self.directory.user(id).await,
            Recipient::Venue(id) => self.directory.venue(id).await,
        }
    }

    /// Resolve, claim, send. The claim comes after the lookup so an
    /// unreachable directory does not burn the key.
    async fn deliver<P: Serialize>(
        &self,
        subject_id: Uuid,
        event: NotificationEvent,
        recipient: Recipient,
        template_id: &str,
        payload: impl FnOnce(&Contact) -> P,
    ) -> Delivery {
        let recipient_id = recipient.id();
        let contact = match self.resolve(recipient).await {
            Ok(Some(contact)) => contact,
            Ok(None) => {
                warn!(
                    recipient_id = %recipient_id,
                    template_id = template_id,
                    "No contact for notification recipient"
                );
                return Delivery::Failed;
            }
            Err(e) => {
                warn!(
                    recipient_id = %recipient_id,
                    template_id = template_id,
                    error = %e,
                    "Contact lookup failed"
                );
                return Delivery::Failed;
            }
        };

        let payload = match serde_json::to_value(payload(&contact)) {
            Ok(value) => value,
            Err(e) => {
                error!(template_id = template_id, error = %e, "Failed to serialize notification payload");
                return Delivery::Failed;
            }
        };

        let key = NotificationKey {
            subject_id,
            event,
            recipient_id,
        };
        match self.store.claim_notification(key).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(
                    subject_id = %subject_id,
                    recipient_id = %recipient_id,
                    event = %event,
                    "Notification already delivered"
                );
                return Delivery::Duplicate;
            }
            Err(e) => {
                warn!(
                    subject_id = %subject_id,
                    recipient_id = %recipient_id,
                    error = %e,
                    "Failed to claim notification key"
                );
                return Delivery::Failed;
            }
        }

        match self
            .notifier
            .send(template_id, &contact.address, &payload)
            .await
        {
            Ok(()) => {
                debug!(
                    subject_id = %subject_id,
                    recipient_id = %recipient_id,
                    template_id = template_id,
                    "Notification sent"
                );
                Delivery::Sent
            }
            Err(e) => {
                warn!(
                    subject_id = %subject_id,
                    recipient_id = %recipient_id,
                    template_id = template_id,
                    error = %e,
                    "Notification delivery failed"
                );
                Delivery::Failed
            }
        }
    }
}

/// Requests whose recipient is someone other than the initiator, one per
/// recipient.
fn participants<'a>(
    booking: &Booking,
    requests: &'a [SplitPaymentRequest],
) -> impl Iterator<Item = &'a SplitPaymentRequest> {
    let initiator = booking.initiator_id;
    let mut seen = HashSet::new();
    requests.iter().filter(move |r| match r.recipient_id {
        Some(id) => id != initiator && seen.insert(id),
        None => false,
    })
}

impl<S: SplitStore> Processor<DomainEvent> for NotificationDispatcher<S> {
    type Output = DispatchReport;
    type Error = DispatchError;

    async fn process(&self, event: DomainEvent) -> Result<DispatchReport, DispatchError> {
        match event {
            DomainEvent::PartialPaymentReceived {
                request_id,
                booking_id,
            } => self.partial_payment(request_id, booking_id).await,
            DomainEvent::BookingConfirmed { booking_id } => {
                self.booking_confirmed(booking_id).await
            }
        }
    }
}
