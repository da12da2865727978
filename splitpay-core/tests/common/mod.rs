#![allow(dead_code)]

use async_trait::async_trait;
use compact_str::CompactString;
use rust_decimal::Decimal;
use splitpay_core::booking::BookingAggregate;
use splitpay_core::directory::{Contact, StaticContactDirectory};
use splitpay_core::entities::booking::{Booking, NewBooking};
use splitpay_core::entities::split_request::SplitPaymentRequest;
use splitpay_core::events::{DomainEvent, DomainEventReceiver, domain_event_channel};
use splitpay_core::gateway::{
    GatewayError, GatewayVerification, InitiatePayment, PaymentGateway, PaymentInitiation,
    PaymentOutcome,
};
use splitpay_core::ledger::SplitLedger;
use splitpay_core::notifications::{NotificationError, NotificationService};
use splitpay_core::processors::NotificationDispatcher;
use splitpay_core::reconciliation::ReconciliationEngine;
use splitpay_core::store::MemorySplitStore;
use splitpay_sdk::objects::OutcomeSource;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Gateway that confirms whatever references a test has settled.
#[derive(Default)]
pub struct ScriptedGateway {
    settled: Mutex<HashMap<String, GatewayVerification>>,
    verify_calls: Mutex<u32>,
}

impl ScriptedGateway {
    /// Settle `reference` as a charge the gateway initiated for `request_id`.
    pub fn settle(&self, reference: &str, request_id: Uuid, amount: Decimal, currency: &str) {
        self.settled.lock().unwrap().insert(
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

    pub fn verify_calls(&self) -> u32 {
        *self.verify_calls.lock().unwrap()
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn initiate(&self, payment: InitiatePayment) -> Result<PaymentInitiation, GatewayError> {
        Ok(PaymentInitiation {
            reference: format!("ref-{}", payment.request_id),
            redirect_url: None,
            client_secret: Some("secret".to_string()),
        })
    }

    async fn verify(&self, reference: &str) -> Result<GatewayVerification, GatewayError> {
        *self.verify_calls.lock().unwrap() += 1;
        tokio::task::yield_now().await;
        self.settled
            .lock()
            .unwrap()
            .get(reference)
            .cloned()
            .ok_or_else(|| GatewayError::InvalidResponse("unknown reference".to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentNotification {
    pub template_id: String,
    pub address: String,
    pub payload: serde_json::Value,
}

/// Notifier that records every send, or fails every send.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentNotification>>,
    failing: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_with_template(&self, template_id: &str) -> Vec<SentNotification> {
        self.sent()
            .into_iter()
            .filter(|n| n.template_id == template_id)
            .collect()
    }
}

#[async_trait]
impl NotificationService for RecordingNotifier {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(
        &self,
        template_id: &str,
        address: &str,
        payload: &serde_json::Value,
    ) -> Result<(), NotificationError> {
        if self.failing {
            return Err(NotificationError::DeliveryFailed {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        self.sent.lock().unwrap().push(SentNotification {
            template_id: template_id.to_string(),
            address: address.to_string(),
            payload: payload.clone(),
        });
        Ok(())
    }
}

pub type Engine = ReconciliationEngine<MemorySplitStore, ScriptedGateway>;

/// People involved in one booking.
pub struct Party {
    pub initiator: Uuid,
    pub guests: Vec<Uuid>,
    pub venue: Uuid,
}

impl Party {
    pub fn new(guests: usize) -> Self {
        Self {
            initiator: Uuid::new_v4(),
            guests: (0..guests).map(|_| Uuid::new_v4()).collect(),
            venue: Uuid::new_v4(),
        }
    }

    pub fn address(id: Uuid) -> String {
        format!("{}@example.com", id.simple())
    }

    fn directory(&self) -> StaticContactDirectory {
        let directory = StaticContactDirectory::new()
            .with_user(
                self.initiator,
                Contact::new(Self::address(self.initiator), "Initiator"),
            )
            .with_venue(self.venue, Contact::new(Self::address(self.venue), "Venue"));
        self.guests
            .iter()
            .enumerate()
            .fold(directory, |d, (i, guest)| {
                d.with_user(*guest, Contact::new(Self::address(*guest), format!("Guest {i}")))
            })
    }
}

pub struct Fixture {
    pub store: Arc<MemorySplitStore>,
    pub gateway: Arc<ScriptedGateway>,
    pub notifier: Arc<RecordingNotifier>,
    pub engine: Engine,
    pub dispatcher: NotificationDispatcher<MemorySplitStore>,
    pub events: DomainEventReceiver,
    pub party: Party,
}

impl Fixture {
    pub fn new(guests: usize) -> Self {
        Self::with_notifier(guests, RecordingNotifier::default())
    }

    pub fn with_notifier(guests: usize, notifier: RecordingNotifier) -> Self {
        let store = Arc::new(MemorySplitStore::new());
        let gateway = Arc::new(ScriptedGateway::default());
        let notifier = Arc::new(notifier);
        let party = Party::new(guests);
        let (tx, rx) = domain_event_channel();
        let engine = ReconciliationEngine::new(
            SplitLedger::new(store.clone(), time::Duration::hours(48)),
            BookingAggregate::new(store.clone()),
            gateway.clone(),
            tx,
        );
        let dispatcher =
            NotificationDispatcher::new(store.clone(), notifier.clone(), Arc::new(party.directory()));
        Self {
            store,
            gateway,
            notifier,
            engine,
            dispatcher,
            events: rx,
            party,
        }
    }

    /// Register a booking and split it between the initiator and every guest.
    pub async fn split_booking(&self, total: Decimal) -> (Booking, Vec<SplitPaymentRequest>) {
        let booking = self
            .engine
            .bookings()
            .register(NewBooking {
                venue_id: self.party.venue,
                initiator_id: self.party.initiator,
                total_amount: total,
                currency: "NGN".into(),
                party_size: self.party.guests.len() as i32 + 1,
            })
            .await
            .unwrap();
        let participants = self.party.guests.len() as u32 + 1;
        let requests = self
            .engine
            .ledger()
            .create_split(booking.id, self.party.initiator, participants)
            .await
            .unwrap();
        for (request, guest) in requests[1..].iter().zip(&self.party.guests) {
            assert!(
                self.engine
                    .ledger()
                    .assign_recipient(request.id, *guest)
                    .await
                    .unwrap()
            );
        }
        let requests = self.engine.ledger().requests_for_booking(booking.id).await.unwrap();
        (booking, requests)
    }

    /// Drain every pending event from the engine.
    pub fn drain_events(&mut self) -> Vec<DomainEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

pub fn outcome(request: &SplitPaymentRequest, reference: &str, source: OutcomeSource) -> PaymentOutcome {
    PaymentOutcome {
        request_id: request.id,
        external_reference: reference.to_string(),
        amount_paid: request.amount,
        succeeded: true,
        source,
    }
}
