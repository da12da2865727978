use super::{SplitStore, StoreError, TransitionOutcome};
use crate::entities::booking::{Booking, NewBooking};
use crate::entities::notification_delivery::NotificationKey;
use crate::entities::split_request::{NewSplitRequest, SplitPaymentRequest};
use crate::entities::{BookingStatus, SplitStatus};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    bookings: HashMap<Uuid, Booking>,
    requests: HashMap<Uuid, SplitPaymentRequest>,
    notifications: HashSet<NotificationKey>,
}

/// A thread-safe in-memory [`SplitStore`].
///
/// Each operation runs inside one critical section, which gives the same
/// compare-and-swap semantics as the conditional SQL updates. Used by tests
/// and for running the server without a database.
#[derive(Default, Clone)]
pub struct MemorySplitStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySplitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of notification keys claimed so far.
    pub async fn claimed_notifications(&self) -> usize {
        self.state.lock().await.notifications.len()
    }

    /// Move a pending request's deadline, for exercising the expiry sweep.
    pub async fn set_expires_at(&self, request_id: Uuid, expires_at: OffsetDateTime) -> bool {
        let mut state = self.state.lock().await;
        match state.requests.get_mut(&request_id) {
            Some(request) => {
                request.expires_at = expires_at;
                true
            }
            None => false,
        }
    }

    fn transition(
        state: &mut MemoryState,
        request_id: Uuid,
        next: SplitStatus,
        reference: Option<&str>,
    ) -> Result<TransitionOutcome, StoreError> {
        let Some(current) = state.requests.get(&request_id) else {
            return Ok(TransitionOutcome::NotFound);
        };
        if !current.status.can_transition_to(next) {
            return Ok(TransitionOutcome::AlreadyTerminal(current.clone()));
        }
        let reused = reference.filter(|reference| {
            state
                .requests
                .values()
                .any(|r| r.id != request_id && r.payment_reference.as_deref() == Some(*reference))
        });
        if let Some(reference) = reused {
            return Err(StoreError::ReferenceAlreadyUsed(reference.to_owned()));
        }

        let Some(request) = state.requests.get_mut(&request_id) else {
            return Ok(TransitionOutcome::NotFound);
        };
        request.status = next;
        if next == SplitStatus::Paid {
            request.payment_reference = reference.map(str::to_owned);
            request.paid_at = Some(OffsetDateTime::now_utc());
        }
        Ok(TransitionOutcome::Transitioned(request.clone()))
    }

    fn transition_booking(
        state: &mut MemoryState,
        booking_id: Uuid,
        next: BookingStatus,
    ) -> bool {
        let Some(booking) = state.bookings.get_mut(&booking_id) else {
            return false;
        };
        if !booking.can_transition_to(next) {
            return false;
        }
        let now = OffsetDateTime::now_utc();
        booking.status = next;
        match next {
            BookingStatus::Confirmed => booking.confirmed_at = Some(now),
            BookingStatus::Cancelled => booking.cancelled_at = Some(now),
            BookingStatus::Pending => {}
        }
        true
    }
}

#[async_trait]
impl SplitStore for MemorySplitStore {
    async fn insert_booking(&self, booking: NewBooking) -> Result<Booking, StoreError> {
        let record = Booking {
            id: Uuid::now_v7(),
            venue_id: booking.venue_id,
            initiator_id: booking.initiator_id,
            total_amount: booking.total_amount,
            currency: booking.currency,
            party_size: booking.party_size,
            status: BookingStatus::Pending,
            created_at: OffsetDateTime::now_utc(),
            confirmed_at: None,
            cancelled_at: None,
        };
        let mut state = self.state.lock().await;
        state.bookings.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, StoreError> {
        Ok(self.state.lock().await.bookings.get(&booking_id).cloned())
    }

    async fn confirm_booking_if_pending(&self, booking_id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        Ok(Self::transition_booking(
            &mut state,
            booking_id,
            BookingStatus::Confirmed,
        ))
    }

    async fn cancel_booking_if_pending(&self, booking_id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        Ok(Self::transition_booking(
            &mut state,
            booking_id,
            BookingStatus::Cancelled,
        ))
    }

    async fn insert_split_requests(
        &self,
        booking_id: Uuid,
        requests: Vec<NewSplitRequest>,
    ) -> Result<Vec<SplitPaymentRequest>, StoreError> {
        let mut state = self.state.lock().await;
        if state.requests.values().any(|r| r.booking_id == booking_id) {
            return Err(StoreError::SplitAlreadyExists(booking_id));
        }
        let now = OffsetDateTime::now_utc();
        let mut inserted: Vec<SplitPaymentRequest> = requests
            .into_iter()
            .map(|new| SplitPaymentRequest {
                id: Uuid::now_v7(),
                booking_id: new.booking_id,
                requester_id: new.requester_id,
                recipient_id: new.recipient_id,
                position: new.position,
                amount: new.amount,
                status: SplitStatus::Pending,
                payment_reference: None,
                paid_at: None,
                created_at: now,
                expires_at: new.expires_at,
            })
            .collect();
        inserted.sort_by_key(|r| r.position);
        for request in &inserted {
            state.requests.insert(request.id, request.clone());
        }
        Ok(inserted)
    }

    async fn get_split_request(
        &self,
        request_id: Uuid,
    ) -> Result<Option<SplitPaymentRequest>, StoreError> {
        Ok(self.state.lock().await.requests.get(&request_id).cloned())
    }

    async fn split_requests_for_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<Vec<SplitPaymentRequest>, StoreError> {
        let state = self.state.lock().await;
        let mut requests: Vec<SplitPaymentRequest> = state
            .requests
            .values()
            .filter(|r| r.booking_id == booking_id)
            .cloned()
            .collect();
        requests.sort_by_key(|r| r.position);
        Ok(requests)
    }

    async fn mark_split_paid(
        &self,
        request_id: Uuid,
        reference: &str,
    ) -> Result<TransitionOutcome, StoreError> {
        let mut state = self.state.lock().await;
        Self::transition(&mut state, request_id, SplitStatus::Paid, Some(reference))
    }

    async fn mark_split_expired(&self, request_id: Uuid) -> Result<TransitionOutcome, StoreError> {
        let mut state = self.state.lock().await;
        Self::transition(&mut state, request_id, SplitStatus::Expired, None)
    }

    async fn assign_split_recipient(
        &self,
        request_id: Uuid,
        recipient_id: Uuid,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        match state.requests.get_mut(&request_id) {
            Some(request)
                if request.recipient_id.is_none() && request.status == SplitStatus::Pending =>
            {
                request.recipient_id = Some(recipient_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn overdue_split_requests(
        &self,
        now: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<Uuid>, StoreError> {
        let state = self.state.lock().await;
        let mut overdue: Vec<&SplitPaymentRequest> = state
            .requests
            .values()
            .filter(|r| r.status == SplitStatus::Pending && r.expires_at <= now)
            .collect();
        overdue.sort_by_key(|r| r.expires_at);
        Ok(overdue
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(0))
            .map(|r| r.id)
            .collect())
    }

    async fn claim_notification(&self, key: NotificationKey) -> Result<bool, StoreError> {
        Ok(self.state.lock().await.notifications.insert(key))
    }
}
