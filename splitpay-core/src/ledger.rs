//! Split Request Ledger.
//!
//! Owns the per-participant payment obligations of a booking: dividing the
//! booking total into shares, creating the requests, and the guarded status
//! writes the reconciliation engine builds on.

use crate::entities::split_request::{NewSplitRequest, SplitPaymentRequest};
use crate::store::{SplitStore, StoreError, TransitionOutcome};
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

/// Errors that can occur while creating or mutating split requests.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Non-positive total, zero participants, more participants than the
    /// booking's party size, or a total too small to give every participant
    /// a positive share.
    #[error("invalid amount: {total} cannot be split among {participants} participants")]
    InvalidAmount { total: Decimal, participants: u32 },

    #[error("booking not found: {0}")]
    BookingNotFound(Uuid),

    #[error("booking {0} is not pending")]
    BookingNotPending(Uuid),

    #[error("booking {0} already has split payment requests")]
    SplitAlreadyExists(Uuid),

    #[error("split payment request not found: {0}")]
    RequestNotFound(Uuid),

    #[error("payment reference {0} is already applied to another request")]
    ReferenceAlreadyUsed(String),

    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for LedgerError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::SplitAlreadyExists(id) => LedgerError::SplitAlreadyExists(id),
            StoreError::ReferenceAlreadyUsed(reference) => {
                LedgerError::ReferenceAlreadyUsed(reference)
            }
            other => LedgerError::Store(other),
        }
    }
}

/// Divide `total` into `participants` whole-unit shares.
///
/// Every share is `floor(total / participants)` except the last, which also
/// takes the remainder so the shares always sum to `total` exactly.
pub fn allocate_shares(total: Decimal, participants: u32) -> Result<Vec<Decimal>, LedgerError> {
    let invalid = || LedgerError::InvalidAmount {
        total,
        participants,
    };
    if participants < 1 || total <= Decimal::ZERO {
        return Err(invalid());
    }

    if participants == 1 {
        return Ok(vec![total]);
    }

    let count = Decimal::from(participants);
    let share = (total / count).round_dp_with_strategy(0, RoundingStrategy::ToZero);
    if share <= Decimal::ZERO {
        return Err(invalid());
    }

    let head = participants as usize - 1;
    let last = total - share * Decimal::from(head as u64);
    let mut shares = vec![share; head];
    shares.push(last);
    Ok(shares)
}

/// Outcome of [`SplitLedger::mark_paid`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkPaidOutcome {
    /// The request moved from `pending` to `paid` in this call.
    Paid(SplitPaymentRequest),
    /// The request was already `paid` or `expired`; nothing changed.
    AlreadyTerminal(SplitPaymentRequest),
}

/// Outcome of [`SplitLedger::mark_expired`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkExpiredOutcome {
    Expired(SplitPaymentRequest),
    AlreadyTerminal(SplitPaymentRequest),
}

/// The ledger of split payment requests.
pub struct SplitLedger<S> {
    store: Arc<S>,
    request_ttl: time::Duration,
}

impl<S> Clone for SplitLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            request_ttl: self.request_ttl,
        }
    }
}

impl<S: SplitStore> SplitLedger<S> {
    /// Create a ledger whose new requests expire `request_ttl` after creation.
    pub fn new(store: Arc<S>, request_ttl: time::Duration) -> Self {
        Self { store, request_ttl }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Split a pending booking's total among `participant_count` payers.
    ///
    /// At most `party_size` participants can share a booking.
    ///
    /// The first request is the requester's own share and is addressed to
    /// them; the rest wait for invited payers to register.
    pub async fn create_split(
        &self,
        booking_id: Uuid,
        requester_id: Uuid,
        participant_count: u32,
    ) -> Result<Vec<SplitPaymentRequest>, LedgerError> {
        let booking = self
            .store
            .get_booking(booking_id)
            .await?
            .ok_or(LedgerError::BookingNotFound(booking_id))?;

        if i64::from(participant_count) > i64::from(booking.party_size) {
            return Err(LedgerError::InvalidAmount {
                total: booking.total_amount,
                participants: participant_count,
            });
        }
        let shares = allocate_shares(booking.total_amount, participant_count)?;

        if booking.is_terminal() {
            return Err(LedgerError::BookingNotPending(booking_id));
        }

        let expires_at = OffsetDateTime::now_utc() + self.request_ttl;
        let requests = shares
            .into_iter()
            .zip(0i32..)
            .map(|(amount, position)| NewSplitRequest {
                booking_id,
                requester_id,
                recipient_id: (position == 0).then_some(requester_id),
                position,
                amount,
                expires_at,
            })
            .collect();

        let created = self.store.insert_split_requests(booking_id, requests).await?;

        info!(
            booking_id = %booking_id,
            requester_id = %requester_id,
            participants = participant_count,
            total = %booking.total_amount,
            "Created split payment requests"
        );

        Ok(created)
    }

    /// All requests for a booking, in creation order.
    pub async fn requests_for_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<Vec<SplitPaymentRequest>, LedgerError> {
        Ok(self.store.split_requests_for_booking(booking_id).await?)
    }

    pub async fn get_request(&self, request_id: Uuid) -> Result<SplitPaymentRequest, LedgerError> {
        self.store
            .get_split_request(request_id)
            .await?
            .ok_or(LedgerError::RequestNotFound(request_id))
    }

    /// Conditionally move a request from `pending` to `paid`.
    ///
    /// A request that is already terminal is reported, not treated as an
    /// error: this is what makes duplicate deliveries harmless.
    pub async fn mark_paid(
        &self,
        request_id: Uuid,
        reference: &str,
    ) -> Result<MarkPaidOutcome, LedgerError> {
        match self.store.mark_split_paid(request_id, reference).await? {
            TransitionOutcome::Transitioned(request) => {
                info!(
                    request_id = %request_id,
                    booking_id = %request.booking_id,
                    reference = reference,
                    "Split payment request marked paid"
                );
                Ok(MarkPaidOutcome::Paid(request))
            }
            TransitionOutcome::AlreadyTerminal(request) => {
                debug!(
                    request_id = %request_id,
                    status = %request.status,
                    "Split payment request already terminal"
                );
                Ok(MarkPaidOutcome::AlreadyTerminal(request))
            }
            TransitionOutcome::NotFound => Err(LedgerError::RequestNotFound(request_id)),
        }
    }

    /// Conditionally move a request from `pending` to `expired`.
    pub async fn mark_expired(&self, request_id: Uuid) -> Result<MarkExpiredOutcome, LedgerError> {
        match self.store.mark_split_expired(request_id).await? {
            TransitionOutcome::Transitioned(request) => {
                info!(
                    request_id = %request_id,
                    booking_id = %request.booking_id,
                    "Split payment request expired"
                );
                Ok(MarkExpiredOutcome::Expired(request))
            }
            TransitionOutcome::AlreadyTerminal(request) => {
                Ok(MarkExpiredOutcome::AlreadyTerminal(request))
            }
            TransitionOutcome::NotFound => Err(LedgerError::RequestNotFound(request_id)),
        }
    }

    /// Record the registered payer for a request; `false` if it already had one
    /// or is no longer pending.
    pub async fn assign_recipient(
        &self,
        request_id: Uuid,
        recipient_id: Uuid,
    ) -> Result<bool, LedgerError> {
        let assigned = self
            .store
            .assign_split_recipient(request_id, recipient_id)
            .await?;
        if !assigned && self.store.get_split_request(request_id).await?.is_none() {
            return Err(LedgerError::RequestNotFound(request_id));
        }
        Ok(assigned)
    }

    /// Requests still pending past their deadline.
    pub async fn overdue_requests(
        &self,
        now: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<Uuid>, LedgerError> {
        Ok(self.store.overdue_split_requests(now, limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::SplitStatus;
    use crate::entities::booking::NewBooking;
    use crate::store::MemorySplitStore;
    use rust_decimal_macros::dec;

    #[test]
    fn test_allocate_uneven_total() {
        assert_eq!(
            allocate_shares(dec!(100), 3).unwrap(),
            vec![dec!(33), dec!(33), dec!(34)]
        );
    }

    #[test]
    fn test_allocate_sums_to_total() {
        for total in [dec!(1), dec!(7), dec!(99.99), dec!(300), dec!(1000.50), dec!(12345)] {
            for participants in 1..=12u32 {
                let Ok(shares) = allocate_shares(total, participants) else {
                    assert!(total < Decimal::from(participants));
                    continue;
                };
                assert_eq!(shares.len(), participants as usize);
                assert_eq!(shares.iter().copied().sum::<Decimal>(), total);
                assert!(shares.iter().all(|s| *s > Decimal::ZERO));
            }
        }
    }

    #[test]
    fn test_allocate_single_participant_takes_all() {
        assert_eq!(allocate_shares(dec!(250.75), 1).unwrap(), vec![dec!(250.75)]);
        assert_eq!(allocate_shares(dec!(0.50), 1).unwrap(), vec![dec!(0.50)]);
    }

    #[test]
    fn test_allocate_rejects_invalid_input() {
        assert!(matches!(
            allocate_shares(dec!(100), 0),
            Err(LedgerError::InvalidAmount { .. })
        ));
        assert!(matches!(
            allocate_shares(dec!(0), 2),
            Err(LedgerError::InvalidAmount { .. })
        ));
        assert!(matches!(
            allocate_shares(dec!(-5), 2),
            Err(LedgerError::InvalidAmount { .. })
        ));
        assert!(matches!(
            allocate_shares(dec!(2), 3),
            Err(LedgerError::InvalidAmount { .. })
        ));
    }

    async fn pending_booking(store: &MemorySplitStore, total: Decimal) -> Uuid {
        store
            .insert_booking(NewBooking {
                venue_id: Uuid::new_v4(),
                initiator_id: Uuid::new_v4(),
                total_amount: total,
                currency: "NGN".into(),
                party_size: 4,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_create_split_assigns_primary_request() {
        let store = Arc::new(MemorySplitStore::new());
        let ledger = SplitLedger::new(store.clone(), time::Duration::hours(24));
        let booking_id = pending_booking(&store, dec!(100)).await;
        let requester = Uuid::new_v4();

        let requests = ledger.create_split(booking_id, requester, 3).await.unwrap();

        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].recipient_id, Some(requester));
        assert!(requests[1..].iter().all(|r| r.recipient_id.is_none()));
        assert!(requests.iter().all(|r| r.status == SplitStatus::Pending));
        assert_eq!(
            requests.iter().map(|r| r.amount).collect::<Vec<_>>(),
            vec![dec!(33), dec!(33), dec!(34)]
        );
        assert_eq!(ledger.requests_for_booking(booking_id).await.unwrap(), requests);
    }

    #[tokio::test]
    async fn test_create_split_rejects_before_writing() {
        let store = Arc::new(MemorySplitStore::new());
        let ledger = SplitLedger::new(store.clone(), time::Duration::hours(24));
        let booking_id = pending_booking(&store, dec!(100)).await;

        let err = ledger
            .create_split(booking_id, Uuid::new_v4(), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount { .. }));
        assert!(ledger.requests_for_booking(booking_id).await.unwrap().is_empty());

        let err = ledger
            .create_split(Uuid::new_v4(), Uuid::new_v4(), 2)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::BookingNotFound(_)));
    }

    #[tokio::test]
    async fn test_create_split_caps_participants_at_party_size() {
        let store = Arc::new(MemorySplitStore::new());
        let ledger = SplitLedger::new(store.clone(), time::Duration::hours(24));
        let booking_id = pending_booking(&store, dec!(10000000000)).await;

        for participants in [5, 4_000_000_000] {
            let err = ledger
                .create_split(booking_id, Uuid::new_v4(), participants)
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                LedgerError::InvalidAmount { participants: p, .. } if p == participants
            ));
        }
        assert!(ledger.requests_for_booking(booking_id).await.unwrap().is_empty());

        let requests = ledger.create_split(booking_id, Uuid::new_v4(), 4).await.unwrap();
        assert_eq!(requests.len(), 4);
    }

    #[tokio::test]
    async fn test_create_split_twice_fails() {
        let store = Arc::new(MemorySplitStore::new());
        let ledger = SplitLedger::new(store.clone(), time::Duration::hours(24));
        let booking_id = pending_booking(&store, dec!(300)).await;

        ledger.create_split(booking_id, Uuid::new_v4(), 2).await.unwrap();
        let err = ledger
            .create_split(booking_id, Uuid::new_v4(), 2)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::SplitAlreadyExists(id) if id == booking_id));
    }

    #[tokio::test]
    async fn test_create_split_requires_pending_booking() {
        let store = Arc::new(MemorySplitStore::new());
        let ledger = SplitLedger::new(store.clone(), time::Duration::hours(24));
        let booking_id = pending_booking(&store, dec!(300)).await;
        store.cancel_booking_if_pending(booking_id).await.unwrap();

        let err = ledger
            .create_split(booking_id, Uuid::new_v4(), 2)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::BookingNotPending(_)));
    }

    #[tokio::test]
    async fn test_mark_paid_is_idempotent() {
        let store = Arc::new(MemorySplitStore::new());
        let ledger = SplitLedger::new(store.clone(), time::Duration::hours(24));
        let booking_id = pending_booking(&store, dec!(300)).await;
        let requests = ledger.create_split(booking_id, Uuid::new_v4(), 2).await.unwrap();

        let first = ledger.mark_paid(requests[0].id, "ref-a").await.unwrap();
        let second = ledger.mark_paid(requests[0].id, "ref-a").await.unwrap();
        assert!(matches!(first, MarkPaidOutcome::Paid(_)));
        assert!(matches!(second, MarkPaidOutcome::AlreadyTerminal(ref r) if r.status == SplitStatus::Paid));

        let expired = ledger.mark_expired(requests[0].id).await.unwrap();
        assert!(matches!(expired, MarkExpiredOutcome::AlreadyTerminal(_)));

        assert!(matches!(
            ledger.mark_paid(Uuid::new_v4(), "ref").await,
            Err(LedgerError::RequestNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_assign_recipient_unknown_request() {
        let store = Arc::new(MemorySplitStore::new());
        let ledger = SplitLedger::new(store, time::Duration::hours(24));
        assert!(matches!(
            ledger.assign_recipient(Uuid::new_v4(), Uuid::new_v4()).await,
            Err(LedgerError::RequestNotFound(_))
        ));
    }
}
