//! Persistence port for bookings, split requests, and notification claims.
//!
//! Every mutation is a conditional write: it only succeeds from the expected
//! prior state and reports whether it changed anything. Callers never hold a
//! lock across calls; concurrent writers race on these primitives and exactly
//! one of them wins.

mod memory;
mod postgres;

pub use memory::MemorySplitStore;
pub use postgres::PgSplitStore;

use crate::entities::booking::{Booking, NewBooking};
use crate::entities::notification_delivery::NotificationKey;
use crate::entities::split_request::{NewSplitRequest, SplitPaymentRequest};
use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

/// Errors raised by a [`SplitStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A split already exists for this booking
    #[error("booking {0} already has split payment requests")]
    SplitAlreadyExists(Uuid),

    /// The payment reference is already recorded on another request
    #[error("payment reference {0} is already applied to another request")]
    ReferenceAlreadyUsed(String),
}

/// Result of a conditional `pending -> terminal` write on a split request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// This call performed the transition; carries the updated record.
    Transitioned(SplitPaymentRequest),
    /// The request was already terminal; carries the record as it is now.
    AlreadyTerminal(SplitPaymentRequest),
    /// No request with this id exists.
    NotFound,
}

#[async_trait]
pub trait SplitStore: Send + Sync {
    async fn insert_booking(&self, booking: NewBooking) -> Result<Booking, StoreError>;

    async fn get_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, StoreError>;

    /// `pending -> confirmed`; `true` iff this call performed it.
    async fn confirm_booking_if_pending(&self, booking_id: Uuid) -> Result<bool, StoreError>;

    /// `pending -> cancelled`; `true` iff this call performed it.
    async fn cancel_booking_if_pending(&self, booking_id: Uuid) -> Result<bool, StoreError>;

    /// Insert all requests of one split atomically.
    ///
    /// Fails with [`StoreError::SplitAlreadyExists`] if the booking already
    /// has requests.
    async fn insert_split_requests(
        &self,
        booking_id: Uuid,
        requests: Vec<NewSplitRequest>,
    ) -> Result<Vec<SplitPaymentRequest>, StoreError>;

    async fn get_split_request(
        &self,
        request_id: Uuid,
    ) -> Result<Option<SplitPaymentRequest>, StoreError>;

    /// All requests of a booking, ordered by position.
    async fn split_requests_for_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<Vec<SplitPaymentRequest>, StoreError>;

    /// `pending -> paid`, recording `reference`.
    ///
    /// Fails with [`StoreError::ReferenceAlreadyUsed`] if another request
    /// already carries the same reference.
    async fn mark_split_paid(
        &self,
        request_id: Uuid,
        reference: &str,
    ) -> Result<TransitionOutcome, StoreError>;

    async fn mark_split_expired(&self, request_id: Uuid) -> Result<TransitionOutcome, StoreError>;

    /// Set `recipient_id` on a pending request that has none; `true` iff set.
    async fn assign_split_recipient(
        &self,
        request_id: Uuid,
        recipient_id: Uuid,
    ) -> Result<bool, StoreError>;

    /// Pending requests whose `expires_at` is at or before `now`.
    async fn overdue_split_requests(
        &self,
        now: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<Uuid>, StoreError>;

    /// Claim a notification dedup key; `false` if it was already claimed.
    async fn claim_notification(&self, key: NotificationKey) -> Result<bool, StoreError>;
}
