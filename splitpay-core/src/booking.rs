//! Booking Aggregate.
//!
//! The booking's `status` only moves through the guarded transitions here.
//! Confirmation is driven by the reconciliation engine; cancellation is
//! refused once the booking is confirmed and cascades to the split requests.

use crate::entities::BookingStatus;
use crate::entities::booking::{Booking, NewBooking};
use crate::ledger::{LedgerError, MarkExpiredOutcome, SplitLedger};
use crate::store::{SplitStore, StoreError};
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("booking not found: {0}")]
    NotFound(Uuid),

    #[error("booking {0} is already confirmed")]
    AlreadyConfirmed(Uuid),

    #[error("invalid booking: {0}")]
    Invalid(&'static str),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Result of [`BookingAggregate::cancel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelOutcome {
    /// Whether this call moved the booking to `cancelled`.
    pub cancelled: bool,
    /// Split requests expired by the cascade.
    pub expired_requests: Vec<Uuid>,
}

pub struct BookingAggregate<S> {
    store: Arc<S>,
}

impl<S> Clone for BookingAggregate<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: SplitStore> BookingAggregate<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Register a new pending booking.
    pub async fn register(&self, booking: NewBooking) -> Result<Booking, BookingError> {
        if booking.total_amount <= Decimal::ZERO {
            return Err(BookingError::Invalid("total amount must be positive"));
        }
        if booking.party_size < 1 {
            return Err(BookingError::Invalid("party size must be at least 1"));
        }
        if booking.currency.len() != 3 || !booking.currency.chars().all(|c| c.is_ascii_uppercase())
        {
            return Err(BookingError::Invalid("currency must be an ISO-4217 code"));
        }
        let booking = self.store.insert_booking(booking).await?;
        info!(
            booking_id = %booking.id,
            venue_id = %booking.venue_id,
            total = %booking.total_amount,
            currency = %booking.currency,
            "Booking registered"
        );
        Ok(booking)
    }

    pub async fn get(&self, booking_id: Uuid) -> Result<Booking, BookingError> {
        self.store
            .get_booking(booking_id)
            .await?
            .ok_or(BookingError::NotFound(booking_id))
    }

    /// Move the booking from `pending` to `confirmed`.
    ///
    /// Returns `true` iff this call performed the transition; `false` when it
    /// was already confirmed or cancelled.
    pub async fn confirm_if_pending(&self, booking_id: Uuid) -> Result<bool, BookingError> {
        let confirmed = self.store.confirm_booking_if_pending(booking_id).await?;
        if confirmed {
            info!(booking_id = %booking_id, "Booking confirmed");
        }
        Ok(confirmed)
    }

    /// Cancel a pending booking and expire its pending split requests.
    ///
    /// Cancelling an already cancelled booking is a no-op that still sweeps
    /// any request left pending by an interrupted earlier cancel.
    pub async fn cancel(
        &self,
        booking_id: Uuid,
        ledger: &SplitLedger<S>,
    ) -> Result<CancelOutcome, BookingError> {
        let cancelled = self.store.cancel_booking_if_pending(booking_id).await?;
        if !cancelled {
            let booking = self.get(booking_id).await?;
            if booking.status == BookingStatus::Confirmed {
                return Err(BookingError::AlreadyConfirmed(booking_id));
            }
        }

        let mut expired_requests = Vec::new();
        for request in ledger.requests_for_booking(booking_id).await? {
            if request.status.is_terminal() {
                continue;
            }
            match ledger.mark_expired(request.id).await {
                Ok(MarkExpiredOutcome::Expired(r)) => expired_requests.push(r.id),
                Ok(MarkExpiredOutcome::AlreadyTerminal(_)) => {}
                Err(e) => {
                    warn!(
                        booking_id = %booking_id,
                        request_id = %request.id,
                        error = %e,
                        "Failed to expire split request during cancel"
                    );
                    return Err(e.into());
                }
            }
        }

        if cancelled {
            info!(
                booking_id = %booking_id,
                expired = expired_requests.len(),
                "Booking cancelled"
            );
        }

        Ok(CancelOutcome {
            cancelled,
            expired_requests,
        })
    }
}
