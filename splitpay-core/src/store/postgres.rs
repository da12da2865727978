use super::{SplitStore, StoreError, TransitionOutcome};
use crate::entities::booking::{
    Booking, CancelBookingIfPending, ConfirmBookingIfPending, GetBookingById, InsertBooking,
    NewBooking,
};
use crate::entities::notification_delivery::{ClaimNotificationDelivery, NotificationKey};
use crate::entities::split_request::{
    AssignSplitRecipient, GetOverdueSplitRequestIds, GetSplitRequestById,
    GetSplitRequestsForBooking, InsertSplitRequests, MarkSplitRequestExpired,
    MarkSplitRequestPaid, NewSplitRequest, SplitPaymentRequest,
};
use crate::framework::{DatabaseProcessor, is_unique_violation};
use async_trait::async_trait;
use kanau::processor::Processor;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

/// [`SplitStore`] backed by Postgres through the entity processors.
#[derive(Clone)]
pub struct PgSplitStore {
    processor: DatabaseProcessor,
}

impl PgSplitStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            processor: DatabaseProcessor::new(pool),
        }
    }

    /// Resolve a conditional update that matched no row.
    async fn terminal_or_missing(&self, request_id: Uuid) -> Result<TransitionOutcome, StoreError> {
        let current = self
            .processor
            .process(GetSplitRequestById { request_id })
            .await?;
        Ok(match current {
            Some(request) => TransitionOutcome::AlreadyTerminal(request),
            None => TransitionOutcome::NotFound,
        })
    }
}

#[async_trait]
impl SplitStore for PgSplitStore {
    async fn insert_booking(&self, booking: NewBooking) -> Result<Booking, StoreError> {
        Ok(self.processor.process(InsertBooking { booking }).await?)
    }

    async fn get_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, StoreError> {
        Ok(self.processor.process(GetBookingById { booking_id }).await?)
    }

    async fn confirm_booking_if_pending(&self, booking_id: Uuid) -> Result<bool, StoreError> {
        Ok(self
            .processor
            .process(ConfirmBookingIfPending { booking_id })
            .await?)
    }

    async fn cancel_booking_if_pending(&self, booking_id: Uuid) -> Result<bool, StoreError> {
        Ok(self
            .processor
            .process(CancelBookingIfPending { booking_id })
            .await?)
    }

    async fn insert_split_requests(
        &self,
        booking_id: Uuid,
        requests: Vec<NewSplitRequest>,
    ) -> Result<Vec<SplitPaymentRequest>, StoreError> {
        match self.processor.process(InsertSplitRequests { requests }).await {
            Ok(inserted) => Ok(inserted),
            Err(e) if is_unique_violation(&e) => Err(StoreError::SplitAlreadyExists(booking_id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_split_request(
        &self,
        request_id: Uuid,
    ) -> Result<Option<SplitPaymentRequest>, StoreError> {
        Ok(self
            .processor
            .process(GetSplitRequestById { request_id })
            .await?)
    }

    async fn split_requests_for_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<Vec<SplitPaymentRequest>, StoreError> {
        Ok(self
            .processor
            .process(GetSplitRequestsForBooking { booking_id })
            .await?)
    }

    async fn mark_split_paid(
        &self,
        request_id: Uuid,
        reference: &str,
    ) -> Result<TransitionOutcome, StoreError> {
        let updated = match self
            .processor
            .process(MarkSplitRequestPaid {
                request_id,
                reference: reference.to_owned(),
            })
            .await
        {
            Ok(updated) => updated,
            Err(e) if is_unique_violation(&e) => {
                return Err(StoreError::ReferenceAlreadyUsed(reference.to_owned()));
            }
            Err(e) => return Err(e.into()),
        };
        match updated {
            Some(request) => Ok(TransitionOutcome::Transitioned(request)),
            None => self.terminal_or_missing(request_id).await,
        }
    }

    async fn mark_split_expired(&self, request_id: Uuid) -> Result<TransitionOutcome, StoreError> {
        let updated = self
            .processor
            .process(MarkSplitRequestExpired { request_id })
            .await?;
        match updated {
            Some(request) => Ok(TransitionOutcome::Transitioned(request)),
            None => self.terminal_or_missing(request_id).await,
        }
    }

    async fn assign_split_recipient(
        &self,
        request_id: Uuid,
        recipient_id: Uuid,
    ) -> Result<bool, StoreError> {
        Ok(self
            .processor
            .process(AssignSplitRecipient {
                request_id,
                recipient_id,
            })
            .await?)
    }

    async fn overdue_split_requests(
        &self,
        now: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<Uuid>, StoreError> {
        Ok(self
            .processor
            .process(GetOverdueSplitRequestIds { now, limit })
            .await?)
    }

    async fn claim_notification(&self, key: NotificationKey) -> Result<bool, StoreError> {
        Ok(self
            .processor
            .process(ClaimNotificationDelivery { key })
            .await?)
    }
}
