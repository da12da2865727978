use crate::entities::SplitStatus;
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use rust_decimal::Decimal;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SplitPaymentRequest {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub requester_id: Uuid,
    /// Unset until the invited payer registers.
    pub recipient_id: Option<Uuid>,
    /// Creation order within the booking, starting at 0.
    pub position: i32,
    pub amount: Decimal,
    pub status: SplitStatus,
    pub payment_reference: Option<String>,
    pub paid_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

/// Data for inserting a new split payment request.
#[derive(Debug, Clone)]
pub struct NewSplitRequest {
    pub booking_id: Uuid,
    pub requester_id: Uuid,
    pub recipient_id: Option<Uuid>,
    pub position: i32,
    pub amount: Decimal,
    pub expires_at: OffsetDateTime,
}

const SPLIT_COLUMNS: &str = "id, booking_id, requester_id, recipient_id, position, amount, \
    status, payment_reference, paid_at, created_at, expires_at";

#[derive(Debug, Clone)]
/// Insert every request of a split in one transaction.
///
/// The unique `(booking_id, position)` constraint rejects a second split
/// for the same booking.
pub struct InsertSplitRequests {
    pub requests: Vec<NewSplitRequest>,
}

impl Processor<InsertSplitRequests> for DatabaseProcessor {
    type Output = Vec<SplitPaymentRequest>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertSplitRequests")]
    async fn process(
        &self,
        insert: InsertSplitRequests,
    ) -> Result<Vec<SplitPaymentRequest>, sqlx::Error> {
        if insert.requests.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.begin().await?;

        let mut query_builder = sqlx::QueryBuilder::new(
            "INSERT INTO split_payment_requests \
            (id, booking_id, requester_id, recipient_id, position, amount, expires_at) ",
        );
        query_builder.push_values(insert.requests, |mut b, request| {
            b.push_bind(Uuid::now_v7())
                .push_bind(request.booking_id)
                .push_bind(request.requester_id)
                .push_bind(request.recipient_id)
                .push_bind(request.position)
                .push_bind(request.amount)
                .push_bind(request.expires_at);
        });
        query_builder.push(" RETURNING ");
        query_builder.push(SPLIT_COLUMNS);

        let mut inserted = query_builder
            .build_query_as::<SplitPaymentRequest>()
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;

        inserted.sort_by_key(|r| r.position);
        Ok(inserted)
    }
}

#[derive(Debug, Clone)]
pub struct GetSplitRequestById {
    pub request_id: Uuid,
}

impl Processor<GetSplitRequestById> for DatabaseProcessor {
    type Output = Option<SplitPaymentRequest>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetSplitRequestById")]
    async fn process(
        &self,
        query: GetSplitRequestById,
    ) -> Result<Option<SplitPaymentRequest>, sqlx::Error> {
        let sql = format!("SELECT {SPLIT_COLUMNS} FROM split_payment_requests WHERE id = $1");
        sqlx::query_as::<_, SplitPaymentRequest>(&sql)
            .bind(query.request_id)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
pub struct GetSplitRequestsForBooking {
    pub booking_id: Uuid,
}

impl Processor<GetSplitRequestsForBooking> for DatabaseProcessor {
    type Output = Vec<SplitPaymentRequest>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetSplitRequestsForBooking")]
    async fn process(
        &self,
        query: GetSplitRequestsForBooking,
    ) -> Result<Vec<SplitPaymentRequest>, sqlx::Error> {
        let sql = format!(
            "SELECT {SPLIT_COLUMNS} FROM split_payment_requests \
             WHERE booking_id = $1 ORDER BY position ASC"
        );
        sqlx::query_as::<_, SplitPaymentRequest>(&sql)
            .bind(query.booking_id)
            .fetch_all(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Conditionally mark a request paid.
///
/// Returns the updated row only if it was `pending`; `None` means another
/// writer already moved it to a terminal state (or the id is unknown).
pub struct MarkSplitRequestPaid {
    pub request_id: Uuid,
    pub reference: String,
}

impl Processor<MarkSplitRequestPaid> for DatabaseProcessor {
    type Output = Option<SplitPaymentRequest>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:MarkSplitRequestPaid")]
    async fn process(
        &self,
        cmd: MarkSplitRequestPaid,
    ) -> Result<Option<SplitPaymentRequest>, sqlx::Error> {
        let sql = format!(
            "UPDATE split_payment_requests \
             SET status = 'paid', payment_reference = $2, paid_at = NOW() \
             WHERE id = $1 AND status = 'pending' \
             RETURNING {SPLIT_COLUMNS}"
        );
        sqlx::query_as::<_, SplitPaymentRequest>(&sql)
            .bind(cmd.request_id)
            .bind(cmd.reference)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Conditionally mark a request expired. Same contract as [`MarkSplitRequestPaid`].
pub struct MarkSplitRequestExpired {
    pub request_id: Uuid,
}

impl Processor<MarkSplitRequestExpired> for DatabaseProcessor {
    type Output = Option<SplitPaymentRequest>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:MarkSplitRequestExpired")]
    async fn process(
        &self,
        cmd: MarkSplitRequestExpired,
    ) -> Result<Option<SplitPaymentRequest>, sqlx::Error> {
        let sql = format!(
            "UPDATE split_payment_requests \
             SET status = 'expired' \
             WHERE id = $1 AND status = 'pending' \
             RETURNING {SPLIT_COLUMNS}"
        );
        sqlx::query_as::<_, SplitPaymentRequest>(&sql)
            .bind(cmd.request_id)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Attach a registered payer to a request that has none yet.
pub struct AssignSplitRecipient {
    pub request_id: Uuid,
    pub recipient_id: Uuid,
}

impl Processor<AssignSplitRecipient> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:AssignSplitRecipient")]
    async fn process(&self, cmd: AssignSplitRecipient) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE split_payment_requests
            SET recipient_id = $2
            WHERE id = $1 AND recipient_id IS NULL AND status = 'pending'
            "#,
        )
        .bind(cmd.request_id)
        .bind(cmd.recipient_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[derive(Debug, Clone)]
/// IDs of pending requests whose expiry deadline has passed, oldest first.
pub struct GetOverdueSplitRequestIds {
    pub now: OffsetDateTime,
    pub limit: i64,
}

impl Processor<GetOverdueSplitRequestIds> for DatabaseProcessor {
    type Output = Vec<Uuid>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetOverdueSplitRequestIds")]
    async fn process(&self, query: GetOverdueSplitRequestIds) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id
            FROM split_payment_requests
            WHERE status = 'pending' AND expires_at <= $1
            ORDER BY expires_at ASC
            LIMIT $2
            "#,
        )
        .bind(query.now)
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await
    }
}
