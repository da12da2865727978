use crate::entities::BookingStatus;
use crate::framework::DatabaseProcessor;
use compact_str::CompactString;
use kanau::processor::Processor;
use rust_decimal::Decimal;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub venue_id: Uuid,
    pub initiator_id: Uuid,
    pub total_amount: Decimal,
    pub currency: CompactString,
    pub party_size: i32,
    pub status: BookingStatus,
    pub created_at: OffsetDateTime,
    pub confirmed_at: Option<OffsetDateTime>,
    pub cancelled_at: Option<OffsetDateTime>,
}

impl Booking {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        self.status.can_transition_to(next)
    }
}

/// Data for inserting a new booking.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub venue_id: Uuid,
    pub initiator_id: Uuid,
    pub total_amount: Decimal,
    pub currency: CompactString,
    pub party_size: i32,
}

const BOOKING_COLUMNS: &str = "id, venue_id, initiator_id, total_amount, currency, party_size, \
    status, created_at, confirmed_at, cancelled_at";

#[derive(Debug, Clone)]
pub struct InsertBooking {
    pub booking: NewBooking,
}

impl Processor<InsertBooking> for DatabaseProcessor {
    type Output = Booking;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertBooking")]
    async fn process(&self, cmd: InsertBooking) -> Result<Booking, sqlx::Error> {
        let NewBooking {
            venue_id,
            initiator_id,
            total_amount,
            currency,
            party_size,
        } = cmd.booking;
        let sql = format!(
            "INSERT INTO bookings (id, venue_id, initiator_id, total_amount, currency, party_size) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {BOOKING_COLUMNS}"
        );
        sqlx::query_as::<_, Booking>(&sql)
            .bind(Uuid::now_v7())
            .bind(venue_id)
            .bind(initiator_id)
            .bind(total_amount)
            .bind(currency.as_str())
            .bind(party_size)
            .fetch_one(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
pub struct GetBookingById {
    pub booking_id: Uuid,
}

impl Processor<GetBookingById> for DatabaseProcessor {
    type Output = Option<Booking>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetBookingById")]
    async fn process(&self, query: GetBookingById) -> Result<Option<Booking>, sqlx::Error> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1");
        sqlx::query_as::<_, Booking>(&sql)
            .bind(query.booking_id)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Move a booking from `pending` to `confirmed`.
///
/// Returns `true` only for the call that performed the transition.
pub struct ConfirmBookingIfPending {
    pub booking_id: Uuid,
}

impl Processor<ConfirmBookingIfPending> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ConfirmBookingIfPending")]
    async fn process(&self, cmd: ConfirmBookingIfPending) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'confirmed', confirmed_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(cmd.booking_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[derive(Debug, Clone)]
/// Move a booking from `pending` to `cancelled`.
///
/// Returns `true` only for the call that performed the transition.
pub struct CancelBookingIfPending {
    pub booking_id: Uuid,
}

impl Processor<CancelBookingIfPending> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CancelBookingIfPending")]
    async fn process(&self, cmd: CancelBookingIfPending) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'cancelled', cancelled_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(cmd.booking_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
