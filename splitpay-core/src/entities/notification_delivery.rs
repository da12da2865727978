use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use uuid::Uuid;

/// Kind of notification, used as part of the delivery dedup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "notification_event")]
pub enum NotificationEvent {
    PartialPaymentReceived,
    BookingConfirmed,
}

impl std::fmt::Display for NotificationEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationEvent::PartialPaymentReceived => write!(f, "partial_payment_received"),
            NotificationEvent::BookingConfirmed => write!(f, "booking_confirmed"),
        }
    }
}

/// Identifies one logical notification: what it is about, which event, and who gets it.
///
/// `subject_id` is the split request id for receipts and the booking id for
/// confirmations. `recipient_id` is the user or venue receiving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotificationKey {
    pub subject_id: Uuid,
    pub event: NotificationEvent,
    pub recipient_id: Uuid,
}

#[derive(Debug, Clone)]
/// Record that a notification is about to be sent.
///
/// Returns `false` if the same key was claimed before, in which case the
/// caller must not send.
pub struct ClaimNotificationDelivery {
    pub key: NotificationKey,
}

impl Processor<ClaimNotificationDelivery> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ClaimNotificationDelivery")]
    async fn process(&self, cmd: ClaimNotificationDelivery) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO notification_deliveries (subject_id, event, recipient_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (subject_id, event, recipient_id) DO NOTHING
            "#,
        )
        .bind(cmd.key.subject_id)
        .bind(cmd.key.event)
        .bind(cmd.key.recipient_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
