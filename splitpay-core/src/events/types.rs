//! Event type definitions.

use crate::entities::notification_delivery::NotificationEvent;
use uuid::Uuid;

/// A state transition other components react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainEvent {
    /// A split request was paid but the booking is not yet complete.
    PartialPaymentReceived { request_id: Uuid, booking_id: Uuid },
    /// The booking moved to `confirmed`.
    BookingConfirmed { booking_id: Uuid },
}

impl DomainEvent {
    pub fn booking_id(&self) -> Uuid {
        match self {
            DomainEvent::PartialPaymentReceived { booking_id, .. } => *booking_id,
            DomainEvent::BookingConfirmed { booking_id } => *booking_id,
        }
    }

    /// The entity notifications for this event are deduplicated against.
    pub fn subject_id(&self) -> Uuid {
        match self {
            DomainEvent::PartialPaymentReceived { request_id, .. } => *request_id,
            DomainEvent::BookingConfirmed { booking_id } => *booking_id,
        }
    }

    pub fn notification_event(&self) -> NotificationEvent {
        match self {
            DomainEvent::PartialPaymentReceived { .. } => NotificationEvent::PartialPaymentReceived,
            DomainEvent::BookingConfirmed { .. } => NotificationEvent::BookingConfirmed,
        }
    }
}

impl std::fmt::Display for DomainEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DomainEvent::PartialPaymentReceived { request_id, .. } => {
                write!(f, "partial_payment_received:{request_id}")
            }
            DomainEvent::BookingConfirmed { booking_id } => {
                write!(f, "booking_confirmed:{booking_id}")
            }
        }
    }
}
