use crate::objects::split::SplitResponse;
use crate::signature::Signature;
use compact_str::CompactString;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Booking status for API responses.
///
/// This is the API/DTO version without sqlx::Type.
/// For database operations, use the version in `splitpay-core::entities`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingStatus::Pending => write!(f, "pending"),
            BookingStatus::Confirmed => write!(f, "confirmed"),
            BookingStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Request payload for registering a booking with the split-payment service.
///
/// Sent by the checkout backend to the Service API when a reservation is
/// initiated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    pub venue_id: Uuid,
    pub initiator_id: Uuid,
    pub total_amount: Decimal,
    pub currency: CompactString,
    pub party_size: i32,
}

impl Signature for CreateBookingRequest {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetBookingRequest {
    pub booking_id: Uuid,
}

impl Signature for GetBookingRequest {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelBookingRequest {
    pub booking_id: Uuid,
}

impl Signature for CancelBookingRequest {}

/// A booking together with its split-payment requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingResponse {
    pub booking_id: Uuid,
    pub venue_id: Uuid,
    pub initiator_id: Uuid,
    pub total_amount: Decimal,
    pub currency: CompactString,
    pub party_size: i32,
    pub status: BookingStatus,
    /// Unix timestamp of when the booking was created.
    pub created_at: i64,
    /// Unix timestamp of confirmation, if confirmed.
    pub confirmed_at: Option<i64>,
    #[serde(default)]
    pub splits: Vec<SplitResponse>,
}
