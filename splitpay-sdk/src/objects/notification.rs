//! Notification payloads handed to the external template renderer.
//!
//! Each payload is role-specific: a paying participant sees their own share,
//! the initiator sees the whole booking, the venue sees guest details.

use compact_str::CompactString;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const SPLIT_PAYMENT_RECEIPT_TEMPLATE: &str = "split_payment_receipt";
pub const BOOKING_CONFIRMED_INITIATOR_TEMPLATE: &str = "booking_confirmed_initiator";
pub const BOOKING_CONFIRMED_PARTICIPANT_TEMPLATE: &str = "booking_confirmed_participant";
pub const BOOKING_CONFIRMED_VENUE_TEMPLATE: &str = "booking_confirmed_venue";

/// Receipt for a single participant's payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitReceiptPayload {
    pub booking_id: Uuid,
    pub request_id: Uuid,
    pub recipient_name: String,
    pub amount_paid: Decimal,
    pub booking_total: Decimal,
    pub currency: CompactString,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiatorConfirmationPayload {
    pub booking_id: Uuid,
    pub recipient_name: String,
    pub total_amount: Decimal,
    pub currency: CompactString,
    pub participant_count: u32,
    pub party_size: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantConfirmationPayload {
    pub booking_id: Uuid,
    pub recipient_name: String,
    pub amount_paid: Decimal,
    pub total_amount: Decimal,
    pub currency: CompactString,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueConfirmationPayload {
    pub booking_id: Uuid,
    pub venue_id: Uuid,
    pub recipient_name: String,
    pub party_size: i32,
    pub total_amount: Decimal,
    pub currency: CompactString,
    /// Unix timestamp of confirmation.
    pub confirmed_at: i64,
}
