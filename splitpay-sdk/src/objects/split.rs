use crate::signature::Signature;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Split payment request status for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitStatus {
    Pending,
    Paid,
    Expired,
}

impl std::fmt::Display for SplitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SplitStatus::Pending => write!(f, "pending"),
            SplitStatus::Paid => write!(f, "paid"),
            SplitStatus::Expired => write!(f, "expired"),
        }
    }
}

/// Request payload for dividing a booking among `participant_count` payers.
///
/// The first created request belongs to `requester_id` (the initiator's own
/// share); the others wait for an invited payer to register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSplitRequest {
    pub booking_id: Uuid,
    pub requester_id: Uuid,
    pub participant_count: u32,
}

impl Signature for CreateSplitRequest {}

/// Attach a registered payer to an open split request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignRecipientRequest {
    pub request_id: Uuid,
    pub recipient_id: Uuid,
}

impl Signature for AssignRecipientRequest {}

/// Start a gateway charge for one split request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiateSplitPaymentRequest {
    pub request_id: Uuid,
    /// Where the gateway should send the payer's browser afterwards.
    /// Falls back to the server's configured callback page.
    #[serde(default)]
    pub callback_url: Option<String>,
}

impl Signature for InitiateSplitPaymentRequest {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitResponse {
    pub request_id: Uuid,
    pub booking_id: Uuid,
    pub requester_id: Uuid,
    pub recipient_id: Option<Uuid>,
    pub amount: Decimal,
    pub status: SplitStatus,
    pub payment_reference: Option<String>,
    pub paid_at: Option<i64>,
    pub expires_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitCreatedResponse {
    pub booking_id: Uuid,
    pub requests: Vec<SplitResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInitiationResponse {
    pub request_id: Uuid,
    pub reference: String,
    pub redirect_url: Option<String>,
    pub client_secret: Option<String>,
}
