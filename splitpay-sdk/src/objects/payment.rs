//! Payment completion reports: the browser callback and the gateway webhook.

use compact_str::CompactString;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which channel reported a payment outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeSource {
    ClientCallback,
    Webhook,
}

impl std::fmt::Display for OutcomeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeSource::ClientCallback => write!(f, "client_callback"),
            OutcomeSource::Webhook => write!(f, "webhook"),
        }
    }
}

/// Body posted by the checkout page after the gateway redirects the payer back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCallbackRequest {
    pub request_id: Uuid,
    pub reference: String,
    pub amount: Decimal,
    #[serde(default = "default_succeeded")]
    pub succeeded: bool,
}

fn default_succeeded() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackOutcome {
    /// The payment was recorded and the booking is now confirmed.
    Confirmed,
    /// The payment was recorded; other participants still owe their share.
    PartiallyPaid,
    /// This payment had already been recorded.
    AlreadyProcessed,
    /// The payer reported a failed or abandoned payment.
    Declined,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackResponse {
    pub request_id: Uuid,
    pub outcome: CallbackOutcome,
    pub booking_confirmed: bool,
}

/// Inbound webhook from the payment gateway.
///
/// Amounts are in the currency's minor unit (kobo, cents).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayWebhookPayload {
    pub event_type: String,
    pub reference: String,
    pub amount: i64,
    pub currency: CompactString,
    pub metadata: WebhookMetadata,
}

impl GatewayWebhookPayload {
    pub const CHARGE_SUCCESS: &'static str = "charge.success";
    pub const CHARGE_FAILED: &'static str = "charge.failed";
}

/// Metadata echoed back by the gateway, as attached at initiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookMetadata {
    pub request_id: Uuid,
    #[serde(default)]
    pub booking_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAck {
    pub received: bool,
}
