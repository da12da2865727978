//! Payment Gateway Adapter.
//!
//! The reconciliation engine talks to the payment processor only through
//! [`PaymentGateway`]: start a charge, and re-verify a reference before any
//! reported outcome is trusted. Inbound webhooks are authenticated and
//! normalized into [`PaymentOutcome`]s here as well, so both completion
//! channels reach the engine in the same shape.

mod http;

pub use http::HttpPaymentGateway;

use async_trait::async_trait;
use compact_str::CompactString;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use splitpay_sdk::objects::{GatewayWebhookPayload, OutcomeSource, PaymentCallbackRequest};
use splitpay_sdk::signature::{self, SignatureError};
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by a payment gateway integration.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Gateway endpoint URL could not be built
    #[error("invalid gateway URL: {0}")]
    Url(#[from] url::ParseError),

    /// The gateway answered with a non-success status
    #[error("gateway rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The gateway answered with something we could not interpret
    #[error("invalid gateway response: {0}")]
    InvalidResponse(String),

    /// Webhook signature did not verify
    #[error("invalid webhook signature: {0}")]
    InvalidSignature(#[from] SignatureError),

    /// Webhook event type this service does not act on
    #[error("unsupported webhook event: {0}")]
    UnsupportedEvent(String),
}

/// A charge to start for one split request.
#[derive(Debug, Clone)]
pub struct InitiatePayment {
    pub request_id: Uuid,
    pub booking_id: Uuid,
    pub amount: Decimal,
    pub currency: CompactString,
    pub callback_url: Option<url::Url>,
}

/// What the payer needs to complete a charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentInitiation {
    pub reference: String,
    /// Hosted payment page, for redirect flows.
    pub redirect_url: Option<String>,
    /// Client secret, for embedded card flows.
    pub client_secret: Option<String>,
}

/// The gateway's own account of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayVerification {
    pub reference: String,
    /// Request id echoed from the metadata attached at initiation.
    pub request_id: Option<Uuid>,
    pub succeeded: bool,
    pub amount_paid: Decimal,
    pub currency: CompactString,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initiate(&self, payment: InitiatePayment) -> Result<PaymentInitiation, GatewayError>;

    async fn verify(&self, reference: &str) -> Result<GatewayVerification, GatewayError>;
}

#[async_trait]
impl<G: PaymentGateway + ?Sized> PaymentGateway for std::sync::Arc<G> {
    async fn initiate(&self, payment: InitiatePayment) -> Result<PaymentInitiation, GatewayError> {
        (**self).initiate(payment).await
    }

    async fn verify(&self, reference: &str) -> Result<GatewayVerification, GatewayError> {
        (**self).verify(reference).await
    }
}

/// A reported payment result, from either completion channel.
///
/// Never trusted as-is: the engine re-verifies `external_reference` with the
/// gateway before applying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentOutcome {
    pub request_id: Uuid,
    pub external_reference: String,
    pub amount_paid: Decimal,
    pub succeeded: bool,
    pub source: OutcomeSource,
}

impl From<PaymentCallbackRequest> for PaymentOutcome {
    fn from(callback: PaymentCallbackRequest) -> Self {
        Self {
            request_id: callback.request_id,
            external_reference: callback.reference,
            amount_paid: callback.amount,
            succeeded: callback.succeeded,
            source: OutcomeSource::ClientCallback,
        }
    }
}

/// Converts between major units (naira, dollars) and the gateway's minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinorUnitScale(u32);

impl MinorUnitScale {
    pub const fn new(scale: u32) -> Self {
        Self(scale)
    }

    pub fn to_major(self, minor: i64) -> Decimal {
        Decimal::from(minor) / Decimal::from(self.0)
    }

    pub fn to_minor(self, major: Decimal) -> Option<i64> {
        let minor = major * Decimal::from(self.0);
        if minor.fract() != Decimal::ZERO {
            return None;
        }
        minor.to_i64()
    }
}

impl Default for MinorUnitScale {
    fn default() -> Self {
        Self(100)
    }
}

/// Authenticates and normalizes inbound gateway webhooks.
#[derive(Debug, Clone)]
pub struct WebhookVerifier {
    secret: Box<[u8]>,
    scale: MinorUnitScale,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<Box<[u8]>>, scale: MinorUnitScale) -> Self {
        Self {
            secret: secret.into(),
            scale,
        }
    }

    /// Check the signature header against the raw body, then parse it.
    pub fn authenticate(
        &self,
        signature_header: &str,
        body: &[u8],
    ) -> Result<GatewayWebhookPayload, GatewayError> {
        signature::verify_header(signature_header, body, &self.secret)?;
        serde_json::from_slice(body)
            .map_err(|e| GatewayError::InvalidResponse(format!("webhook body: {e}")))
    }

    /// Authenticate a webhook and normalize it in one step.
    pub fn verify_webhook(
        &self,
        signature_header: &str,
        body: &[u8],
    ) -> Result<PaymentOutcome, GatewayError> {
        let payload = self.authenticate(signature_header, body)?;
        self.normalize(payload)
    }

    /// Turn an authenticated webhook into a [`PaymentOutcome`].
    pub fn normalize(&self, payload: GatewayWebhookPayload) -> Result<PaymentOutcome, GatewayError> {
        let succeeded = match payload.event_type.as_str() {
            GatewayWebhookPayload::CHARGE_SUCCESS => true,
            GatewayWebhookPayload::CHARGE_FAILED => false,
            _ => return Err(GatewayError::UnsupportedEvent(payload.event_type)),
        };
        Ok(PaymentOutcome {
            request_id: payload.metadata.request_id,
            external_reference: payload.reference,
            amount_paid: self.scale.to_major(payload.amount),
            succeeded,
            source: OutcomeSource::Webhook,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use splitpay_sdk::objects::WebhookMetadata;

    fn payload(event_type: &str) -> GatewayWebhookPayload {
        GatewayWebhookPayload {
            event_type: event_type.to_string(),
            reference: "SPL-abc".to_string(),
            amount: 15_000,
            currency: "NGN".into(),
            metadata: WebhookMetadata {
                request_id: Uuid::nil(),
                booking_id: None,
            },
        }
    }

    #[test]
    fn test_minor_unit_conversion() {
        let scale = MinorUnitScale::default();
        assert_eq!(scale.to_major(15_050), dec!(150.50));
        assert_eq!(scale.to_minor(dec!(150.50)), Some(15_050));
        assert_eq!(scale.to_minor(dec!(0.001)), None);
    }

    #[test]
    fn test_normalize_success_and_failure() {
        let verifier = WebhookVerifier::new(b"hook".to_vec(), MinorUnitScale::default());
        let ok = verifier.normalize(payload("charge.success")).unwrap();
        assert!(ok.succeeded);
        assert_eq!(ok.amount_paid, dec!(150));
        assert_eq!(ok.source, OutcomeSource::Webhook);

        let failed = verifier.normalize(payload("charge.failed")).unwrap();
        assert!(!failed.succeeded);

        assert!(matches!(
            verifier.normalize(payload("transfer.success")),
            Err(GatewayError::UnsupportedEvent(_))
        ));
    }

    #[test]
    fn test_authenticate_checks_signature() {
        let verifier = WebhookVerifier::new(b"hook".to_vec(), MinorUnitScale::default());
        let body = serde_json::to_vec(&payload("charge.success")).unwrap();

        let good = signature::sign_body(&body, b"hook");
        assert_eq!(
            verifier.authenticate(&good, &body).unwrap(),
            payload("charge.success")
        );

        let bad = signature::sign_body(&body, b"not-the-secret");
        assert!(matches!(
            verifier.authenticate(&bad, &body),
            Err(GatewayError::InvalidSignature(_))
        ));
    }
}
