//! Payment gateway configuration.

use crate::gateway::{HttpPaymentGateway, MinorUnitScale, WebhookVerifier};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: Url,
    /// Bearer token for the gateway REST API.
    pub secret_key: String,
    /// HMAC key for inbound webhook signatures.
    pub webhook_secret: Box<[u8]>,
    pub minor_unit_scale: MinorUnitScale,
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn http_gateway(&self) -> HttpPaymentGateway {
        HttpPaymentGateway::new(
            self.base_url.clone(),
            self.secret_key.clone(),
            self.minor_unit_scale,
            self.timeout,
        )
    }

    pub fn webhook_verifier(&self) -> WebhookVerifier {
        WebhookVerifier::new(self.webhook_secret.clone(), self.minor_unit_scale)
    }
}
