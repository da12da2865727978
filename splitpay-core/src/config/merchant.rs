//! Merchant configuration.

/// The marketplace backend allowed to call the service API.
#[derive(Debug, Clone)]
pub struct MerchantConfig {
    /// Human-readable merchant name.
    pub name: String,
    /// Secret key bytes for HMAC signing.
    pub secret: Box<[u8]>,
}

impl MerchantConfig {
    pub fn new(name: String, secret: impl Into<Box<[u8]>>) -> Self {
        Self {
            name,
            secret: secret.into(),
        }
    }

    /// Get the secret key bytes for HMAC signing.
    pub fn secret_bytes(&self) -> &[u8] {
        &self.secret
    }
}
