//! Admin API configuration.

/// Admin authentication settings.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// Argon2 PHC string of the admin secret.
    pub secret_hash: String,
}

impl AdminConfig {
    pub fn new(secret_hash: String) -> Self {
        Self { secret_hash }
    }
}
