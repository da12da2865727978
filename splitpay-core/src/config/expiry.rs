use std::time::Duration;

/// Settings for the background expiry sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryConfig {
    /// How long a new split request stays payable.
    pub request_ttl: Duration,
    pub sweep_interval: Duration,
    /// Maximum requests expired per tick.
    pub sweep_batch: i64,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            request_ttl: Duration::from_secs(48 * 60 * 60),
            sweep_interval: Duration::from_secs(60),
            sweep_batch: 100,
        }
    }
}
