use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use url::Url;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    /// Public URL of this service, used to build payment callback URLs.
    pub public_base_url: Option<Url>,
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// Where the gateway should send the payer back to after checkout.
    pub fn payment_callback_url(&self) -> Option<Url> {
        self.public_base_url
            .as_ref()
            .and_then(|base| base.join("api/v1/payments/callback").ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_callback_url() {
        let mut config = ServerConfig {
            listen: SocketAddr::from(([127, 0, 0, 1], 8080)),
            public_base_url: None,
            log_format: LogFormat::Pretty,
        };
        assert!(config.payment_callback_url().is_none());

        config.public_base_url = Some(Url::parse("https://pay.example.com/").unwrap());
        assert_eq!(
            config.payment_callback_url().unwrap().as_str(),
            "https://pay.example.com/api/v1/payments/callback"
        );
    }
}
