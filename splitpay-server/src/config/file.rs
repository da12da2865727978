//! TOML file configuration structures.
//!
//! These structs directly map to the `splitpay-config.toml` file format.

use serde::{Deserialize, Serialize};
use splitpay_core::config::LogFormat;
use std::net::{Ipv4Addr, SocketAddr};
use url::Url;
use uuid::Uuid;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub server: ServerConfig,
    pub admin: AdminConfig,
    pub merchant: MerchantConfig,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub splits: SplitsConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
    /// Public URL of this service; the gateway redirects payers back here.
    #[serde(default)]
    pub public_base_url: Option<Url>,
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
}

/// Admin configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// The admin secret. If this is plaintext (doesn't start with `$argon2`),
    /// it will be hashed and the config file will be rewritten.
    pub secret: String,
}

/// The marketplace backend calling the service API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantConfig {
    pub name: String,
    /// Secret key for signing API requests.
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub base_url: Url,
    pub secret_key: String,
    pub webhook_secret: String,
    /// Minor units per major unit (100 for kobo and cents).
    #[serde(default = "default_minor_unit_scale")]
    pub minor_unit_scale: u32,
    #[serde(default = "default_gateway_timeout")]
    pub timeout_secs: u64,
}

fn default_minor_unit_scale() -> u32 {
    100
}

fn default_gateway_timeout() -> u64 {
    15
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_sender")]
    pub sender: String,
    #[serde(default = "default_notification_timeout")]
    pub timeout_secs: u64,
    /// Tried in order until one accepts the message.
    #[serde(default = "default_providers")]
    pub providers: Vec<NotificationProvider>,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            sender: default_sender(),
            timeout_secs: default_notification_timeout(),
            providers: default_providers(),
        }
    }
}

fn default_sender() -> String {
    "no-reply@localhost".to_string()
}

fn default_notification_timeout() -> u64 {
    10
}

fn default_providers() -> Vec<NotificationProvider> {
    vec![NotificationProvider::Log]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NotificationProvider {
    Http {
        endpoint: Url,
        #[serde(default)]
        api_key: Option<String>,
    },
    Log,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DirectoryConfig {
    Http {
        base_url: Url,
        #[serde(default = "default_directory_timeout")]
        timeout_secs: u64,
    },
    Static {
        #[serde(default)]
        users: Vec<ContactEntry>,
        #[serde(default)]
        venues: Vec<ContactEntry>,
    },
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        DirectoryConfig::Static {
            users: Vec::new(),
            venues: Vec::new(),
        }
    }
}

fn default_directory_timeout() -> u64 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactEntry {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitsConfig {
    /// How long an unpaid split request stays payable.
    #[serde(default = "default_request_ttl")]
    pub request_ttl_secs: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_sweep_batch")]
    pub sweep_batch: i64,
}

impl Default for SplitsConfig {
    fn default() -> Self {
        Self {
            request_ttl_secs: default_request_ttl(),
            sweep_interval_secs: default_sweep_interval(),
            sweep_batch: default_sweep_batch(),
        }
    }
}

fn default_request_ttl() -> u64 {
    48 * 60 * 60
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_sweep_batch() -> i64 {
    100
}

impl FileConfig {
    /// Check if the admin secret is already hashed (argon2 format).
    pub fn is_admin_secret_hashed(&self) -> bool {
        self.admin.secret.starts_with("$argon2")
    }
}
