//! Configuration types for the split-payment service.
//!
//! These types represent the validated runtime configuration used by the server
//! and can be shared across crates. The actual config loading/parsing is handled
//! by the server crate.

mod admin;
mod config_store;
mod directory;
mod expiry;
mod gateway;
mod merchant;
mod notifications;
mod server;

pub use admin::AdminConfig;
pub use config_store::{ConfigStore, ConfigWatcher};
pub use directory::DirectoryConfig;
pub use expiry::ExpiryConfig;
pub use gateway::GatewayConfig;
pub use merchant::MerchantConfig;
pub use notifications::{NotificationProviderConfig, NotificationsConfig};
pub use server::{LogFormat, ServerConfig};

use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared configuration state with separate locks for each section.
///
/// Sections read on every request (admin, merchant, gateway webhook secret)
/// are reloaded in place on SIGHUP. The expiry sweep settings live in a
/// [`ConfigStore`] so the sweeper notices changes without polling.
#[derive(Clone)]
pub struct SharedConfig {
    pub server: Arc<RwLock<ServerConfig>>,
    pub admin: Arc<RwLock<AdminConfig>>,
    /// HMAC secret for the service API.
    pub merchant: Arc<RwLock<MerchantConfig>>,
    pub gateway: Arc<RwLock<GatewayConfig>>,
    pub expiry: ConfigStore<ExpiryConfig>,
}
