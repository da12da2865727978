//! Runtime configuration re-exports.
//!
//! The validated runtime types live in `splitpay-core::config` so the
//! background processors can share them.

pub use splitpay_core::config::{
    AdminConfig, ConfigStore, DirectoryConfig, ExpiryConfig, GatewayConfig, MerchantConfig,
    NotificationProviderConfig, NotificationsConfig, ServerConfig, SharedConfig,
};
