//! Configuration module for splitpay-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables. Also handles admin secret hashing.

pub mod file;
pub mod runtime;

use crate::config::file::{
    ContactEntry, DirectoryConfig as FileDirectoryConfig, FileConfig,
    NotificationProvider as FileNotificationProvider,
};
use crate::config::runtime::{
    AdminConfig, ConfigStore, DirectoryConfig, ExpiryConfig, GatewayConfig, MerchantConfig,
    NotificationProviderConfig, NotificationsConfig, ServerConfig, SharedConfig,
};
use splitpay_core::directory::Contact;
use splitpay_core::gateway::MinorUnitScale;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("password hashing error: {0}")]
    HashError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Loaded configuration result containing all parts.
pub struct LoadedConfig {
    pub server: ServerConfig,
    pub admin: AdminConfig,
    pub merchant: MerchantConfig,
    pub gateway: GatewayConfig,
    pub notifications: NotificationsConfig,
    pub directory: DirectoryConfig,
    pub expiry: ExpiryConfig,
    /// The plaintext admin secret was replaced by its hash on this load.
    pub admin_secret_rehashed: bool,
}

impl LoadedConfig {
    /// Convert the reloadable sections into a [`SharedConfig`].
    ///
    /// Notification and directory settings are only read at startup.
    pub fn into_shared(self) -> SharedConfig {
        SharedConfig {
            server: Arc::new(RwLock::new(self.server)),
            admin: Arc::new(RwLock::new(self.admin)),
            merchant: Arc::new(RwLock::new(self.merchant)),
            gateway: Arc::new(RwLock::new(self.gateway)),
            expiry: ConfigStore::new(self.expiry),
        }
    }
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI overrides
    /// 3. Validate the configuration
    /// 4. Hash the admin secret if it's plaintext (and rewrite the file)
    /// 5. Build the runtime configuration
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let mut file_config: FileConfig = toml::from_str(&config_content)?;

        validate(&file_config)?;

        let admin_secret_rehashed = !file_config.is_admin_secret_hashed();
        if admin_secret_rehashed {
            file_config.admin.secret = hash_secret(&file_config.admin.secret)?;
            // Rewrite before the CLI override so it never lands in the file.
            self.rewrite_config(&file_config)?;
        }

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        Ok(LoadedConfig {
            admin_secret_rehashed,
            ..build_loaded_config(file_config)
        })
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }

    fn rewrite_config(&self, config: &FileConfig) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(config)?;

        // Write atomically: write to temp file, then rename
        let temp_path = self.config_path.with_extension("toml.tmp");
        std::fs::write(&temp_path, toml_string)?;
        std::fs::rename(&temp_path, &self.config_path)?;

        Ok(())
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    if config.admin.secret.is_empty() {
        return Err(ConfigError::ValidationError(
            "admin secret must not be empty".to_string(),
        ));
    }
    if config.merchant.secret.is_empty() {
        return Err(ConfigError::ValidationError(
            "merchant secret must not be empty".to_string(),
        ));
    }
    if config.gateway.webhook_secret.is_empty() {
        return Err(ConfigError::ValidationError(
            "gateway webhook secret must not be empty".to_string(),
        ));
    }
    if config.gateway.minor_unit_scale == 0 {
        return Err(ConfigError::ValidationError(
            "gateway minor_unit_scale must be positive".to_string(),
        ));
    }
    if config.splits.request_ttl_secs == 0 || config.splits.sweep_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "split request ttl and sweep interval must be positive".to_string(),
        ));
    }
    if config.splits.sweep_batch < 1 {
        return Err(ConfigError::ValidationError(
            "sweep_batch must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn hash_secret(plaintext: &str) -> Result<String, ConfigError> {
    use argon2::{
        Argon2, PasswordHasher,
        password_hash::{SaltString, rand_core::OsRng},
    };

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ConfigError::HashError(e.to_string()))
}

fn build_loaded_config(file_config: FileConfig) -> LoadedConfig {
    let FileConfig {
        server,
        admin,
        merchant,
        gateway,
        notifications,
        directory,
        splits,
    } = file_config;

    LoadedConfig {
        server: ServerConfig {
            listen: server.listen,
            public_base_url: server.public_base_url,
            log_format: server.log_format,
        },
        admin: AdminConfig::new(admin.secret),
        merchant: MerchantConfig::new(merchant.name, merchant.secret.into_bytes()),
        gateway: GatewayConfig {
            base_url: gateway.base_url,
            secret_key: gateway.secret_key,
            webhook_secret: gateway.webhook_secret.into_bytes().into_boxed_slice(),
            minor_unit_scale: MinorUnitScale::new(gateway.minor_unit_scale),
            timeout: Duration::from_secs(gateway.timeout_secs),
        },
        notifications: NotificationsConfig {
            sender: notifications.sender,
            timeout: Duration::from_secs(notifications.timeout_secs),
            providers: notifications
                .providers
                .into_iter()
                .map(|provider| match provider {
                    FileNotificationProvider::Http { endpoint, api_key } => {
                        NotificationProviderConfig::Http { endpoint, api_key }
                    }
                    FileNotificationProvider::Log => NotificationProviderConfig::Log,
                })
                .collect(),
        },
        directory: match directory {
            FileDirectoryConfig::Http {
                base_url,
                timeout_secs,
            } => DirectoryConfig::Http {
                base_url,
                timeout: Duration::from_secs(timeout_secs),
            },
            FileDirectoryConfig::Static { users, venues } => DirectoryConfig::Static {
                users: users.into_iter().map(convert_contact).collect(),
                venues: venues.into_iter().map(convert_contact).collect(),
            },
        },
        expiry: ExpiryConfig {
            request_ttl: Duration::from_secs(splits.request_ttl_secs),
            sweep_interval: Duration::from_secs(splits.sweep_interval_secs),
            sweep_batch: splits.sweep_batch,
        },
        admin_secret_rehashed: false,
    }
}

fn convert_contact(entry: ContactEntry) -> (Uuid, Contact) {
    (entry.id, Contact::new(entry.email, entry.name))
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}
