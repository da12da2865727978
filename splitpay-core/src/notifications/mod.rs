//! Notification Service port.
//!
//! Notifications are triggered by template id and JSON payload; rendering is
//! the provider's job. Providers are combined with
//! [`FallbackNotificationService`], which tries them in order.

mod fallback;
mod http;

pub use fallback::FallbackNotificationService;
pub use http::HttpNotificationService;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum NotificationError {
    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Provider answered with a non-success status
    #[error("notification delivery failed with status {status}: {body}")]
    DeliveryFailed { status: u16, body: String },

    /// Every configured provider failed
    #[error("all notification providers failed: {0}")]
    AllProvidersFailed(String),
}

#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &'static str;

    async fn send(
        &self,
        template_id: &str,
        address: &str,
        payload: &serde_json::Value,
    ) -> Result<(), NotificationError>;
}

#[async_trait]
impl<N: NotificationService + ?Sized> NotificationService for std::sync::Arc<N> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn send(
        &self,
        template_id: &str,
        address: &str,
        payload: &serde_json::Value,
    ) -> Result<(), NotificationError> {
        (**self).send(template_id, address, payload).await
    }
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotificationService;

#[async_trait]
impl NotificationService for LogNotificationService {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(
        &self,
        template_id: &str,
        address: &str,
        payload: &serde_json::Value,
    ) -> Result<(), NotificationError> {
        info!(
            template_id = template_id,
            address = address,
            payload = %payload,
            "Notification"
        );
        Ok(())
    }
}
