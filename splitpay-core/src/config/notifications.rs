//! Notification provider configuration.

use crate::notifications::{
    FallbackNotificationService, HttpNotificationService, LogNotificationService,
    NotificationService,
};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// One entry of the provider chain, in priority order.
#[derive(Debug, Clone)]
pub enum NotificationProviderConfig {
    Http {
        endpoint: Url,
        api_key: Option<String>,
    },
    Log,
}

#[derive(Debug, Clone)]
pub struct NotificationsConfig {
    /// `From` address for outgoing mail.
    pub sender: String,
    pub providers: Vec<NotificationProviderConfig>,
    pub timeout: Duration,
}

impl NotificationsConfig {
    /// Build the provider chain. An empty list falls back to logging.
    pub fn build_service(&self) -> FallbackNotificationService {
        let mut providers: Vec<Arc<dyn NotificationService>> = self
            .providers
            .iter()
            .map(|provider| -> Arc<dyn NotificationService> {
                match provider {
                    NotificationProviderConfig::Http { endpoint, api_key } => {
                        Arc::new(HttpNotificationService::new(
                            endpoint.clone(),
                            api_key.clone(),
                            self.sender.clone(),
                            self.timeout,
                        ))
                    }
                    NotificationProviderConfig::Log => Arc::new(LogNotificationService),
                }
            })
            .collect();
        if providers.is_empty() {
            providers.push(Arc::new(LogNotificationService));
        }
        FallbackNotificationService::new(providers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_provider_list_logs() {
        let config = NotificationsConfig {
            sender: "bookings@example.com".to_string(),
            providers: vec![],
            timeout: Duration::from_secs(5),
        };
        assert_eq!(config.build_service().len(), 1);
    }

    #[test]
    fn test_provider_order_is_kept() {
        let config = NotificationsConfig {
            sender: "bookings@example.com".to_string(),
            providers: vec![
                NotificationProviderConfig::Http {
                    endpoint: Url::parse("https://mail.example.com/send").unwrap(),
                    api_key: None,
                },
                NotificationProviderConfig::Log,
            ],
            timeout: Duration::from_secs(5),
        };
        assert_eq!(config.build_service().len(), 2);
    }
}
