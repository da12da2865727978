use super::{NotificationError, NotificationService};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// Tries each provider in order until one accepts the notification.
#[derive(Clone, Default)]
pub struct FallbackNotificationService {
    providers: Vec<Arc<dyn NotificationService>>,
}

impl FallbackNotificationService {
    pub fn new(providers: Vec<Arc<dyn NotificationService>>) -> Self {
        Self { providers }
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[async_trait]
impl NotificationService for FallbackNotificationService {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn send(
        &self,
        template_id: &str,
        address: &str,
        payload: &serde_json::Value,
    ) -> Result<(), NotificationError> {
        let mut failures = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            match provider.send(template_id, address, payload).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(
                        provider = provider.name(),
                        template_id = template_id,
                        error = %e,
                        "Notification provider failed, trying next"
                    );
                    failures.push(format!("{}: {}", provider.name(), e));
                }
            }
        }
        if failures.is_empty() {
            failures.push("no providers configured".to_string());
        }
        Err(NotificationError::AllProvidersFailed(failures.join("; ")))
    }
}
