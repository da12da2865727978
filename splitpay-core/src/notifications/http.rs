use super::{NotificationError, NotificationService};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use url::Url;

#[derive(Debug, Serialize)]
struct RelayMessage<'a> {
    template_id: &'a str,
    from: &'a str,
    to: &'a str,
    payload: &'a serde_json::Value,
}

/// Posts notifications as JSON to a mail relay.
#[derive(Debug, Clone)]
pub struct HttpNotificationService {
    http: Client,
    endpoint: Url,
    api_key: Option<String>,
    sender: String,
}

impl HttpNotificationService {
    pub fn new(
        endpoint: Url,
        api_key: Option<String>,
        sender: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            endpoint,
            api_key,
            sender: sender.into(),
        }
    }
}

#[async_trait]
impl NotificationService for HttpNotificationService {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn send(
        &self,
        template_id: &str,
        address: &str,
        payload: &serde_json::Value,
    ) -> Result<(), NotificationError> {
        let message = RelayMessage {
            template_id,
            from: &self.sender,
            to: address,
            payload,
        };
        let mut request = self.http.post(self.endpoint.clone()).json(&message);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(NotificationError::DeliveryFailed {
                status: status.as_u16(),
                body,
            })
        }
    }
}
