//! Contact Directory.
//!
//! Split requests and bookings only hold user and venue ids. Notification
//! addresses live with the profile service and are resolved through
//! [`ContactDirectory`] at send time.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid directory URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("directory lookup failed with status {status}: {body}")]
    LookupFailed { status: u16, body: String },
}

/// Where and to whom a notification is sent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Contact {
    #[serde(alias = "email")]
    pub address: String,
    #[serde(alias = "name")]
    pub display_name: String,
}

impl Contact {
    pub fn new(address: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            display_name: display_name.into(),
        }
    }
}

#[async_trait]
pub trait ContactDirectory: Send + Sync {
    /// `None` if the user has no profile.
    async fn user(&self, user_id: Uuid) -> Result<Option<Contact>, DirectoryError>;

    /// The venue operator's contact.
    async fn venue(&self, venue_id: Uuid) -> Result<Option<Contact>, DirectoryError>;
}

/// Fixed contacts, for development and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticContactDirectory {
    users: HashMap<Uuid, Contact>,
    venues: HashMap<Uuid, Contact>,
}

impl StaticContactDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user_id: Uuid, contact: Contact) -> Self {
        self.users.insert(user_id, contact);
        self
    }

    pub fn with_venue(mut self, venue_id: Uuid, contact: Contact) -> Self {
        self.venues.insert(venue_id, contact);
        self
    }
}

#[async_trait]
impl ContactDirectory for StaticContactDirectory {
    async fn user(&self, user_id: Uuid) -> Result<Option<Contact>, DirectoryError> {
        Ok(self.users.get(&user_id).cloned())
    }

    async fn venue(&self, venue_id: Uuid) -> Result<Option<Contact>, DirectoryError> {
        Ok(self.venues.get(&venue_id).cloned())
    }
}

/// Looks contacts up in the profile service.
///
/// `GET {base}/users/{id}/contact` and `GET {base}/venues/{id}/contact`,
/// answering `{"email": ..., "name": ...}` or 404.
#[derive(Debug, Clone)]
pub struct HttpContactDirectory {
    http: Client,
    base_url: Url,
}

impl HttpContactDirectory {
    pub fn new(base_url: Url, timeout: Duration) -> Self {
        Self {
            http: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url,
        }
    }

    async fn fetch(&self, path: String) -> Result<Option<Contact>, DirectoryError> {
        let resp = self.http.get(self.base_url.join(&path)?).send().await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DirectoryError::LookupFailed {
                status: status.as_u16(),
                body,
            });
        }
        Ok(Some(resp.json().await?))
    }
}

#[async_trait]
impl ContactDirectory for HttpContactDirectory {
    #[tracing::instrument(skip(self), err)]
    async fn user(&self, user_id: Uuid) -> Result<Option<Contact>, DirectoryError> {
        self.fetch(format!("users/{user_id}/contact")).await
    }

    #[tracing::instrument(skip(self), err)]
    async fn venue(&self, venue_id: Uuid) -> Result<Option<Contact>, DirectoryError> {
        self.fetch(format!("venues/{venue_id}/contact")).await
    }
}
