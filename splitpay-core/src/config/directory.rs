//! Contact directory configuration.

use crate::directory::{Contact, ContactDirectory, HttpContactDirectory, StaticContactDirectory};
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum DirectoryConfig {
    /// Profile service lookups.
    Http { base_url: Url, timeout: Duration },
    /// Fixed contact lists.
    Static {
        users: Vec<(Uuid, Contact)>,
        venues: Vec<(Uuid, Contact)>,
    },
}

impl DirectoryConfig {
    pub fn build(&self) -> Arc<dyn ContactDirectory> {
        match self {
            DirectoryConfig::Http { base_url, timeout } => {
                Arc::new(HttpContactDirectory::new(base_url.clone(), *timeout))
            }
            DirectoryConfig::Static { users, venues } => {
                let directory = users
                    .iter()
                    .fold(StaticContactDirectory::new(), |d, (id, c)| {
                        d.with_user(*id, c.clone())
                    });
                let directory = venues
                    .iter()
                    .fold(directory, |d, (id, c)| d.with_venue(*id, c.clone()));
                Arc::new(directory)
            }
        }
    }
}
