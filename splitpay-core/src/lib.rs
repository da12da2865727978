#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod booking;
pub mod config;
pub mod directory;
pub mod entities;
pub mod events;
pub mod framework;
pub mod gateway;
pub mod ledger;
pub mod notifications;
pub mod processors;
pub mod reconciliation;
pub mod store;
