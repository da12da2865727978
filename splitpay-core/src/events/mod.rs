//! Domain events emitted by the reconciliation engine.
//!
//! # Event Flow
//!
//! 1. Client callback / gateway webhook -> `ReconciliationEngine`
//! 2. `ReconciliationEngine` emits `DomainEvent` -> `NotificationDispatcher`
//!
//! Events are ephemeral and carry identifiers rather than full data; the
//! dispatcher re-reads current state from the store. Delivery is deduplicated
//! on the consumer side, so emitting the same event twice is harmless.

pub mod channels;
pub mod types;

pub use channels::{
    DEFAULT_CHANNEL_BUFFER, DomainEventReceiver, DomainEventSender, domain_event_channel,
};

pub use types::DomainEvent;
