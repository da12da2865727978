//! Event channel factories and handles.

use super::types::DomainEvent;
use tokio::sync::mpsc;

/// Default buffer size for event channels.
///
/// This provides enough buffer to handle bursts while keeping memory bounded.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender handle for DomainEvent events.
pub type DomainEventSender = mpsc::Sender<DomainEvent>;
/// Receiver handle for DomainEvent events.
pub type DomainEventReceiver = mpsc::Receiver<DomainEvent>;

/// Create a new DomainEvent channel.
///
/// Returns a (sender, receiver) pair. The sender is cloned into every
/// engine handle; the receiver belongs to the notification dispatcher.
pub fn domain_event_channel() -> (DomainEventSender, DomainEventReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}
