//! Background processors.
//!
//! - `NotificationDispatcher`: Receives `DomainEvent`, sends notifications
//! - `ExpirySweeper`: Expires overdue split requests on a timer

pub mod expiry_sweeper;
pub mod notification_dispatcher;

pub use expiry_sweeper::ExpirySweeper;
pub use notification_dispatcher::{DispatchError, DispatchReport, NotificationDispatcher};
