//! Seams between the example programs and the tracing/notification service.

use crate::error::{ChannelError, Result};
use crate::model::{Condition, Notification, Trigger};
use std::fmt;

/// Result of one blocking pull on a notification channel.
#[derive(Debug)]
pub enum ChannelStatus {
    Ok(Notification),
    NotificationsDropped,
    Interrupted,
    Closed,
    Error(ChannelError),
}

pub trait NotificationChannel {
    fn subscribe(&mut self, condition: &Condition) -> std::result::Result<(), ChannelError>;

    /// Blocks until a notification, a status change, or an interruption.
    fn next_notification(&mut self) -> ChannelStatus;
}

pub trait NotificationService {
    type Channel: NotificationChannel;

    fn create_channel(&mut self) -> Result<Self::Channel>;

    fn list_triggers(&mut self) -> Result<Vec<Trigger>>;
}

/// A provider/event pair under which instrumentation events are raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tracepoint {
    pub provider: &'static str,
    pub name: &'static str,
}

impl fmt::Display for Tracepoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.name)
    }
}

/// Destination of instrumentation events. Raising is fire-and-forget.
pub trait EventSink {
    fn raise(&mut self, tracepoint: &Tracepoint, iteration: u64);
}
