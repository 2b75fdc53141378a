//! Notification seam for the alerting sink.
//!
//! Notifications are best-effort: the dispatcher awaits them to keep log
//! ordering but never fails the invocation because of them.

use std::{fmt::Display, future::Future, pin::Pin};

/// Result type for notification delivery.
pub type NotifyResult<T> = Result<T, NotifyError>;

/// Boxed future type for notification delivery, enabling object safety.
pub type NotifyFuture<'a> = Pin<Box<dyn Future<Output = NotifyResult<()>> + Send + 'a>>;

/// Errors that can occur while delivering a notification.
#[derive(Debug)]
pub enum NotifyError {
    /// The sink could not be reached.
    Connection(String),
    /// The sink refused the notification.
    Rejected(String),
}

impl Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyError::Connection(msg) => write!(f, "Connection error: {msg}"),
            NotifyError::Rejected(msg) => write!(f, "Notification rejected: {msg}"),
        }
    }
}

impl std::error::Error for NotifyError {}

/// Trait for sinks receiving human-readable relay notifications.
pub trait Notifier: Send + Sync {
    /// Delivers a notification text.
    fn notify<'a>(&'a self, text: &'a str) -> NotifyFuture<'a>;

    /// Returns the name of this notifier.
    fn name(&self) -> &str;
}
