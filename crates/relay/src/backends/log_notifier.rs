//! Notifier writing notifications to the tracing log.

use tracing::info;

use crate::{Notifier, NotifyFuture};

/// Notifier emitting each notification as an `info` event.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Notifier for LogNotifier {
    fn notify<'a>(&'a self, text: &'a str) -> NotifyFuture<'a> {
        Box::pin(async move {
            info!(notification = %text, "Relay notification");
            Ok(())
        })
    }

    fn name(&self) -> &str {
        "log"
    }
}
