//! Terminal step of the relay: notification, transmission and archival.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::{
    EnvelopeContext, Flow, MessageHandle, Notifier, ObjectStore, RelayConfig, RelayError,
    RelayResult, Transport,
};

/// Final outcome of a relay invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The message was transmitted and archived.
    Forwarded { handle: MessageHandle },

    /// The message was deliberately not forwarded.
    Aborted { reason: String },
}

/// Consumes the final [`Flow`] of the stages and carries out its effects.
///
/// An aborted flow is only logged and notified. A continuing flow is
/// notified, transmitted and archived under the outbound prefix, in that
/// order, stopping at the first failure.
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    store: Arc<dyn ObjectStore>,
    notifier: Option<Arc<dyn Notifier>>,
    bucket: String,
    key_prefix: String,
    outbound_prefix: String,
}

impl Dispatcher {
    pub fn new(
        config: &RelayConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn ObjectStore>,
        notifier: Option<Arc<dyn Notifier>>,
    ) -> Self {
        info!(
            transport = transport.name(),
            store = store.name(),
            notifier = ?notifier.as_ref().map(|n| n.name()),
            "Dispatcher initialized"
        );
        Self {
            transport,
            store,
            notifier,
            bucket: config.email_bucket.clone(),
            key_prefix: config.email_key_prefix.clone(),
            outbound_prefix: config.outbound_key_prefix.clone(),
        }
    }

    /// Returns the key under which the relayed copy is archived.
    pub fn outbound_key_for(&self, message_id: &str) -> String {
        format!("{}{}.txt", self.outbound_prefix, message_id)
    }

    pub async fn dispatch(&self, flow: Flow) -> RelayResult<RelayOutcome> {
        match flow {
            Flow::Abort(envelope) => Ok(self.dispatch_aborted(envelope).await),
            Flow::Continue(envelope) => self.dispatch_forward(envelope).await,
        }
    }

    async fn dispatch_aborted(&self, envelope: EnvelopeContext) -> RelayOutcome {
        let reason = envelope.abort_reason().unwrap_or_default().to_string();
        info!(
            message_id = %envelope.message_id(),
            reason = %reason,
            "Not forwarding message"
        );
        self.notify(&format!(
            "Not forwarding message {}: {}",
            envelope.message_id(),
            reason
        ))
        .await;
        RelayOutcome::Aborted { reason }
    }

    async fn dispatch_forward(&self, envelope: EnvelopeContext) -> RelayResult<RelayOutcome> {
        let message_id = envelope.message_id();

        self.notify(&self.forward_notification(&envelope)).await;

        let sender = envelope
            .primary_original_recipient
            .as_deref()
            .unwrap_or_default();
        let raw = envelope.raw_message();
        info!(
            message_id = %message_id,
            sender = %sender,
            recipients = %envelope.resolved_recipients.join(", "),
            size = raw.len(),
            transport = self.transport.name(),
            "Sending message"
        );
        let handle = self.transport.send_raw(sender, &raw).await.map_err(|e| {
            error!(message_id = %message_id, error = %e, "Error sending message");
            RelayError::Transport(e)
        })?;
        info!(message_id = %message_id, handle = %handle, "Message sent");

        let key = self.outbound_key_for(message_id);
        self.store
            .write(&self.bucket, &key, &raw)
            .await
            .map_err(|e| {
                error!(
                    message_id = %message_id,
                    bucket = %self.bucket,
                    key = %key,
                    error = %e,
                    "Error archiving relayed message"
                );
                RelayError::Storage(e)
            })?;
        info!(message_id = %message_id, "Archived relayed message at {}/{}", self.bucket, key);

        Ok(RelayOutcome::Forwarded { handle })
    }

    fn forward_notification(&self, envelope: &EnvelopeContext) -> String {
        let obfuscated: Vec<String> = envelope
            .resolved_recipients
            .iter()
            .map(|address| obfuscate_address(address))
            .collect();
        let notes = if envelope.notes.is_empty() {
            "none".to_string()
        } else {
            envelope.notes.join("; ")
        };
        format!(
            "Forwarding email from: {}\nOriginal recipients: {}\nNew recipients: {}\nNotes: {}\nSource: {}/{}{}",
            envelope.from_address.as_deref().unwrap_or("<not extracted>"),
            envelope.original_recipients().join(", "),
            obfuscated.join(", "),
            notes,
            self.bucket,
            self.key_prefix,
            envelope.message_id()
        )
    }

    /// Delivers a notification, if a notifier is configured.
    ///
    /// Failures are logged and otherwise ignored.
    async fn notify(&self, text: &str) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        if let Err(e) = notifier.notify(text).await {
            warn!(notifier = notifier.name(), error = %e, "Failed to deliver notification");
        }
    }
}

/// Masks the local part of an address except for its first and last
/// character (`alice@home.com` becomes `a***e@home.com`).
///
/// Local parts of one or two characters are left as they are.
pub fn obfuscate_address(address: &str) -> String {
    let (local_part, domain) = match address.rfind('@') {
        Some(pos) => (&address[..pos], &address[pos..]),
        None => (address, ""),
    };
    let chars: Vec<char> = local_part.chars().collect();
    if chars.len() <= 2 {
        return address.to_string();
    }
    let mut masked = String::with_capacity(address.len());
    masked.push(chars[0]);
    masked.extend(std::iter::repeat('*').take(chars.len() - 2));
    masked.push(chars[chars.len() - 1]);
    masked.push_str(domain);
    masked
}
