use std::sync::Arc;

use tracing::{error, info};

use crate::{
    split_message, EnvelopeContext, Flow, ObjectStore, RelayConfig, RelayError, Stage, StageFuture,
};

/// Stage loading the raw inbound message from object storage and splitting
/// it into header block and body.
pub struct MessageFetcher {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    key_prefix: String,
}

impl MessageFetcher {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: &str, key_prefix: &str) -> Self {
        Self {
            store,
            bucket: bucket.to_string(),
            key_prefix: key_prefix.to_string(),
        }
    }

    pub fn from_config(config: &RelayConfig, store: Arc<dyn ObjectStore>) -> Self {
        Self::new(store, &config.email_bucket, &config.email_key_prefix)
    }

    /// Returns the inbound object key for a message identity.
    pub fn key_for(&self, message_id: &str) -> String {
        format!("{}{}", self.key_prefix, message_id)
    }
}

impl Stage for MessageFetcher {
    fn run<'a>(&'a self, mut envelope: EnvelopeContext) -> StageFuture<'a> {
        Box::pin(async move {
            let key = self.key_for(envelope.message_id());
            info!(
                message_id = %envelope.message_id(),
                store = self.store.name(),
                "Fetching email at {}/{}", self.bucket, key
            );

            let raw = self.store.fetch(&self.bucket, &key).await.map_err(|e| {
                error!(
                    message_id = %envelope.message_id(),
                    bucket = %self.bucket,
                    key = %key,
                    error = %e,
                    "Error fetching email"
                );
                RelayError::Storage(e)
            })?;

            let (header, body) = split_message(&raw);
            info!(
                message_id = %envelope.message_id(),
                header_bytes = header.len(),
                body_bytes = body.len(),
                "Fetched email"
            );
            envelope.raw_header = header;
            envelope.raw_body = body;

            Ok(Flow::from_envelope(envelope))
        })
    }

    fn name(&self) -> &str {
        "message_fetcher"
    }
}
