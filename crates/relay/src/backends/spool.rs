//! Spool-directory transport.
//!
//! Every accepted message is written as `{uuid}.eml` next to a `{uuid}.json`
//! sidecar holding the envelope sender, so a separate mailer can pick the
//! spool up. The uuid doubles as the [`MessageHandle`].

use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;
use tokio::fs;
use tracing::{error, info};
use uuid::Uuid;

use crate::{MessageHandle, Transport, TransportError, TransportFuture};

/// JSON sidecar stored next to each spooled message.
#[derive(Debug, Serialize)]
struct SpoolEntry<'a> {
    handle: &'a str,
    envelope_sender: &'a str,
    queued_at: String,
    size: usize,
}

/// Transport spooling raw messages into a directory.
#[derive(Debug, Clone)]
pub struct SpoolTransport {
    path: PathBuf,
}

impl SpoolTransport {
    /// Creates a new [`SpoolTransport`] writing into `path`.
    pub fn new(path: PathBuf) -> Self {
        info!(path = %path.display(), "Spool transport initialized");
        Self { path }
    }

    /// Returns the path of the spooled message for a handle.
    pub fn message_path(&self, handle: &MessageHandle) -> PathBuf {
        self.path.join(format!("{handle}.eml"))
    }
}

impl Transport for SpoolTransport {
    fn send_raw<'a>(&'a self, envelope_sender: &'a str, raw: &'a [u8]) -> TransportFuture<'a> {
        Box::pin(async move {
            fs::create_dir_all(&self.path).await?;

            let handle = MessageHandle(Uuid::new_v4().to_string());
            let entry = SpoolEntry {
                handle: &handle.0,
                envelope_sender,
                queued_at: Utc::now().to_rfc3339(),
                size: raw.len(),
            };
            let json = serde_json::to_vec_pretty(&entry).map_err(|e| {
                error!(handle = %handle, error = %e, "Failed to serialize spool entry");
                TransportError::Serialization(e.to_string())
            })?;

            fs::write(self.message_path(&handle), raw).await?;
            fs::write(self.path.join(format!("{handle}.json")), json).await?;

            info!(
                handle = %handle,
                envelope_sender = %envelope_sender,
                size = raw.len(),
                "Spooled outbound message"
            );
            Ok(handle)
        })
    }

    fn name(&self) -> &str {
        "spool"
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_spool_writes_message_and_sidecar() {
        let temp_dir = TempDir::new().unwrap();
        let transport = SpoolTransport::new(temp_dir.path().join("spool"));

        let handle = transport
            .send_raw("info@example.com", b"Subject: Hi\r\n\r\nBody")
            .await
            .unwrap();

        let raw = std::fs::read(transport.message_path(&handle)).unwrap();
        assert_eq!(raw, b"Subject: Hi\r\n\r\nBody");

        let sidecar = std::fs::read_to_string(
            temp_dir.path().join("spool").join(format!("{handle}.json")),
        )
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&sidecar).unwrap();
        assert_eq!(value["envelope_sender"], "info@example.com");
        assert_eq!(value["size"], 19);
    }

    #[tokio::test]
    async fn test_spool_handles_are_unique() {
        let temp_dir = TempDir::new().unwrap();
        let transport = SpoolTransport::new(temp_dir.path().to_path_buf());

        let first = transport.send_raw("a@b.com", b"x").await.unwrap();
        let second = transport.send_raw("a@b.com", b"x").await.unwrap();

        assert_ne!(first, second);
    }
}
