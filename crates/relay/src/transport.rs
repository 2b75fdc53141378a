//! Outbound transmission seam.
//!
//! A transport receives the envelope sender and the fully rewritten message.
//! Destinations are not passed separately, they are carried by the rewritten
//! `To` and `Bcc` header fields.

use std::{fmt::Display, future::Future, io, pin::Pin};

/// Result type for transmission operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Boxed future type for transmission operations, enabling object safety.
pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = TransportResult<MessageHandle>> + Send + 'a>>;

/// Identifier assigned by a transport to an accepted message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageHandle(pub String);

impl Display for MessageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors that can occur during transmission.
#[derive(Debug)]
pub enum TransportError {
    /// The transmission service refused the message.
    Rejected(String),
    /// An I/O error occurred.
    Io(io::Error),
    /// A serialization error occurred.
    Serialization(String),
}

impl Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Rejected(msg) => write!(f, "Message rejected: {msg}"),
            TransportError::Io(e) => write!(f, "I/O error: {e}"),
            TransportError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        TransportError::Io(e)
    }
}

/// Trait for services transmitting raw messages.
pub trait Transport: Send + Sync {
    /// Sends `raw` with `envelope_sender` as the envelope sender.
    fn send_raw<'a>(&'a self, envelope_sender: &'a str, raw: &'a [u8]) -> TransportFuture<'a>;

    /// Returns the name of this transport.
    fn name(&self) -> &str;
}
