//! User-directory seam used to resolve domain-mapped recipients.

use std::{fmt::Display, future::Future, io, pin::Pin};

/// Result type for directory lookups.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Boxed future type for directory lookups, enabling object safety.
pub type DirectoryFuture<'a> =
    Pin<Box<dyn Future<Output = DirectoryResult<Option<String>>> + Send + 'a>>;

/// Errors that can occur while querying a directory.
#[derive(Debug)]
pub enum DirectoryError {
    /// The directory could not be reached or answered with an error.
    Unavailable(String),
    /// An I/O error occurred while loading directory records.
    Io(io::Error),
}

impl Display for DirectoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DirectoryError::Unavailable(msg) => write!(f, "Directory unavailable: {msg}"),
            DirectoryError::Io(e) => write!(f, "Directory I/O error: {e}"),
        }
    }
}

impl std::error::Error for DirectoryError {}

impl From<io::Error> for DirectoryError {
    fn from(e: io::Error) -> Self {
        DirectoryError::Io(e)
    }
}

/// Trait for directories mapping a free-form identifier to an email address.
///
/// Identifiers are matched case-insensitively and at most one address is
/// returned. `Ok(None)` means no record matched.
pub trait DirectoryLookup: Send + Sync {
    /// Looks up the email address registered for `identifier`.
    fn lookup<'a>(&'a self, identifier: &'a str) -> DirectoryFuture<'a>;

    /// Returns the name of this directory.
    fn name(&self) -> &str;
}
