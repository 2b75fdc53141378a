//! Concrete collaborator implementations.
//!
//! Contains the filesystem and in-memory [`ObjectStore`](crate::ObjectStore)
//! engines, the in-memory [`DirectoryLookup`](crate::DirectoryLookup), the
//! spool-directory [`Transport`](crate::Transport), and the log and webhook
//! (feature-gated behind `webhook`) [`Notifier`](crate::Notifier) sinks.

pub mod file_store;
pub mod log_notifier;
pub mod memory_directory;
pub mod memory_store;
pub mod spool;
#[cfg(feature = "webhook")]
pub mod webhook;

pub use file_store::*;
pub use log_notifier::*;
pub use memory_directory::*;
pub use memory_store::*;
pub use spool::*;
#[cfg(feature = "webhook")]
pub use webhook::*;
