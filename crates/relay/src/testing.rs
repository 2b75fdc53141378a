//! In-crate fakes for the collaborator seams, shared by unit tests.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use crate::{
    DirectoryError, DirectoryFuture, DirectoryLookup, MessageHandle, Notifier, NotifyError,
    NotifyFuture, ObjectStore, StorageError, StorageFuture, Transport, TransportError,
    TransportFuture,
};

/// Directory recording every identifier it is asked about.
pub struct CountingDirectory {
    records: HashMap<String, String>,
    fail: bool,
    calls: Mutex<Vec<String>>,
}

impl CountingDirectory {
    pub fn new(records: &[(&str, &str)]) -> Self {
        Self {
            records: records
                .iter()
                .map(|(id, email)| (id.to_lowercase(), email.to_string()))
                .collect(),
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Creates a directory failing every lookup.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(&[])
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl DirectoryLookup for CountingDirectory {
    fn lookup<'a>(&'a self, identifier: &'a str) -> DirectoryFuture<'a> {
        Box::pin(async move {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(identifier.to_string());
            if self.fail {
                return Err(DirectoryError::Unavailable("directory down".to_string()));
            }
            Ok(self.records.get(&identifier.to_lowercase()).cloned())
        })
    }

    fn name(&self) -> &str {
        "counting_directory"
    }
}

/// Transport recording every message it is handed.
pub struct RecordingTransport {
    fail: bool,
    sent: Mutex<Vec<(String, Vec<u8>)>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            fail: false,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Creates a transport rejecting every message.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// Returns the `(envelope_sender, raw)` pairs accepted so far.
    pub fn sent(&self) -> Vec<(String, Vec<u8>)> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Transport for RecordingTransport {
    fn send_raw<'a>(&'a self, envelope_sender: &'a str, raw: &'a [u8]) -> TransportFuture<'a> {
        Box::pin(async move {
            if self.fail {
                return Err(TransportError::Rejected("sending paused".to_string()));
            }
            let mut sent = self.sent.lock().unwrap_or_else(PoisonError::into_inner);
            sent.push((envelope_sender.to_string(), raw.to_vec()));
            Ok(MessageHandle(format!("sent-{}", sent.len())))
        })
    }

    fn name(&self) -> &str {
        "recording_transport"
    }
}

/// Notifier recording every notification text.
pub struct RecordingNotifier {
    fail: bool,
    texts: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            fail: false,
            texts: Mutex::new(Vec::new()),
        }
    }

    /// Creates a notifier failing every delivery, without recording it.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify<'a>(&'a self, text: &'a str) -> NotifyFuture<'a> {
        Box::pin(async move {
            if self.fail {
                return Err(NotifyError::Connection("webhook unreachable".to_string()));
            }
            self.texts
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(text.to_string());
            Ok(())
        })
    }

    fn name(&self) -> &str {
        "recording_notifier"
    }
}

/// Object store failing every operation with a backend error.
pub struct FailingStore;

impl ObjectStore for FailingStore {
    fn fetch<'a>(&'a self, _bucket: &'a str, _key: &'a str) -> StorageFuture<'a, Vec<u8>> {
        Box::pin(async move { Err(StorageError::Backend("store offline".to_string())) })
    }

    fn write<'a>(
        &'a self,
        _bucket: &'a str,
        _key: &'a str,
        _data: &'a [u8],
    ) -> StorageFuture<'a, ()> {
        Box::pin(async move { Err(StorageError::Backend("store offline".to_string())) })
    }

    fn name(&self) -> &str {
        "failing_store"
    }
}
