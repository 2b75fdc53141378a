//! In-memory user directory.

use std::{collections::HashMap, fs, path::Path, sync::Arc};

use tracing::{debug, info};

use crate::{DirectoryFuture, DirectoryLookup, DirectoryResult};

/// Directory backed by a `HashMap` of lower-cased identifiers to addresses.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    records: Arc<HashMap<String, String>>,
}

impl MemoryDirectory {
    /// Creates a new empty [`MemoryDirectory`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a [`MemoryDirectory`] from `(identifier, address)` pairs.
    pub fn from_records<I, K, V>(records: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let records = records
            .into_iter()
            .map(|(id, email)| (id.as_ref().trim().to_lowercase(), email.into()))
            .collect();
        Self {
            records: Arc::new(records),
        }
    }

    /// Loads records from a file.
    ///
    /// The file should be formatted as:
    /// ```text
    /// identifier:address
    /// identifier2:address2
    /// ```
    /// Blank lines and lines starting with `#` are ignored.
    pub fn from_file(path: &Path) -> DirectoryResult<Self> {
        let content = fs::read_to_string(path)?;
        let records = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once(':'))
            .map(|(id, email)| (id.to_string(), email.trim().to_string()));
        let directory = Self::from_records(records);
        info!(
            path = %path.display(),
            records = directory.len(),
            "Directory records loaded"
        );
        Ok(directory)
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the directory has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl DirectoryLookup for MemoryDirectory {
    fn lookup<'a>(&'a self, identifier: &'a str) -> DirectoryFuture<'a> {
        Box::pin(async move {
            let found = self.records.get(&identifier.trim().to_lowercase()).cloned();
            debug!(identifier = %identifier, found = ?found, "Directory lookup");
            Ok(found)
        })
    }

    fn name(&self) -> &str {
        "memory_directory"
    }
}
