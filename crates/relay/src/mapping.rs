use std::collections::HashMap;

use tracing::warn;

/// The kind of pattern a mapping key expresses.
///
/// Resolution tries the kinds in declaration order: full address, then
/// domain, then local part, then the catch-all wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternKind {
    /// Full address (e.g. "info@example.com").
    Address,
    /// Every address at a domain (e.g. "@example.com").
    Domain,
    /// A mailbox name at any domain (e.g. "info").
    LocalPart,
    /// Every address matching no other pattern ("@").
    Wildcard,
}

impl PatternKind {
    /// Classifies a mapping key.
    pub fn of(key: &str) -> Self {
        if key == "@" {
            PatternKind::Wildcard
        } else if key.starts_with('@') {
            PatternKind::Domain
        } else if key.contains('@') {
            PatternKind::Address
        } else {
            PatternKind::LocalPart
        }
    }
}

/// Lookup table from recipient patterns to destination addresses.
///
/// Keys are stored lower-cased. Keys that only differ by case are merged,
/// concatenating their destinations in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressMapping {
    entries: HashMap<String, Vec<String>>,
}

impl AddressMapping {
    /// Creates a new [`AddressMapping`] from configured entries.
    pub fn new(entries: HashMap<String, Vec<String>>) -> Self {
        let mut sorted: Vec<_> = entries.into_iter().collect();
        sorted.sort_by(|(a, _), (b, _)| a.cmp(b));

        let mut normalized: HashMap<String, Vec<String>> = HashMap::new();
        for (key, destinations) in sorted {
            let lowered = key.trim().to_lowercase();
            if lowered != key {
                warn!(key = %key, normalized = %lowered, "Normalized mapping key");
            }
            normalized.entry(lowered).or_default().extend(destinations);
        }

        Self {
            entries: normalized,
        }
    }

    /// Returns the destinations configured for an exact key.
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Returns whether an exact key is configured.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the number of keys of the given kind.
    pub fn count(&self, kind: PatternKind) -> usize {
        self.entries
            .keys()
            .filter(|key| PatternKind::of(key) == kind)
            .count()
    }

    /// Returns the number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no key is configured.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for AddressMapping
where
    K: Into<String>,
    V: IntoIterator,
    V::Item: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(key, destinations)| {
                    (
                        key.into(),
                        destinations.into_iter().map(Into::into).collect(),
                    )
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_kind() {
        assert_eq!(PatternKind::of("info@example.com"), PatternKind::Address);
        assert_eq!(PatternKind::of("@example.com"), PatternKind::Domain);
        assert_eq!(PatternKind::of("info"), PatternKind::LocalPart);
        assert_eq!(PatternKind::of("@"), PatternKind::Wildcard);
    }

    #[test]
    fn test_keys_are_lowercased() {
        let mapping: AddressMapping = [("Info@Example.com", vec!["a@x.com"])]
            .into_iter()
            .collect();

        assert!(mapping.contains("info@example.com"));
        assert!(!mapping.contains("Info@Example.com"));
        assert_eq!(
            mapping.get("info@example.com").unwrap(),
            &["a@x.com".to_string()]
        );
    }

    #[test]
    fn test_case_variants_are_merged() {
        let mapping: AddressMapping = [("INFO", vec!["a@x.com"]), ("info", vec!["b@x.com"])]
            .into_iter()
            .collect();

        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.get("info").unwrap().len(), 2);
    }

    #[test]
    fn test_count_by_kind() {
        let mapping: AddressMapping = [
            ("a@example.com", vec!["x@y.com"]),
            ("b@example.com", vec!["x@y.com"]),
            ("@example.com", vec![]),
            ("@", vec!["x@y.com"]),
        ]
        .into_iter()
        .collect();

        assert_eq!(mapping.count(PatternKind::Address), 2);
        assert_eq!(mapping.count(PatternKind::Domain), 1);
        assert_eq!(mapping.count(PatternKind::LocalPart), 0);
        assert_eq!(mapping.count(PatternKind::Wildcard), 1);
    }
}
