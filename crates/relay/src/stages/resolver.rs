//! Recipient resolution.
//!
//! Maps every original recipient to destination addresses using the
//! configured [`AddressMapping`], trying a full-address match, then the
//! domain (answered by the user directory when one is configured), then the
//! local part and finally the `@` catch-all.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    AddressMapping, DirectoryLookup, EnvelopeContext, Flow, PatternKind, RelayConfig, Stage,
    StageFuture,
};

/// Local-part prefixes added by some subscription services, stripped
/// before lookup (compared case-insensitively).
const SUBSCRIBER_PREFIXES: [&str; 2] = ["subscriber+", "subscriber%2b"];

/// Result of resolving a single original recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Kind of mapping key that matched.
    pub kind: PatternKind,

    /// Destinations contributed by this recipient, possibly empty when the
    /// directory had no record.
    pub destinations: Vec<String>,

    /// Address found in the directory, used to rewrite the `To` field.
    pub directory_address: Option<String>,
}

impl Resolution {
    fn mapped(kind: PatternKind, destinations: &[String]) -> Self {
        Self {
            kind,
            destinations: destinations.to_vec(),
            directory_address: None,
        }
    }
}

/// Stage resolving original recipients into destination addresses.
pub struct AddressResolver {
    mapping: AddressMapping,
    allow_plus_sign: bool,
    directory: Option<Arc<dyn DirectoryLookup>>,
}

impl AddressResolver {
    /// Creates a new [`AddressResolver`].
    ///
    /// Without a directory, domain keys resolve to their configured
    /// destinations.
    pub fn new(
        mapping: AddressMapping,
        allow_plus_sign: bool,
        directory: Option<Arc<dyn DirectoryLookup>>,
    ) -> Self {
        info!(
            keys = mapping.len(),
            domains = mapping.count(PatternKind::Domain),
            wildcard = mapping.count(PatternKind::Wildcard) > 0,
            directory = ?directory.as_ref().map(|d| d.name()),
            "Address resolver initialized"
        );
        Self {
            mapping,
            allow_plus_sign,
            directory,
        }
    }

    /// Creates a new [`AddressResolver`] from the relay configuration.
    pub fn from_config(config: &RelayConfig, directory: Option<Arc<dyn DirectoryLookup>>) -> Self {
        Self::new(
            AddressMapping::new(config.forward_mapping.clone()),
            config.allow_plus_sign,
            directory,
        )
    }

    /// Resolves one original recipient, returning `None` when no mapping
    /// key applies.
    pub async fn resolve_address(&self, address: &str) -> Option<Resolution> {
        let normalized = self.normalize(address);
        let key = normalized.to_lowercase();

        if let Some(destinations) = self.mapping.get(&key) {
            return Some(Resolution::mapped(PatternKind::of(&key), destinations));
        }

        let (local_part, domain) = match key.rfind('@') {
            Some(pos) => (&key[..pos], Some(&key[pos..])),
            None => (key.as_str(), None),
        };

        if let Some(domain) = domain.filter(|d| d.len() > 1 && self.mapping.contains(d)) {
            let original_local_part = normalized
                .rfind('@')
                .map_or(normalized.as_str(), |pos| &normalized[..pos]);
            return Some(self.resolve_domain(domain, original_local_part).await);
        }

        if !local_part.is_empty() {
            if let Some(destinations) = self.mapping.get(local_part) {
                return Some(Resolution::mapped(PatternKind::LocalPart, destinations));
            }
        }

        self.mapping
            .get("@")
            .map(|destinations| Resolution::mapped(PatternKind::Wildcard, destinations))
    }

    /// Strips subscription prefixes and, when enabled, plus-address tags,
    /// keeping the original case.
    fn normalize(&self, address: &str) -> String {
        let stripped = strip_subscriber_prefix(address.trim());
        if self.allow_plus_sign {
            fold_plus_tag(stripped)
        } else {
            stripped.to_string()
        }
    }

    async fn resolve_domain(&self, domain: &str, local_part: &str) -> Resolution {
        let Some(directory) = &self.directory else {
            let destinations = self.mapping.get(domain).unwrap_or_default();
            return Resolution::mapped(PatternKind::Domain, destinations);
        };

        let found = match directory.lookup(local_part).await {
            Ok(found) => found,
            Err(e) => {
                warn!(
                    identifier = %local_part,
                    directory = directory.name(),
                    error = %e,
                    "Directory lookup failed"
                );
                None
            }
        };

        match found {
            Some(address) => {
                info!(identifier = %local_part, found = %address, "Directory lookup matched");
                Resolution {
                    kind: PatternKind::Domain,
                    destinations: vec![address.clone()],
                    directory_address: Some(address),
                }
            }
            None => {
                info!(identifier = %local_part, "Directory lookup found no record");
                Resolution::mapped(PatternKind::Domain, &[])
            }
        }
    }
}

impl Stage for AddressResolver {
    fn run<'a>(&'a self, mut envelope: EnvelopeContext) -> StageFuture<'a> {
        Box::pin(async move {
            let recipients = envelope.original_recipients().to_vec();

            for address in &recipients {
                let Some(resolution) = self.resolve_address(address).await else {
                    debug!(recipient = %address, "No mapping matched recipient");
                    continue;
                };
                debug!(
                    recipient = %address,
                    kind = ?resolution.kind,
                    destinations = resolution.destinations.len(),
                    "Resolved recipient"
                );
                envelope.resolved_recipients.extend(resolution.destinations);
                if let Some(directory_address) = resolution.directory_address {
                    envelope.to_override = Some(directory_address);
                }
                envelope.primary_original_recipient = Some(address.clone());
            }

            if envelope.resolved_recipients.is_empty() {
                envelope.abort(format!(
                    "No new recipients found for original destinations: {}",
                    recipients.join(", ")
                ));
            } else {
                info!(
                    message_id = %envelope.message_id(),
                    original = %recipients.join(", "),
                    resolved = %envelope.resolved_recipients.join(", "),
                    "Transformed recipients"
                );
            }

            Ok(Flow::from_envelope(envelope))
        })
    }

    fn name(&self) -> &str {
        "address_resolver"
    }
}

/// Removes a known subscription-service prefix from the start of an address.
pub fn strip_subscriber_prefix(address: &str) -> &str {
    for prefix in SUBSCRIBER_PREFIXES {
        if let Some(head) = address.get(..prefix.len()) {
            if head.eq_ignore_ascii_case(prefix) && address.len() > prefix.len() {
                return &address[prefix.len()..];
            }
        }
    }
    address
}

/// Removes a `+tag` between the local part and the `@`.
pub fn fold_plus_tag(address: &str) -> String {
    if let Some(plus) = address.find('+') {
        if let Some(offset) = address[plus..].find('@') {
            return format!("{}{}", &address[..plus], &address[plus + offset..]);
        }
    }
    address.to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::testing::CountingDirectory;

    fn mapping(entries: &[(&str, &[&str])]) -> AddressMapping {
        entries
            .iter()
            .map(|(key, destinations)| (*key, destinations.to_vec()))
            .collect()
    }

    fn envelope(recipients: &[&str]) -> EnvelopeContext {
        EnvelopeContext::new(
            "id".to_string(),
            recipients.iter().map(|r| r.to_string()).collect(),
        )
    }

    async fn resolve(resolver: &AddressResolver, recipients: &[&str]) -> EnvelopeContext {
        resolver.run(envelope(recipients)).await.unwrap().into_envelope()
    }

    #[test]
    fn test_strip_subscriber_prefix() {
        assert_eq!(strip_subscriber_prefix("subscriber+bh12@x.com"), "bh12@x.com");
        assert_eq!(strip_subscriber_prefix("Subscriber+BH12@x.com"), "BH12@x.com");
        assert_eq!(strip_subscriber_prefix("subscriber%2Bbh12@x.com"), "bh12@x.com");
        assert_eq!(strip_subscriber_prefix("subscriber@x.com"), "subscriber@x.com");
        assert_eq!(strip_subscriber_prefix("subscriber+"), "subscriber+");
        assert_eq!(strip_subscriber_prefix("é"), "é");
    }

    #[test]
    fn test_fold_plus_tag() {
        assert_eq!(fold_plus_tag("user+tag@example.com"), "user@example.com");
        assert_eq!(fold_plus_tag("user+a+b@example.com"), "user@example.com");
        assert_eq!(fold_plus_tag("user@example.com"), "user@example.com");
        assert_eq!(fold_plus_tag("user+tag"), "user+tag");
    }

    #[tokio::test]
    async fn test_exact_match() {
        let resolver = AddressResolver::new(
            mapping(&[("info@example.com", &["a@x.com", "b@x.com"])]),
            false,
            None,
        );

        let envelope = resolve(&resolver, &["Info@Example.com"]).await;

        assert_eq!(envelope.resolved_recipients, vec!["a@x.com", "b@x.com"]);
        assert_eq!(
            envelope.primary_original_recipient.as_deref(),
            Some("Info@Example.com")
        );
        assert!(!envelope.is_aborted());
    }

    #[tokio::test]
    async fn test_domain_match_without_directory() {
        let resolver =
            AddressResolver::new(mapping(&[("@example.com", &["dest@other.com"])]), false, None);

        let envelope = resolve(&resolver, &["user@example.com"]).await;

        assert_eq!(envelope.resolved_recipients, vec!["dest@other.com"]);
        assert!(envelope.to_override.is_none());
    }

    #[tokio::test]
    async fn test_domain_match_uses_directory() {
        let directory = Arc::new(CountingDirectory::new(&[("BH1234", "alice@home.com")]));
        let resolver = AddressResolver::new(
            mapping(&[("@example.com", &["ignored@other.com"])]),
            false,
            Some(directory.clone()),
        );

        let envelope = resolve(&resolver, &["BH1234@Example.com"]).await;

        assert_eq!(envelope.resolved_recipients, vec!["alice@home.com"]);
        assert_eq!(envelope.to_override.as_deref(), Some("alice@home.com"));
        assert_eq!(directory.calls(), vec!["BH1234"]);
    }

    #[tokio::test]
    async fn test_domain_match_without_record_adds_nothing() {
        let directory = Arc::new(CountingDirectory::new(&[]));
        let resolver = AddressResolver::new(
            mapping(&[("@example.com", &[]), ("@", &["catchall@other.com"])]),
            false,
            Some(directory.clone()),
        );

        let envelope = resolve(&resolver, &["nobody@example.com"]).await;

        assert!(envelope.resolved_recipients.is_empty());
        assert!(envelope.is_aborted());
        assert_eq!(directory.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_directory_failure_is_absorbed() {
        let directory = Arc::new(CountingDirectory::failing());
        let resolver = AddressResolver::new(
            mapping(&[("@example.com", &[]), ("info@other.org", &["x@y.com"])]),
            false,
            Some(directory),
        );

        let envelope = resolve(&resolver, &["user@example.com", "info@other.org"]).await;

        assert_eq!(envelope.resolved_recipients, vec!["x@y.com"]);
        assert!(envelope.to_override.is_none());
        assert!(!envelope.is_aborted());
    }

    #[tokio::test]
    async fn test_local_part_match() {
        let resolver = AddressResolver::new(
            mapping(&[("local", &["a@x.com", "b@x.com"])]),
            false,
            None,
        );

        let envelope = resolve(&resolver, &["local"]).await;
        assert_eq!(envelope.resolved_recipients, vec!["a@x.com", "b@x.com"]);

        let envelope = resolve(&resolver, &["LOCAL@anywhere.net"]).await;
        assert_eq!(envelope.resolved_recipients, vec!["a@x.com", "b@x.com"]);
    }

    #[tokio::test]
    async fn test_wildcard_match() {
        let resolver = AddressResolver::new(mapping(&[("@", &["catchall@x.com"])]), false, None);

        let resolution = resolver.resolve_address("who@ever.com").await.unwrap();

        assert_eq!(resolution.kind, PatternKind::Wildcard);
        assert_eq!(resolution.destinations, vec!["catchall@x.com"]);
    }

    #[tokio::test]
    async fn test_resolution_precedence() {
        let full = [
            ("info@example.com", &["exact@x.com"][..]),
            ("@example.com", &["domain@x.com"][..]),
            ("info", &["local@x.com"][..]),
            ("@", &["wildcard@x.com"][..]),
        ];
        let expected = [
            (PatternKind::Address, "exact@x.com"),
            (PatternKind::Domain, "domain@x.com"),
            (PatternKind::LocalPart, "local@x.com"),
            (PatternKind::Wildcard, "wildcard@x.com"),
        ];

        for (skip, (kind, destination)) in expected.iter().enumerate() {
            let resolver = AddressResolver::new(mapping(&full[skip..]), false, None);
            let resolution = resolver.resolve_address("info@example.com").await.unwrap();
            assert_eq!(resolution.kind, *kind);
            assert_eq!(resolution.destinations, vec![destination.to_string()]);
        }

        let resolver = AddressResolver::new(mapping(&[]), false, None);
        assert!(resolver.resolve_address("info@example.com").await.is_none());
    }

    #[tokio::test]
    async fn test_plus_sign_folding() {
        let entries = &[("user@example.com", &["dest@x.com"][..])];

        let resolver = AddressResolver::new(mapping(entries), true, None);
        let envelope = resolve(&resolver, &["user+news@example.com"]).await;
        assert_eq!(envelope.resolved_recipients, vec!["dest@x.com"]);

        let resolver = AddressResolver::new(mapping(entries), false, None);
        let envelope = resolve(&resolver, &["user+news@example.com"]).await;
        assert!(envelope.resolved_recipients.is_empty());
    }

    #[tokio::test]
    async fn test_subscriber_prefix_is_stripped_before_lookup() {
        let directory = Arc::new(CountingDirectory::new(&[("bh77", "bob@home.com")]));
        let resolver = AddressResolver::new(
            mapping(&[("@example.com", &[])]),
            true,
            Some(directory.clone()),
        );

        let envelope = resolve(&resolver, &["subscriber+BH77@example.com"]).await;

        assert_eq!(envelope.resolved_recipients, vec!["bob@home.com"]);
        assert_eq!(directory.calls(), vec!["BH77"]);
        assert_eq!(
            envelope.primary_original_recipient.as_deref(),
            Some("subscriber+BH77@example.com")
        );
    }

    #[tokio::test]
    async fn test_no_match_aborts() {
        let resolver = AddressResolver::new(
            mapping(&[("info@example.com", &["a@x.com"])]),
            false,
            None,
        );

        let flow = resolver
            .run(envelope(&["a@nowhere.com", "b@nowhere.com"]))
            .await
            .unwrap();

        assert!(flow.is_abort());
        let envelope = flow.into_envelope();
        assert!(envelope.resolved_recipients.is_empty());
        assert_eq!(
            envelope.abort_reason(),
            Some("No new recipients found for original destinations: a@nowhere.com, b@nowhere.com")
        );
    }

    #[tokio::test]
    async fn test_primary_recipient_is_last_match() {
        let resolver = AddressResolver::new(
            mapping(&[("a@example.com", &["x@y.com"]), ("b@example.com", &["z@y.com"])]),
            false,
            None,
        );

        let envelope =
            resolve(&resolver, &["a@example.com", "nomatch@example.org", "b@example.com"]).await;

        assert_eq!(envelope.resolved_recipients, vec!["x@y.com", "z@y.com"]);
        assert_eq!(
            envelope.primary_original_recipient.as_deref(),
            Some("b@example.com")
        );
    }

    #[tokio::test]
    async fn test_from_config() {
        let config = RelayConfig {
            forward_mapping: HashMap::from([("@".to_string(), vec!["all@x.com".to_string()])]),
            ..Default::default()
        };
        let resolver = AddressResolver::from_config(&config, None);

        let envelope = resolve(&resolver, &["anyone@anywhere.com"]).await;

        assert_eq!(envelope.resolved_recipients, vec!["all@x.com"]);
    }
}
