//! Header rewriting applied before a message is relayed.
//!
//! The header block is parsed into a [`HeaderBlock`] and rewritten by an
//! ordered set of rules:
//!
//! 1. `Reply-To` injection from `From`
//! 2. `From` substitution with the verified sender
//! 3. `Subject` prefixing, with loop and bounce detection
//! 4. `To` override with the directory address
//! 5. `Bcc` override or injection
//! 6. removal of `Return-Path`, `Sender` and `Message-ID`
//! 7. removal of every `DKIM-Signature`
//! 8. de-duplication of `MIME-Version`
//!
//! An abort raised by rule 3 does not stop the later rules, the pipeline
//! only honours it at the next stage boundary. The body is never touched.

use regex::Regex;
use tracing::{debug, info, warn};

use crate::{
    ConfigError, EnvelopeContext, Flow, HeaderBlock, HeaderField, RelayConfig, Stage, StageFuture,
};

/// Fields removed from every relayed message.
const STRIPPED_FIELDS: [&str; 3] = ["Return-Path", "Sender", "Message-ID"];

/// Stage rewriting the header block of the fetched message.
#[derive(Debug, Clone)]
pub struct HeaderTransformer {
    from_email: Option<String>,
    subject_prefix: String,
    loop_detection: bool,
    abort_subject: Option<Regex>,
    bcc_email: Option<String>,
}

impl HeaderTransformer {
    /// Creates a new [`HeaderTransformer`] from the relay configuration,
    /// compiling the abort-subject pattern.
    pub fn from_config(config: &RelayConfig) -> Result<Self, ConfigError> {
        let abort_subject = config.abort_subject_pattern()?;
        info!(
            from_email = ?config.from_email,
            subject_prefix = %config.subject_prefix,
            loop_detection = config.loop_detection,
            abort_subject = ?config.abort_subject,
            bcc_email = ?config.bcc_email,
            "Header transformer initialized"
        );
        Ok(Self {
            from_email: config.from_email.clone(),
            subject_prefix: config.subject_prefix.clone(),
            loop_detection: config.loop_detection,
            abort_subject,
            bcc_email: config.bcc_email.clone(),
        })
    }

    /// Applies every rule to the envelope's header block in place.
    pub fn rewrite(&self, envelope: &mut EnvelopeContext) {
        let mut block = HeaderBlock::parse(&envelope.raw_header);

        self.add_reply_to(&mut block, envelope);
        self.replace_from(&mut block, envelope);
        self.rewrite_subject(&mut block, envelope);
        self.override_to(&mut block, envelope);
        self.override_bcc(&mut block, envelope);

        for name in STRIPPED_FIELDS {
            let removed = block.remove_all(name);
            if removed > 0 {
                debug!(field = name, removed, "Removed header field");
            }
        }

        let removed = block.remove_all("DKIM-Signature");
        if removed > 0 {
            debug!(removed, "Removed DKIM signatures");
        }

        let removed = block.retain_first("MIME-Version");
        if removed > 0 {
            debug!(removed, "Removed duplicate MIME-Version fields");
        }

        envelope.raw_header = block.to_string();
    }

    /// Copies `From` into a new `Reply-To` field when the message has none.
    fn add_reply_to(&self, block: &mut HeaderBlock, envelope: &mut EnvelopeContext) {
        if block.contains("Reply-To") {
            return;
        }

        let from = block
            .find("From")
            .filter(|field| !field.unfolded().is_empty())
            .map(|field| (field.value().to_string(), field.unfolded()));

        match from {
            Some((value, unfolded)) => {
                info!(reply_to = %unfolded, "Added Reply-To address");
                block.append(HeaderField::new("Reply-To", &value));
                envelope.from_address = Some(unfolded);
            }
            None => {
                info!("Reply-To address not added because From address was not extracted");
            }
        }
    }

    /// Replaces the address of every `From` field, keeping the display name.
    fn replace_from(&self, block: &mut HeaderBlock, envelope: &EnvelopeContext) {
        let primary = envelope.primary_original_recipient.as_deref();
        for field in block.fields_named_mut("From") {
            let current = field.unfolded();
            match self.substitute_from(&current, primary) {
                Some(replaced) => {
                    if replaced != current {
                        debug!(from = %replaced, "Replaced From address");
                        field.set_value(&replaced);
                    }
                }
                None => warn!(from = %current, "From left untouched, no sender address known"),
            }
        }
    }

    /// Computes the substituted `From` value, `None` when no sending
    /// address is available.
    ///
    /// Re-applying the substitution to its own output yields the same value.
    pub fn substitute_from(&self, current: &str, primary: Option<&str>) -> Option<String> {
        if let Some(verified) = &self.from_email {
            let name = display_name(current);
            return Some(if name.is_empty() {
                format!("<{verified}>")
            } else {
                format!("{name} <{verified}>")
            });
        }

        let primary = primary?;
        if angle_address(current).eq_ignore_ascii_case(primary) {
            return Some(current.to_string());
        }
        let name = current.replacen('<', "at ", 1).replacen('>', "", 1);
        let name = name.trim();
        Some(if name.is_empty() {
            format!("<{primary}>")
        } else {
            format!("{name} <{primary}>")
        })
    }

    /// Prefixes every `Subject`, or aborts on a loop or a bounce subject.
    ///
    /// A subject raising the abort is removed from the block for this pass.
    fn rewrite_subject(&self, block: &mut HeaderBlock, envelope: &mut EnvelopeContext) {
        let marker = self.subject_prefix.trim();
        block.retain_named("Subject", |field| {
            let subject = field.unfolded();

            if self.loop_detection && !marker.is_empty() && subject.contains(marker) {
                debug!("Subject already carries the prefix");
                envelope.abort(format!(
                    "Possible forwarding loop, subject already prefixed: {subject}"
                ));
                return false;
            }

            if let Some(pattern) = &self.abort_subject {
                if pattern.is_match(&subject) {
                    debug!("Subject matches the abort pattern");
                    envelope.abort(format!("Subject matches abort pattern: {subject}"));
                    return false;
                }
            }

            if !self.subject_prefix.is_empty() {
                field.prepend_value(&self.subject_prefix);
                debug!(subject = %field.unfolded(), "Subject rewritten");
            }
            true
        });
    }

    /// Points `To` at the address found in the directory.
    fn override_to(&self, block: &mut HeaderBlock, envelope: &EnvelopeContext) {
        let Some(address) = envelope.to_override.as_deref() else {
            return;
        };
        match block.set_all("To", address) {
            0 => debug!(to = %address, "No To field to override"),
            changed => info!(to = %address, changed, "Overrode To field"),
        }
    }

    /// Sets the fixed `Bcc`, appending the field when the message has none.
    fn override_bcc(&self, block: &mut HeaderBlock, envelope: &mut EnvelopeContext) {
        let Some(bcc) = self.bcc_email.as_deref() else {
            return;
        };
        if block.set_all("Bcc", bcc) > 0 {
            info!(bcc = %bcc, "Overrode Bcc field");
            return;
        }
        block.append(HeaderField::new("Bcc", bcc));
        info!(bcc = %bcc, "Added Bcc field");
        envelope.notes.push(format!("added Bcc header: {bcc}"));
    }
}

impl Stage for HeaderTransformer {
    fn run<'a>(&'a self, mut envelope: EnvelopeContext) -> StageFuture<'a> {
        Box::pin(async move {
            self.rewrite(&mut envelope);
            info!(
                message_id = %envelope.message_id(),
                aborted = envelope.is_aborted(),
                "Rewrote message header"
            );
            Ok(Flow::from_envelope(envelope))
        })
    }

    fn name(&self) -> &str {
        "header_transformer"
    }
}

/// Removes the angle-bracketed part of an address, leaving the display name.
fn display_name(value: &str) -> String {
    match (value.find('<'), value.rfind('>')) {
        (Some(start), Some(end)) if start < end => {
            format!("{}{}", &value[..start], &value[end + 1..])
                .trim()
                .to_string()
        }
        _ => value.trim().to_string(),
    }
}

/// Returns the angle-bracketed address, or the whole value when bare.
fn angle_address(value: &str) -> &str {
    match (value.find('<'), value.rfind('>')) {
        (Some(start), Some(end)) if start < end => value[start + 1..end].trim(),
        _ => value.trim(),
    }
}
