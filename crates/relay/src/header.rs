//! Header block model used by the rewriting stage.
//!
//! The relay does not parse MIME structure. A raw message is split at the
//! first empty line into a header block and a body, and the header block is
//! decoded into an ordered list of [`HeaderEntry`] values. Folded
//! continuation lines and line terminators are kept inside each entry, so
//! serializing an untouched [`HeaderBlock`] yields the original text.

use std::fmt::{self, Display};

/// Splits a raw message into its header block and body.
///
/// The header block holds every line up to the first empty line, each with
/// its terminator. The body starts at that empty line, so concatenating the
/// two parts always reconstructs the input. A message without an empty line
/// is treated as header only.
///
/// # Examples
///
/// ```rust
/// let (header, body) = mailfwd_relay::split_message(b"Subject: Hi\r\n\r\nBody");
/// assert_eq!(header, "Subject: Hi\r\n");
/// assert_eq!(body, b"\r\nBody");
/// ```
pub fn split_message(raw: &[u8]) -> (String, Vec<u8>) {
    let mut pos = 0;
    while pos < raw.len() {
        let end = match raw[pos..].iter().position(|&b| b == b'\n') {
            Some(offset) => pos + offset + 1,
            None => raw.len(),
        };
        let line = &raw[pos..end];
        if line == b"\n" || line == b"\r\n" {
            break;
        }
        pos = end;
    }
    (
        String::from_utf8_lossy(&raw[..pos]).into_owned(),
        raw[pos..].to_vec(),
    )
}

/// A single header field, possibly spanning several physical lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    /// Field name exactly as written before the colon.
    name: String,

    /// Everything after the colon, folded lines and their breaks included,
    /// without the terminator of the last line.
    raw_value: String,

    /// Terminator of the last physical line (`"\r\n"`, `"\n"` or empty).
    eol: String,
}

impl HeaderField {
    /// Creates a field with a single leading space before the value.
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            raw_value: format!(" {value}"),
            eol: String::new(),
        }
    }

    /// Returns the field name without trailing whitespace.
    pub fn name(&self) -> &str {
        self.name.trim_end()
    }

    /// Returns whether this field has the given name (case-insensitive).
    pub fn is(&self, name: &str) -> bool {
        self.name().eq_ignore_ascii_case(name)
    }

    /// Returns the value with at most one leading space or tab removed.
    ///
    /// Folded continuation lines are kept as they appear in the message.
    pub fn value(&self) -> &str {
        self.raw_value
            .strip_prefix(is_wsp)
            .unwrap_or(&self.raw_value)
    }

    /// Returns the unfolded value with surrounding whitespace trimmed.
    pub fn unfolded(&self) -> String {
        self.raw_value
            .replace("\r\n", "")
            .replace('\n', "")
            .trim()
            .to_string()
    }

    /// Replaces the whole value, continuation lines included.
    pub fn set_value(&mut self, value: &str) {
        self.raw_value = format!(" {value}");
    }

    /// Inserts `prefix` in front of the current value, keeping any folding.
    pub fn prepend_value(&mut self, prefix: &str) {
        let value = format!(" {prefix}{}", self.value());
        self.raw_value = value;
    }
}

impl Display for HeaderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}{}", self.name, self.raw_value, self.eol)
    }
}

/// An entry of a header block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderEntry {
    /// A well-formed `Name: value` field.
    Field(HeaderField),

    /// A line that is not a field, kept verbatim with its terminator.
    Malformed(String),
}

impl Display for HeaderEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderEntry::Field(field) => Display::fmt(field, f),
            HeaderEntry::Malformed(line) => f.write_str(line),
        }
    }
}

/// Ordered, loss-free view over a raw header block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderBlock {
    entries: Vec<HeaderEntry>,

    /// Line terminator used for appended fields.
    eol: &'static str,
}

impl HeaderBlock {
    /// Parses a raw header block.
    ///
    /// Lines starting with a space or tab continue the previous entry.
    /// Lines without a valid field name are kept as
    /// [`HeaderEntry::Malformed`] so they survive a rewrite untouched.
    pub fn parse(header: &str) -> Self {
        let mut entries: Vec<HeaderEntry> = Vec::new();

        for line in header.split_inclusive('\n') {
            let (content, eol) = split_eol(line);

            if content.starts_with(is_wsp) {
                match entries.last_mut() {
                    Some(HeaderEntry::Field(field)) => {
                        field.raw_value.push_str(&field.eol);
                        field.raw_value.push_str(content);
                        field.eol = eol.to_string();
                        continue;
                    }
                    Some(HeaderEntry::Malformed(previous)) => {
                        previous.push_str(line);
                        continue;
                    }
                    None => {}
                }
            }

            match content.split_once(':') {
                Some((name, value)) if is_field_name(name.trim_end()) => {
                    entries.push(HeaderEntry::Field(HeaderField {
                        name: name.to_string(),
                        raw_value: value.to_string(),
                        eol: eol.to_string(),
                    }))
                }
                _ => entries.push(HeaderEntry::Malformed(line.to_string())),
            }
        }

        let eol = if header.contains("\r\n") || !header.contains('\n') {
            "\r\n"
        } else {
            "\n"
        };

        Self { entries, eol }
    }

    /// Returns all entries in order.
    pub fn entries(&self) -> &[HeaderEntry] {
        &self.entries
    }

    /// Iterates over the well-formed fields in order.
    pub fn fields(&self) -> impl Iterator<Item = &HeaderField> {
        self.entries.iter().filter_map(|entry| match entry {
            HeaderEntry::Field(field) => Some(field),
            HeaderEntry::Malformed(_) => None,
        })
    }

    /// Iterates mutably over every field with the given name.
    pub fn fields_named_mut<'a>(
        &'a mut self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a mut HeaderField> + 'a {
        self.entries.iter_mut().filter_map(move |entry| match entry {
            HeaderEntry::Field(field) if field.is(name) => Some(field),
            _ => None,
        })
    }

    /// Returns the first field with the given name (case-insensitive).
    pub fn find(&self, name: &str) -> Option<&HeaderField> {
        self.fields().find(|field| field.is(name))
    }

    /// Returns whether at least one field has the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Returns the number of fields with the given name.
    pub fn count(&self, name: &str) -> usize {
        self.fields().filter(|field| field.is(name)).count()
    }

    /// Sets the value of every field with the given name, returning how
    /// many fields were changed.
    pub fn set_all(&mut self, name: &str, value: &str) -> usize {
        let mut changed = 0;
        for field in self.fields_named_mut(name) {
            field.set_value(value);
            changed += 1;
        }
        changed
    }

    /// Appends a field at the end of the block.
    ///
    /// If the last line has no terminator one is added first, so the new
    /// field always starts on its own line.
    pub fn append(&mut self, mut field: HeaderField) {
        match self.entries.last_mut() {
            Some(HeaderEntry::Field(last)) if last.eol.is_empty() => {
                last.eol = self.eol.to_string();
            }
            Some(HeaderEntry::Malformed(last)) if !last.ends_with('\n') => {
                last.push_str(self.eol);
            }
            _ => {}
        }
        field.eol = self.eol.to_string();
        self.entries.push(HeaderEntry::Field(field));
    }

    /// Keeps only the fields with the given name for which `keep` returns
    /// `true`, letting the closure rewrite the fields it keeps.
    pub fn retain_named<F>(&mut self, name: &str, mut keep: F)
    where
        F: FnMut(&mut HeaderField) -> bool,
    {
        self.entries.retain_mut(|entry| match entry {
            HeaderEntry::Field(field) if field.is(name) => keep(field),
            _ => true,
        });
    }

    /// Removes every field with the given name, returning how many were removed.
    pub fn remove_all(&mut self, name: &str) -> usize {
        let before = self.entries.len();
        self.retain_named(name, |_| false);
        before - self.entries.len()
    }

    /// Removes every field with the given name except the first one,
    /// returning how many were removed.
    pub fn retain_first(&mut self, name: &str) -> usize {
        let mut seen = false;
        let before = self.entries.len();
        self.retain_named(name, |_| !std::mem::replace(&mut seen, true));
        before - self.entries.len()
    }
}

impl Display for HeaderBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            Display::fmt(entry, f)?;
        }
        Ok(())
    }
}

fn is_wsp(c: char) -> bool {
    c == ' ' || c == '\t'
}

fn split_eol(line: &str) -> (&str, &str) {
    if let Some(content) = line.strip_suffix("\r\n") {
        (content, "\r\n")
    } else if let Some(content) = line.strip_suffix('\n') {
        (content, "\n")
    } else {
        (line, "")
    }
}

/// RFC 5322 field names are printable US-ASCII without the colon.
fn is_field_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| (33..=126).contains(&b) && b != b':')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_message() {
        let (header, body) = split_message(b"From: a@b.com\r\nSubject: Hi\r\n\r\nBody\r\n\r\nMore");
        assert_eq!(header, "From: a@b.com\r\nSubject: Hi\r\n");
        assert_eq!(body, b"\r\nBody\r\n\r\nMore");
    }

    #[test]
    fn test_split_message_without_body() {
        let (header, body) = split_message(b"Subject: Only headers");
        assert_eq!(header, "Subject: Only headers");
        assert!(body.is_empty());
    }

    #[test]
    fn test_split_message_leading_blank_line() {
        let (header, body) = split_message(b"\nJust a body");
        assert_eq!(header, "");
        assert_eq!(body, b"\nJust a body");
    }

    #[test]
    fn test_split_message_keeps_binary_body() {
        let raw = b"Subject: x\n\n\xff\xfe\x00binary".to_vec();
        let (header, body) = split_message(&raw);
        let mut joined = header.into_bytes();
        joined.extend_from_slice(&body);
        assert_eq!(joined, raw);
    }

    #[test]
    fn test_parse_round_trip_preserves_text() {
        let header = "Received: from a\r\n\tby b\r\nFrom: \"Doe\" <doe@example.com>\r\nnot a header\r\nSubject:Hi\r\n";
        let block = HeaderBlock::parse(header);
        assert_eq!(block.to_string(), header);
        assert_eq!(block.entries().len(), 4);
    }

    #[test]
    fn test_parse_folded_field() {
        let block = HeaderBlock::parse("Subject: part one\r\n  part two\r\nTo: x@y.com\r\n");
        let subject = block.find("subject").unwrap();
        assert_eq!(subject.value(), "part one\r\n  part two");
        assert_eq!(subject.unfolded(), "part one  part two");
        assert_eq!(block.count("To"), 1);
    }

    #[test]
    fn test_parse_malformed_line() {
        let block = HeaderBlock::parse("garbage line\r\nTo: x@y.com\r\n");
        assert!(matches!(block.entries()[0], HeaderEntry::Malformed(_)));
        assert_eq!(block.fields().count(), 1);
    }

    #[test]
    fn test_append_uses_block_line_ending() {
        let mut block = HeaderBlock::parse("To: x@y.com\n");
        block.append(HeaderField::new("Bcc", "audit@example.com"));
        assert_eq!(block.to_string(), "To: x@y.com\nBcc: audit@example.com\n");
    }

    #[test]
    fn test_append_terminates_last_line() {
        let mut block = HeaderBlock::parse("To: x@y.com");
        block.append(HeaderField::new("Bcc", "audit@example.com"));
        assert_eq!(block.to_string(), "To: x@y.com\r\nBcc: audit@example.com\r\n");
    }

    #[test]
    fn test_remove_all_drops_continuations() {
        let mut block = HeaderBlock::parse(
            "DKIM-Signature: v=1;\r\n\tb=abc\r\nTo: x@y.com\r\ndkim-signature: v=1\r\n",
        );
        assert_eq!(block.remove_all("DKIM-Signature"), 2);
        assert_eq!(block.to_string(), "To: x@y.com\r\n");
    }

    #[test]
    fn test_retain_first() {
        let mut block =
            HeaderBlock::parse("MIME-Version: 1.0\r\nTo: x@y.com\r\nMime-Version: 1.0\r\n");
        assert_eq!(block.retain_first("MIME-Version"), 1);
        assert_eq!(block.to_string(), "MIME-Version: 1.0\r\nTo: x@y.com\r\n");
    }

    #[test]
    fn test_set_all_and_prepend() {
        let mut block = HeaderBlock::parse("To: a@b.com\r\nSubject:\tHello\r\n");
        assert_eq!(block.set_all("to", "c@d.com"), 1);
        block
            .fields_named_mut("Subject")
            .for_each(|field| field.prepend_value("[Fwd] "));
        assert_eq!(block.to_string(), "To: c@d.com\r\nSubject: [Fwd] Hello\r\n");
    }
}
