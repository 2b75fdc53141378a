//! Per-invocation state carried through the relay pipeline.
//!
//! An [`EnvelopeContext`] is created by the event parser, moved into each
//! stage in turn and finally consumed by the dispatcher. Stages hand it back
//! wrapped in a [`Flow`], which tells the pipeline whether to keep going.

/// State of a single relay invocation.
///
/// The message identity and the original recipients are fixed at creation.
/// The abort reason can only be set once and is never cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeContext {
    /// Message identity assigned by the inbound trigger.
    message_id: String,

    /// Recipients the message was originally addressed to, in event order.
    original_recipients: Vec<String>,

    /// Destination addresses produced by recipient resolution.
    pub resolved_recipients: Vec<String>,

    /// Original recipient used as envelope sender for the relayed copy.
    pub primary_original_recipient: Option<String>,

    /// Address returned by the directory lookup, used to rewrite `To`.
    pub to_override: Option<String>,

    /// Header block of the fetched message, rewritten in place.
    pub raw_header: String,

    /// Body of the fetched message starting at the blank separator line,
    /// never modified.
    pub raw_body: Vec<u8>,

    /// Original `From` value, captured when `Reply-To` is injected.
    pub from_address: Option<String>,

    /// Human-readable notes about non-default rewrites.
    pub notes: Vec<String>,

    abort_reason: Option<String>,
}

impl EnvelopeContext {
    pub fn new(message_id: String, original_recipients: Vec<String>) -> Self {
        Self {
            message_id,
            original_recipients,
            resolved_recipients: Vec::new(),
            primary_original_recipient: None,
            to_override: None,
            raw_header: String::new(),
            raw_body: Vec::new(),
            from_address: None,
            notes: Vec::new(),
            abort_reason: None,
        }
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn original_recipients(&self) -> &[String] {
        &self.original_recipients
    }

    /// Marks the invocation as aborted.
    ///
    /// Only the first reason is kept, later calls are ignored.
    pub fn abort(&mut self, reason: impl Into<String>) {
        if self.abort_reason.is_none() {
            self.abort_reason = Some(reason.into());
        }
    }

    pub fn abort_reason(&self) -> Option<&str> {
        self.abort_reason.as_deref()
    }

    pub fn is_aborted(&self) -> bool {
        self.abort_reason.is_some()
    }

    /// Returns the full message as it should be transmitted (header + body).
    pub fn raw_message(&self) -> Vec<u8> {
        let mut raw = Vec::with_capacity(self.raw_header.len() + self.raw_body.len());
        raw.extend_from_slice(self.raw_header.as_bytes());
        raw.extend_from_slice(&self.raw_body);
        raw
    }
}

/// Outcome of a stage: keep processing or pass the context through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue(EnvelopeContext),
    Abort(EnvelopeContext),
}

impl Flow {
    /// Wraps a context according to its abort state.
    pub fn from_envelope(envelope: EnvelopeContext) -> Self {
        if envelope.is_aborted() {
            Flow::Abort(envelope)
        } else {
            Flow::Continue(envelope)
        }
    }

    pub fn envelope(&self) -> &EnvelopeContext {
        match self {
            Flow::Continue(envelope) | Flow::Abort(envelope) => envelope,
        }
    }

    pub fn into_envelope(self) -> EnvelopeContext {
        match self {
            Flow::Continue(envelope) | Flow::Abort(envelope) => envelope,
        }
    }

    pub fn is_abort(&self) -> bool {
        matches!(self, Flow::Abort(_))
    }
}
