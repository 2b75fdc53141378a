//! Decoding and validation of the inbound mail-receipt event.
//!
//! The trigger carries exactly one record from the mail-delivery source
//! with the message identity and the ordered recipient list:
//!
//! ```json
//! {"Records": [{"eventSource": "aws:ses", "eventVersion": "1.0",
//!   "ses": {"mail": {"messageId": "abc"}, "receipt": {"recipients": ["a@b.com"]}}}]}
//! ```

use serde::Deserialize;
use tracing::{error, info};

use crate::{EnvelopeContext, RelayError, RelayResult};

/// Event source accepted by the relay.
pub const EVENT_SOURCE: &str = "aws:ses";

/// Event schema version accepted by the relay.
pub const EVENT_VERSION: &str = "1.0";

/// Trigger event as delivered by the mail-receipt service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TriggerEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<EventRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    #[serde(default)]
    pub event_source: Option<String>,

    #[serde(default)]
    pub event_version: Option<String>,

    #[serde(default)]
    pub ses: Option<ReceiptPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptPayload {
    pub mail: MailInfo,
    pub receipt: ReceiptInfo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailInfo {
    pub message_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptInfo {
    #[serde(default)]
    pub recipients: Vec<String>,
}

impl TriggerEvent {
    /// Builds a well-formed event, mostly useful for tests and replays.
    pub fn new(message_id: &str, recipients: &[&str]) -> Self {
        Self {
            records: vec![EventRecord {
                event_source: Some(EVENT_SOURCE.to_string()),
                event_version: Some(EVENT_VERSION.to_string()),
                ses: Some(ReceiptPayload {
                    mail: MailInfo {
                        message_id: message_id.to_string(),
                    },
                    receipt: ReceiptInfo {
                        recipients: recipients.iter().map(|r| r.to_string()).collect(),
                    },
                }),
            }],
        }
    }
}

/// Decodes a JSON trigger payload and validates it with [`parse_event`].
pub fn parse_event_json(payload: &str) -> RelayResult<EnvelopeContext> {
    let event: TriggerEvent = serde_json::from_str(payload).map_err(|e| {
        error!(error = %e, "Received undecodable mail event");
        RelayError::InvalidEvent(format!("undecodable event: {e}"))
    })?;
    parse_event(&event)
}

/// Validates a trigger event and creates the envelope context for it.
///
/// The event must hold exactly one record from [`EVENT_SOURCE`] at
/// [`EVENT_VERSION`] with a non-empty message identity. Recipients are
/// trimmed and kept in event order.
pub fn parse_event(event: &TriggerEvent) -> RelayResult<EnvelopeContext> {
    let payload = match event.records.as_slice() {
        [record]
            if record.event_source.as_deref() == Some(EVENT_SOURCE)
                && record.event_version.as_deref() == Some(EVENT_VERSION) =>
        {
            record.ses.as_ref()
        }
        _ => None,
    };

    let Some(payload) = payload.filter(|p| !p.mail.message_id.trim().is_empty()) else {
        error!(
            records = event.records.len(),
            event = ?event,
            "Received invalid mail event"
        );
        return Err(RelayError::InvalidEvent(
            "expected one mail-receipt record".to_string(),
        ));
    };

    let recipients: Vec<String> = payload
        .receipt
        .recipients
        .iter()
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .collect();

    info!(
        message_id = %payload.mail.message_id,
        recipients = %recipients.join(", "),
        "Parsed mail event"
    );

    Ok(EnvelopeContext::new(
        payload.mail.message_id.trim().to_string(),
        recipients,
    ))
}
