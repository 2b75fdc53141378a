//! Chat-webhook notifier.
//!
//! Posts each notification as JSON in the incoming-webhook shape used by
//! common chat services. Feature-gated behind `webhook`.

use serde::Serialize;
use tracing::{debug, error, info};

use crate::{NotifyConfig, Notifier, NotifyError, NotifyFuture};

/// JSON body posted to the webhook.
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<&'a str>,
    username: &'a str,
    icon_emoji: &'a str,
    as_user: bool,
}

/// Notifier posting to an incoming chat webhook.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    channel: Option<String>,
    username: String,
    icon_emoji: String,
}

impl WebhookNotifier {
    /// Creates a new [`WebhookNotifier`] from the `[notify]` configuration.
    pub fn new(config: &NotifyConfig) -> Self {
        info!(
            channel = ?config.channel,
            username = %config.username,
            "Webhook notifier initialized"
        );
        Self {
            client: reqwest::Client::new(),
            url: config.webhook_url.clone(),
            channel: config.channel.clone(),
            username: config.username.clone(),
            icon_emoji: config.icon_emoji.clone(),
        }
    }
}

impl Notifier for WebhookNotifier {
    fn notify<'a>(&'a self, text: &'a str) -> NotifyFuture<'a> {
        Box::pin(async move {
            let payload = WebhookPayload {
                text,
                channel: self.channel.as_deref(),
                username: &self.username,
                icon_emoji: &self.icon_emoji,
                as_user: false,
            };

            let response = self
                .client
                .post(&self.url)
                .json(&payload)
                .send()
                .await
                .map_err(|e| {
                    error!(error = %e, "Failed to reach notification webhook");
                    NotifyError::Connection(e.to_string())
                })?;

            let status = response.status();
            if !status.is_success() {
                error!(status = %status, "Notification webhook refused the message");
                return Err(NotifyError::Rejected(format!("HTTP {status}")));
            }

            debug!(status = %status, size = text.len(), "Posted notification to webhook");
            Ok(())
        })
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let payload = WebhookPayload {
            text: "Forwarding email from: a@b.com",
            channel: None,
            username: "mailfwd",
            icon_emoji: ":envelope_with_arrow:",
            as_user: false,
        };

        let value = serde_json::to_value(&payload).unwrap();

        assert_eq!(value["text"], "Forwarding email from: a@b.com");
        assert_eq!(value["username"], "mailfwd");
        assert_eq!(value["as_user"], false);
        assert!(value.get("channel").is_none());
    }

    #[tokio::test]
    async fn test_unreachable_webhook() {
        let notifier = WebhookNotifier::new(&NotifyConfig {
            webhook_url: "http://127.0.0.1:1/hook".to_string(),
            channel: Some("#mail".to_string()),
            username: "mailfwd".to_string(),
            icon_emoji: ":envelope_with_arrow:".to_string(),
        });

        let result = notifier.notify("hello").await;

        assert!(matches!(result, Err(NotifyError::Connection(_))));
    }
}
