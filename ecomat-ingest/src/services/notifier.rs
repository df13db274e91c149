//! Operator notifications
//!
//! Every pipeline event an operator cares about (staged version, promotion,
//! rejection, discovery trouble) goes through one [`Notifier`]. Delivery is
//! best-effort: a dead webhook must never fail a pipeline pass, so `send`
//! reports success as a bool and logs failures instead of returning errors.

use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ecomat_common::models::Decision;

/// An actionable choice attached to a notification
#[derive(Debug, Clone, Serialize)]
pub struct DecisionAction {
    pub decision: Decision,
    /// Version label the decision applies to
    pub version: String,
}

/// One operator-facing message
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub text: String,
    pub actions: Vec<DecisionAction>,
}

impl Notification {
    /// Informational message without actions
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            actions: Vec::new(),
        }
    }

    /// Message carrying approve/reject actions for a staged version
    pub fn decision_request(text: impl Into<String>, version_label: &str) -> Self {
        Self {
            text: text.into(),
            actions: vec![
                DecisionAction {
                    decision: Decision::Approve,
                    version: version_label.to_string(),
                },
                DecisionAction {
                    decision: Decision::Reject,
                    version: version_label.to_string(),
                },
            ],
        }
    }
}

/// Notification sink.
///
/// `Memory` keeps messages in process for tests and for the status API;
/// `Log` is the zero-config fallback when no webhook is configured.
#[derive(Clone)]
pub enum Notifier {
    Webhook(WebhookNotifier),
    Log,
    Memory(MemorySink),
}

impl Notifier {
    /// Deliver a message, best-effort. Returns whether delivery succeeded.
    pub async fn send(&self, message: &Notification) -> bool {
        match self {
            Notifier::Webhook(webhook) => match webhook.post(message).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(error = %e, "Webhook notification failed");
                    false
                }
            },
            Notifier::Log => {
                tracing::info!(actions = message.actions.len(), "{}", message.text);
                true
            }
            Notifier::Memory(sink) => {
                sink.push(message.clone());
                true
            }
        }
    }
}

/// Posts notifications as JSON to a configured webhook
#[derive(Clone)]
pub struct WebhookNotifier {
    http_client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http_client, url })
    }

    async fn post(&self, message: &Notification) -> Result<(), String> {
        let response = self
            .http_client
            .post(&self.url)
            .json(message)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("webhook returned HTTP {}", status.as_u16()));
        }
        Ok(())
    }
}

/// In-process sink capturing every message
#[derive(Clone, Default)]
pub struct MemorySink {
    messages: Arc<Mutex<Vec<Notification>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, message: Notification) {
        self.messages.lock().unwrap().push(message);
    }

    /// Snapshot of everything sent so far
    pub fn messages(&self) -> Vec<Notification> {
        self.messages.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_sink_captures_messages() {
        let sink = MemorySink::new();
        let notifier = Notifier::Memory(sink.clone());

        assert!(notifier.send(&Notification::plain("first")).await);
        assert!(
            notifier
                .send(&Notification::decision_request("second", "2024/1:2024, Version 5"))
                .await
        );

        let sent = sink.messages();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].text, "first");
        assert_eq!(sent[1].actions.len(), 2);
        assert_eq!(sent[1].actions[0].version, "2024/1:2024, Version 5");
    }

    #[test]
    fn decision_request_serializes_both_actions() {
        let message = Notification::decision_request("neu", "2024/1:2024, Version 5");
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["text"], "neu");
        assert_eq!(json["actions"][0]["decision"], "approve");
        assert_eq!(json["actions"][1]["decision"], "reject");
        assert_eq!(json["actions"][0]["version"], "2024/1:2024, Version 5");
    }
}
