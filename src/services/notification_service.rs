use std::sync::Mutex;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineEventKind {
    #[serde(rename = "application.submitted")]
    ApplicationSubmitted,
    #[serde(rename = "application.status_changed")]
    StatusChanged,
    #[serde(rename = "interview.scheduled")]
    InterviewScheduled,
    #[serde(rename = "interview.rescheduled")]
    InterviewRescheduled,
    #[serde(rename = "interview.completed")]
    InterviewCompleted,
    #[serde(rename = "interview.cancelled")]
    InterviewCancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    pub event: PipelineEventKind,
    pub application_id: Uuid,
    pub company_id: Uuid,
    pub candidate_id: Uuid,
    pub actor_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub payload: JsonValue,
}

/// Fire-and-forget outlet for pipeline events. Implementations must not block
/// and must never fail the operation that emitted the event.
#[cfg_attr(test, mockall::automock)]
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: PipelineEvent);
}

/// Posts each event as JSON to a webhook, on a detached task.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    target_url: String,
    secret: String,
}

impl WebhookNotifier {
    pub fn new(target_url: String, secret: String) -> Self {
        Self {
            client: Client::new(),
            target_url,
            secret,
        }
    }

    async fn deliver(client: Client, target_url: String, secret: String, event: PipelineEvent) {
        let res = client
            .post(&target_url)
            .header("X-Webhook-Secret", secret)
            .json(&event)
            .send()
            .await;
        match res {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!(event = ?event.event, application_id = %event.application_id, "notification delivered");
            }
            Ok(resp) => {
                tracing::warn!(
                    event = ?event.event,
                    application_id = %event.application_id,
                    status = resp.status().as_u16(),
                    "notification webhook rejected event"
                );
            }
            Err(err) => {
                tracing::warn!(
                    event = ?event.event,
                    application_id = %event.application_id,
                    error = %err,
                    "notification webhook unreachable"
                );
            }
        }
    }
}

impl NotificationSink for WebhookNotifier {
    fn notify(&self, event: PipelineEvent) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(event = ?event.event, "no runtime available, dropping notification");
            return;
        };
        handle.spawn(Self::deliver(
            self.client.clone(),
            self.target_url.clone(),
            self.secret.clone(),
            event,
        ));
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl NotificationSink for NoopNotifier {
    fn notify(&self, event: PipelineEvent) {
        tracing::debug!(event = ?event.event, application_id = %event.application_id, "notification sink disabled");
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<PipelineEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn kinds(&self) -> Vec<PipelineEventKind> {
        self.events().into_iter().map(|e| e.event).collect()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, event: PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kinds_serialize_as_dotted_names() {
        let json = serde_json::to_value(PipelineEventKind::InterviewScheduled).unwrap();
        assert_eq!(json, serde_json::json!("interview.scheduled"));
    }

    #[test]
    fn recording_notifier_keeps_order() {
        let sink = RecordingNotifier::new();
        for kind in [PipelineEventKind::ApplicationSubmitted, PipelineEventKind::StatusChanged] {
            sink.notify(PipelineEvent {
                event: kind,
                application_id: Uuid::new_v4(),
                company_id: Uuid::new_v4(),
                candidate_id: Uuid::new_v4(),
                actor_id: Uuid::new_v4(),
                occurred_at: Utc::now(),
                payload: JsonValue::Null,
            });
        }
        assert_eq!(
            sink.kinds(),
            vec![PipelineEventKind::ApplicationSubmitted, PipelineEventKind::StatusChanged]
        );
    }
}
