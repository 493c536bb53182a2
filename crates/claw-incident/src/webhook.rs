//! Inbound webhook messages.
//!
//! The incident service calls back with a batch of messages whenever an
//! incident changes state. Hosts use [`WebhookPayload::acknowledged_alert_keys`]
//! to acknowledge the local alarms behind incidents a responder acknowledged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Type of state change reported by a webhook message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WebhookEventType {
    /// An incident was triggered.
    #[serde(rename = "incident.trigger")]
    Trigger,
    /// An incident was acknowledged.
    #[serde(rename = "incident.acknowledge")]
    Acknowledge,
    /// An acknowledgement expired or was withdrawn.
    #[serde(rename = "incident.unacknowledge")]
    Unacknowledge,
    /// An incident was resolved.
    #[serde(rename = "incident.resolve")]
    Resolve,
    /// An incident was assigned.
    #[serde(rename = "incident.assign")]
    Assign,
    /// An incident was escalated.
    #[serde(rename = "incident.escalate")]
    Escalate,
    /// An incident was delegated.
    #[serde(rename = "incident.delegate")]
    Delegate,
    /// A note was added to an incident.
    #[serde(rename = "incident.annotate")]
    Annotate,
    /// Any event type this crate does not know about.
    #[serde(other, rename = "unknown")]
    Unknown,
}

/// An alert grouped into an incident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentAlert {
    /// Alert id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The dedup key the alert was triggered with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_key: Option<String>,
    /// Alert status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Incident details at the time of the state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// Incident id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Alerts grouped into this incident.
    #[serde(default)]
    pub alerts: Vec<IncidentAlert>,
    /// Account-wide incident number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incident_number: Option<u64>,
    /// Short description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// When the incident was first triggered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// One of triggered, acknowledged or resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// The incident's dedup key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incident_key: Option<String>,
}

/// A single webhook message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookMessage {
    /// Message id, usable for idempotency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// What happened.
    pub event: WebhookEventType,
    /// When the incident changed state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<DateTime<Utc>>,
    /// The incident that changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incident: Option<Incident>,
    /// Webhook configuration that produced the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook: Option<Value>,
    /// Log entries describing the action.
    #[serde(default)]
    pub log_entries: Vec<Value>,
}

/// The body of a webhook call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// Messages in this batch.
    #[serde(default)]
    pub messages: Vec<WebhookMessage>,
}

impl WebhookPayload {
    /// Parses a webhook body.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Serialization` if the body is not a valid payload.
    pub fn parse(body: &str) -> Result<Self> {
        Ok(serde_json::from_str(body)?)
    }

    /// Returns the alert keys of every alert in an acknowledged incident.
    #[must_use]
    pub fn acknowledged_alert_keys(&self) -> Vec<&str> {
        self.messages
            .iter()
            .filter(|m| m.event == WebhookEventType::Acknowledge)
            .filter_map(|m| m.incident.as_ref())
            .flat_map(|incident| incident.alerts.iter())
            .filter_map(|alert| alert.alert_key.as_deref())
            .collect()
    }
}
