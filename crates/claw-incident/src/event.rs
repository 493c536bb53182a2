//! Incident event model.
//!
//! This module provides the outbound event sent to the Events API v2:
//! - [`EventAction`]: What the event asks the service to do
//! - [`IncidentSeverity`]: The severity vocabulary of the service
//! - [`EventPayload`]: Descriptive fields attached to trigger events
//! - [`IncidentEvent`]: The complete event as it goes on the wire

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default maximum length of the payload summary, in characters.
pub const SUMMARY_MAX_LENGTH: usize = 1024;

/// The action requested by an incident event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventAction {
    /// Open an incident, or add to the open incident with the same dedup key.
    Trigger,
    /// Mark the incident as being worked on.
    Acknowledge,
    /// Close the incident.
    Resolve,
}

impl EventAction {
    /// Returns the action as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Trigger => "trigger",
            Self::Acknowledge => "acknowledge",
            Self::Resolve => "resolve",
        }
    }
}

impl fmt::Display for EventAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Severity of an incident as understood by the remote service.
///
/// Variants are ordered from least to most severe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentSeverity {
    /// Informational.
    #[default]
    Info,
    /// Something should be looked at.
    Warning,
    /// Something is broken.
    Error,
    /// Immediate attention required.
    Critical,
}

impl IncidentSeverity {
    /// Returns the severity as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for IncidentSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An image rendered alongside the incident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventImage {
    /// Image URL.
    pub src: String,
    /// Optional link target when the image is clicked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    /// Optional alternative text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

/// A link rendered alongside the incident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLink {
    /// Link target.
    pub href: String,
    /// Optional link text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Descriptive part of an incident event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    /// Short description of the problem.
    pub summary: String,
    /// When the underlying condition was detected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// The affected system, usually a host name.
    pub source: String,
    /// Severity of the condition.
    pub severity: IncidentSeverity,
    /// Component of the source that is affected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    /// Logical grouping of components.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Class or type of the event.
    #[serde(rename = "class", default, skip_serializing_if = "Option::is_none")]
    pub event_class: Option<String>,
    /// Free-form details.
    #[serde(default)]
    pub custom_details: Map<String, Value>,
}

impl EventPayload {
    /// Creates a payload with the required fields.
    #[must_use]
    pub fn new(
        summary: impl Into<String>,
        source: impl Into<String>,
        severity: IncidentSeverity,
    ) -> Self {
        Self {
            summary: summary.into(),
            timestamp: None,
            source: source.into(),
            severity,
            component: None,
            group: None,
            event_class: None,
            custom_details: Map::new(),
        }
    }

    /// Sets the summary, cut down to at most `max_chars` characters.
    ///
    /// Returns `true` if the text had to be truncated.
    pub fn set_summary(&mut self, summary: &str, max_chars: usize) -> bool {
        let truncated = truncate_chars(summary, max_chars);
        let was_truncated = truncated.len() < summary.len();
        self.summary = truncated.to_string();
        was_truncated
    }

    /// Sets the timestamp.
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the component.
    #[must_use]
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    /// Sets the group.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Sets the event class.
    #[must_use]
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.event_class = Some(class.into());
        self
    }

    /// Inserts a custom detail unless the key is already present.
    ///
    /// Returns `true` if the value was inserted.
    pub fn insert_detail_if_absent(&mut self, key: impl Into<String>, value: impl Into<Value>) -> bool {
        let key = key.into();
        if self.custom_details.contains_key(&key) {
            return false;
        }
        self.custom_details.insert(key, value.into());
        true
    }
}

/// An event sent to the Events API v2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentEvent {
    /// Integration key of the destination service.
    pub routing_key: String,
    /// Correlates trigger, acknowledge and resolve events of one incident.
    pub dedup_key: String,
    /// What to do with the incident.
    pub event_action: EventAction,
    /// Name of the monitoring client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    /// Link back to the monitoring client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_url: Option<String>,
    /// Incident details. Absent for events that only carry identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<EventPayload>,
    /// Images to display.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<EventImage>,
    /// Links to display.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<EventLink>,
}

impl IncidentEvent {
    /// Creates an event that carries only identity and action.
    #[must_use]
    pub fn new(
        routing_key: impl Into<String>,
        dedup_key: impl Into<String>,
        event_action: EventAction,
    ) -> Self {
        Self {
            routing_key: routing_key.into(),
            dedup_key: dedup_key.into(),
            event_action,
            client: None,
            client_url: None,
            payload: None,
            images: Vec::new(),
            links: Vec::new(),
        }
    }

    /// Sets the client name.
    #[must_use]
    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client = Some(client.into());
        self
    }

    /// Sets the client URL.
    #[must_use]
    pub fn with_client_url(mut self, url: impl Into<String>) -> Self {
        self.client_url = Some(url.into());
        self
    }

    /// Sets the payload.
    #[must_use]
    pub fn with_payload(mut self, payload: EventPayload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Adds an image.
    #[must_use]
    pub fn with_image(mut self, image: EventImage) -> Self {
        self.images.push(image);
        self
    }

    /// Adds a link.
    #[must_use]
    pub fn with_link(mut self, link: EventLink) -> Self {
        self.links.push(link);
        self
    }

    /// Serializes the event to its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Serialization` if serialization fails.
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string(self).map_err(crate::ClientError::from)
    }
}

/// Returns the longest prefix of `text` with at most `max_chars` characters.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
