//! PagerDuty Events API v2 model and delivery client.
//!
//! `claw-incident` provides the outbound incident event, the
//! [`IncidentClient`] delivery trait and an HTTP implementation, plus the
//! model of inbound webhook messages.
//!
//! # Example
//!
//! ```rust
//! use claw_incident::{EventAction, EventPayload, IncidentEvent, IncidentSeverity};
//!
//! let mut payload = EventPayload::new("", "db01.example.com", IncidentSeverity::Error);
//! payload.set_summary("  Disk /var is 98% full  ".trim(), 1024);
//!
//! let event = IncidentEvent::new("R0UT1NGK3Y", "disk-full::db01", EventAction::Trigger)
//!     .with_client("OpenNMS")
//!     .with_payload(payload);
//!
//! let json = event.to_json().unwrap();
//! assert!(json.contains("\"event_action\":\"trigger\""));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod client;
pub mod error;
pub mod event;
pub mod webhook;

pub use client::{DEFAULT_EVENTS_URL, HttpIncidentClient, IncidentClient, SendFuture};
pub use error::{ClientError, Result};
pub use event::{
    EventAction, EventImage, EventLink, EventPayload, IncidentEvent, IncidentSeverity,
    SUMMARY_MAX_LENGTH, truncate_chars,
};
pub use webhook::{Incident, IncidentAlert, WebhookEventType, WebhookMessage, WebhookPayload};
