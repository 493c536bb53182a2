//! Local events reporting delivery outcomes back to the host.
//!
//! This module provides the [`FeedbackSink`] trait and two implementations:
//! [`LogFeedbackSink`] writes events to the log and [`ChannelFeedbackSink`]
//! hands them to a tokio channel.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::alarm::EventParameter;

/// Prefix of every UEI this crate emits. Alarms whose reduction key starts
/// with it are never forwarded.
pub const RESERVED_UEI_PREFIX: &str = "uei.opennms.org/pagerduty";

/// Emitted after an event was delivered.
pub const SEND_EVENT_SUCCESSFUL_UEI: &str = "uei.opennms.org/pagerduty/sendEventSuccessful";

/// Emitted after an event could not be delivered.
pub const SEND_EVENT_FAILED_UEI: &str = "uei.opennms.org/pagerduty/sendEventFailed";

/// Asks the host to acknowledge an alarm.
pub const ACKNOWLEDGE_UEI: &str = "uei.opennms.org/ackd/acknowledge";

/// Source recorded on emitted events.
pub const FEEDBACK_SOURCE: &str = "claw-forwarder";

/// An event sent back into the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackEvent {
    /// Event UEI.
    pub uei: String,
    /// Component that emitted the event.
    pub source: String,
    /// Event parameters in order.
    pub parameters: Vec<EventParameter>,
}

impl FeedbackEvent {
    /// Creates an event with no parameters.
    #[must_use]
    pub fn new(uei: impl Into<String>) -> Self {
        Self {
            uei: uei.into(),
            source: FEEDBACK_SOURCE.to_string(),
            parameters: Vec::new(),
        }
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push(EventParameter::new(name, value));
        self
    }

    /// Reports a successful delivery.
    #[must_use]
    pub fn send_successful(reduction_key: &str, routing_key: &str, pid: &str) -> Self {
        Self::new(SEND_EVENT_SUCCESSFUL_UEI)
            .with_parameter("reductionKey", reduction_key)
            .with_parameter("routingKey", routing_key)
            .with_parameter("pid", pid)
    }

    /// Reports a failed delivery.
    #[must_use]
    pub fn send_failed(reduction_key: &str, routing_key: &str, pid: &str, message: &str) -> Self {
        Self::new(SEND_EVENT_FAILED_UEI)
            .with_parameter("reductionKey", reduction_key)
            .with_parameter("message", message)
            .with_parameter("routingKey", routing_key)
            .with_parameter("pid", pid)
    }

    /// Asks the host to acknowledge the alarm with the given id.
    #[must_use]
    pub fn acknowledge(alarm_id: i64, user: &str) -> Self {
        Self::new(ACKNOWLEDGE_UEI)
            .with_parameter("ackType", "alarm")
            .with_parameter("ackUser", user)
            .with_parameter("refId", alarm_id.to_string())
    }

    /// Returns the value of the named parameter.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    /// Returns true for a failed-delivery event.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.uei == SEND_EVENT_FAILED_UEI
    }
}

/// Receives feedback events.
///
/// Emission is best effort: implementations must not block and must not
/// fail the caller.
pub trait FeedbackSink: Send + Sync + fmt::Debug {
    /// Emits an event.
    fn emit(&self, event: FeedbackEvent);
}

/// Writes feedback events to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFeedbackSink;

impl FeedbackSink for LogFeedbackSink {
    fn emit(&self, event: FeedbackEvent) {
        let parameters = event
            .parameters
            .iter()
            .map(|p| format!("{}={}", p.name, p.value))
            .collect::<Vec<_>>()
            .join(" ");
        info!(uei = %event.uei, source = %event.source, %parameters, "feedback event");
    }
}

/// Sends feedback events over an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelFeedbackSink {
    sender: mpsc::UnboundedSender<FeedbackEvent>,
}

impl ChannelFeedbackSink {
    /// Creates a sink and the receiving end of its channel.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FeedbackEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl FeedbackSink for ChannelFeedbackSink {
    fn emit(&self, event: FeedbackEvent) {
        if let Err(err) = self.sender.send(event) {
            debug!(uei = %err.0.uei, "feedback receiver dropped, discarding event");
        }
    }
}
