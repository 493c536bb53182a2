//! Translation of alarms into incident events.

use claw_incident::{EventAction, EventPayload, IncidentEvent};
use tracing::{info, warn};

use crate::alarm::{Alarm, AlarmType, Severity};
use crate::config::PluginConfig;

/// Source reported when the alarm has no labelled node.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Returns the action an alarm's current state calls for.
#[must_use]
pub fn event_action(alarm: &Alarm) -> EventAction {
    if alarm.severity == Severity::Cleared || alarm.alarm_type == Some(AlarmType::Resolution) {
        EventAction::Resolve
    } else if alarm.acknowledged {
        EventAction::Acknowledge
    } else {
        EventAction::Trigger
    }
}

/// Builds the complete event for an alarm.
///
/// The result depends only on the arguments.
#[must_use]
pub fn to_incident_event(alarm: &Alarm, routing_key: &str, plugin: &PluginConfig) -> IncidentEvent {
    let mut event = IncidentEvent::new(routing_key, alarm.reduction_key.as_str(), event_action(alarm))
        .with_client(plugin.client.as_str())
        .with_payload(build_payload(alarm, plugin));

    if !plugin.alarm_details_url.is_empty() {
        event = event.with_client_url(plugin.alarm_details_url_for(alarm.id));
    }
    event
}

/// Builds the descriptive payload for an alarm.
#[must_use]
pub fn build_payload(alarm: &Alarm, plugin: &PluginConfig) -> EventPayload {
    let mut payload = EventPayload::new(
        "",
        alarm.node_label().unwrap_or(UNKNOWN_SOURCE),
        alarm.severity.incident_severity(),
    );

    apply_summary(&mut payload, alarm, plugin.summary_max_length);

    if let Some(time) = alarm.last_event.as_ref().and_then(|e| e.time) {
        payload = payload.with_timestamp(time);
    }

    if let (Some(object_type), Some(instance)) = (
        alarm.managed_object_type.as_deref().filter(|s| !s.is_empty()),
        alarm.managed_object_instance.as_deref().filter(|s| !s.is_empty()),
    ) {
        payload = payload.with_component(format!("{object_type} - {instance}"));
    }

    if let Some(last_event) = &alarm.last_event {
        for parameter in &last_event.parameters {
            payload.insert_detail_if_absent(parameter.name.as_str(), parameter.value.as_str());
        }
    }

    if let Some(node) = &alarm.node {
        if let Some(label) = &node.label {
            payload.insert_detail_if_absent("nodeLabel", label.as_str());
        }
        payload.insert_detail_if_absent(
            "node_categories",
            format!("[{}]", node.categories.join(", ")),
        );
        if let Some(ip_address) = node.primary_ip_address() {
            payload.insert_detail_if_absent("node_ipAddress", ip_address);
        }
    }

    if plugin.include_alarm_data {
        match serde_json::to_value(alarm) {
            Ok(alarm_json) => {
                payload.custom_details.insert("alarm_data".to_string(), alarm_json);
            }
            Err(e) => warn!(
                reduction_key = %alarm.reduction_key,
                error = %e,
                "failed to serialize alarm, omitting alarm_data"
            ),
        }
    }

    payload
}

/// Sets the payload summary from the alarm's log message, logging when it
/// had to be truncated. Returns true if it was.
fn apply_summary(payload: &mut EventPayload, alarm: &Alarm, max_length: usize) -> bool {
    let truncated = payload.set_summary(alarm.log_message.trim(), max_length);
    if truncated {
        info!(
            reduction_key = %alarm.reduction_key,
            max_length,
            "log message too long, truncating payload summary"
        );
    }
    truncated
}

/// Builds the identity-only resolve sent when an alarm is deleted.
#[must_use]
pub fn resolve_for_deleted(reduction_key: &str, routing_key: &str) -> IncidentEvent {
    IncidentEvent::new(routing_key, reduction_key, EventAction::Resolve)
}
