//! Acknowledging local alarms from incident webhooks.

use claw_incident::WebhookPayload;
use tracing::info;

use crate::alarm::Alarm;
use crate::feedback::{FeedbackEvent, FeedbackSink};

/// User recorded on acknowledgements when none is configured.
pub const DEFAULT_ACK_USER: &str = "PagerDutyPlugin";

/// Builds an acknowledge event for every alarm behind an acknowledged
/// incident.
///
/// Alerts are matched to alarms by reduction key. Alerts with no matching
/// alarm are logged and skipped.
#[must_use]
pub fn acknowledgements(payload: &WebhookPayload, alarms: &[Alarm], user: &str) -> Vec<FeedbackEvent> {
    payload
        .acknowledged_alert_keys()
        .into_iter()
        .filter_map(|reduction_key| {
            let Some(alarm) = alarms.iter().find(|a| a.reduction_key == reduction_key) else {
                info!(reduction_key, "no matching alarm found for reduction key");
                return None;
            };
            Some(FeedbackEvent::acknowledge(alarm.id, user))
        })
        .collect()
}

/// Emits the acknowledgements for `payload`, returning how many were sent.
pub fn acknowledge(
    payload: &WebhookPayload,
    alarms: &[Alarm],
    user: &str,
    sink: &dyn FeedbackSink,
) -> usize {
    let events = acknowledgements(payload, alarms, user);
    let count = events.len();
    for event in events {
        info!(ref_id = event.parameter("refId").unwrap_or_default(), "sending ack event");
        sink.emit(event);
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::{ACKNOWLEDGE_UEI, ChannelFeedbackSink};

    const BODY: &str = r#"{
        "messages": [
            {
                "event": "incident.acknowledge",
                "incident": {
                    "id": "PIJ90N7",
                    "alerts": [
                        { "alert_key": "nodeDown::1" },
                        { "alert_key": "nodeDown::404" }
                    ]
                }
            },
            {
                "event": "incident.resolve",
                "incident": { "alerts": [ { "alert_key": "nodeDown::2" } ] }
            }
        ]
    }"#;

    fn alarms() -> Vec<Alarm> {
        vec![Alarm::new(1, "nodeDown::1"), Alarm::new(2, "nodeDown::2")]
    }

    #[test]
    fn acknowledges_matching_alarms_only() {
        let payload = WebhookPayload::parse(BODY).unwrap();
        let events = acknowledgements(&payload, &alarms(), "alice");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].uei, ACKNOWLEDGE_UEI);
        assert_eq!(events[0].parameter("refId"), Some("1"));
        assert_eq!(events[0].parameter("ackUser"), Some("alice"));
    }

    #[test]
    fn no_acknowledge_messages_yields_nothing() {
        let payload = WebhookPayload::parse(r#"{"messages":[]}"#).unwrap();
        assert!(acknowledgements(&payload, &alarms(), DEFAULT_ACK_USER).is_empty());
    }

    #[tokio::test]
    async fn acknowledge_emits_to_sink() {
        let payload = WebhookPayload::parse(BODY).unwrap();
        let (sink, mut rx) = ChannelFeedbackSink::new();

        assert_eq!(acknowledge(&payload, &alarms(), DEFAULT_ACK_USER, &sink), 1);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.parameter("ackUser"), Some(DEFAULT_ACK_USER));
    }
}
