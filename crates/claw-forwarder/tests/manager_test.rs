//! End-to-end tests for the service manager with recording clients.

use std::sync::Arc;
use std::time::Duration;

use claw_forwarder::{
    Alarm, AlarmLifecycleListener, ChannelFeedbackSink, FeedbackEvent, ForwarderConfig,
    PluginConfig, ServiceConfig, ServiceManager, Severity,
};
use claw_incident::{ClientError, EventAction, IncidentClient, IncidentEvent, SendFuture};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Records every event it is asked to send, with the time of the request.
#[derive(Debug, Default)]
struct RecordingClient {
    sent: Mutex<Vec<(Instant, IncidentEvent)>>,
    fail: bool,
}

impl IncidentClient for RecordingClient {
    fn send_event<'a>(&'a self, event: &'a IncidentEvent) -> SendFuture<'a> {
        Box::pin(async move {
            self.sent.lock().push((Instant::now(), event.clone()));
            if self.fail {
                return Err(ClientError::Rejected {
                    status: 500,
                    body: "(empty)".to_string(),
                });
            }
            Ok(())
        })
    }
}

struct Fixture {
    manager: ServiceManager,
    clients: Arc<Mutex<Vec<Arc<RecordingClient>>>>,
    feedback: mpsc::UnboundedReceiver<FeedbackEvent>,
}

impl Fixture {
    fn new(services: Vec<ServiceConfig>, fail: bool) -> Self {
        let clients: Arc<Mutex<Vec<Arc<RecordingClient>>>> = Arc::default();
        let factory = {
            let clients = Arc::clone(&clients);
            move |_: &PluginConfig| -> claw_incident::Result<Arc<dyn IncidentClient>> {
                let client = Arc::new(RecordingClient {
                    fail,
                    ..RecordingClient::default()
                });
                clients.lock().push(Arc::clone(&client));
                Ok(client)
            }
        };
        let (sink, feedback) = ChannelFeedbackSink::new();
        let config = ForwarderConfig {
            plugin: PluginConfig::default(),
            services,
        };
        let manager = ServiceManager::from_config(&config, factory, Arc::new(sink)).unwrap();
        Self {
            manager,
            clients,
            feedback,
        }
    }

    fn sent(&self) -> Vec<(Instant, EventAction, String)> {
        let mut sent: Vec<_> = self
            .clients
            .lock()
            .iter()
            .flat_map(|c| {
                c.sent
                    .lock()
                    .iter()
                    .map(|(at, e)| (*at, e.event_action, e.routing_key.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();
        sent.sort_by_key(|(at, _, _)| *at);
        sent
    }
}

fn node_down(id: i64) -> Alarm {
    Alarm::new(id, format!("uei.opennms.org/nodes/nodeDown::{id}"))
        .with_severity(Severity::Major)
        .with_log_message("Node is down")
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn services_apply_their_own_filters_and_delays() {
    let fixture = Fixture::new(
        vec![
            ServiceConfig::new("fast", "FAST")
                .with_filter("true")
                .with_hold_down_delay_secs(0),
            ServiceConfig::new("slow", "SLOW")
                .with_filter("alarm.severityLevel >= 6")
                .with_hold_down_delay_secs(60),
            ServiceConfig::new("critical-only", "CRIT")
                .with_filter("alarm.severity == 'CRITICAL'"),
        ],
        false,
    );
    let start = Instant::now();

    fixture.manager.on_new_or_updated_alarm(&node_down(1));
    tokio::time::sleep(Duration::from_secs(61)).await;
    settle().await;

    let sent = fixture.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].2, "FAST");
    assert_eq!(sent[0].0, start);
    assert_eq!(sent[1].2, "SLOW");
    assert_eq!(sent[1].0 - start, Duration::from_secs(60));
    assert!(
        fixture
            .manager
            .get("critical-only")
            .unwrap()
            .is_suppressed(1)
    );
}

#[tokio::test(start_paused = true)]
async fn flapping_alarm_only_reaches_services_without_hold_down() {
    let fixture = Fixture::new(
        vec![
            ServiceConfig::new("fast", "FAST").with_filter("true"),
            ServiceConfig::new("slow", "SLOW")
                .with_filter("true")
                .with_hold_down_delay_secs(60),
        ],
        false,
    );

    fixture.manager.on_new_or_updated_alarm(&node_down(1));
    tokio::time::sleep(Duration::from_secs(10)).await;
    fixture
        .manager
        .on_new_or_updated_alarm(&node_down(1).with_severity(Severity::Cleared));
    tokio::time::sleep(Duration::from_secs(120)).await;
    settle().await;

    let sent: Vec<_> = fixture
        .sent()
        .into_iter()
        .map(|(_, action, routing)| (action, routing))
        .collect();
    assert_eq!(
        sent,
        vec![
            (EventAction::Trigger, "FAST".to_string()),
            (EventAction::Resolve, "FAST".to_string()),
        ]
    );
    assert_eq!(fixture.manager.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn failures_are_reported_per_service() {
    let mut fixture = Fixture::new(
        vec![ServiceConfig::new("ops", "R0UT1NG").with_filter("true")],
        true,
    );

    fixture.manager.on_deleted_alarm(5, "nodeDown::5");
    let event = fixture.feedback.recv().await.unwrap();
    assert!(event.is_failure());
    assert_eq!(event.parameter("pid"), Some("ops"));
    assert_eq!(event.parameter("reductionKey"), Some("nodeDown::5"));
    assert_eq!(
        event.parameter("message"),
        Some("request failed with response code: 500 and body: (empty)")
    );
}

#[tokio::test(start_paused = true)]
async fn removing_a_service_drops_its_pending_triggers() {
    let fixture = Fixture::new(
        vec![
            ServiceConfig::new("ops", "R0UT1NG")
                .with_filter("true")
                .with_hold_down_delay_secs(30),
        ],
        false,
    );

    fixture.manager.on_new_or_updated_alarm(&node_down(1));
    assert_eq!(fixture.manager.pending_count(), 1);

    fixture.manager.remove("ops").unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;
    settle().await;
    assert!(fixture.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn own_feedback_alarms_are_never_forwarded() {
    let fixture = Fixture::new(
        vec![ServiceConfig::new("ops", "R0UT1NG").with_filter("true")],
        false,
    );

    let own = Alarm::new(9, "uei.opennms.org/pagerduty/sendEventFailed::ops")
        .with_severity(Severity::Warning);
    fixture.manager.on_new_or_updated_alarm(&own);
    fixture.manager.on_deleted_alarm(9, &own.reduction_key);
    settle().await;

    assert!(fixture.sent().is_empty());
}
