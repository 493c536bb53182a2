//! The alarm forwarding engine.
//!
//! A [`Forwarder`] serves one forwarding target. For every alarm transition
//! it decides whether to forward, translates the alarm into an incident
//! event and either holds triggers back for the configured hold-down delay
//! or sends acknowledgements and resolutions right away. A resolution that
//! arrives while the trigger is still held back cancels it, so short-lived
//! alarms never reach the remote service.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use claw_filter::Predicate;
use claw_incident::{EventAction, IncidentClient, IncidentEvent};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::alarm::Alarm;
use crate::config::{PluginConfig, ServiceConfig};
use crate::error::{ForwarderError, Result};
use crate::feedback::{FeedbackEvent, FeedbackSink, RESERVED_UEI_PREFIX};
use crate::listener::AlarmLifecycleListener;
use crate::mapping::{resolve_for_deleted, to_incident_event};
use crate::queue::{Enqueued, HoldDownQueue};
use crate::task::DelayedTask;

/// What the forwarder did with a lifecycle notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The alarm was raised by this crate's own feedback and left alone.
    Ignored,
    /// The filter rejected the alarm, or the delete belonged to a rejected
    /// alarm.
    Suppressed,
    /// A trigger was held back for the hold-down delay.
    Scheduled,
    /// A trigger was already held back for the key; its event was refreshed.
    Rescheduled,
    /// A held-back trigger was cancelled and nothing was sent.
    Absorbed,
    /// An event was handed to the delivery client.
    Sent,
}

impl Outcome {
    /// Returns the outcome as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ignored => "ignored",
            Self::Suppressed => "suppressed",
            Self::Scheduled => "scheduled",
            Self::Rescheduled => "rescheduled",
            Self::Absorbed => "absorbed",
            Self::Sent => "sent",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

struct Inner {
    service: ServiceConfig,
    plugin: PluginConfig,
    filter: Option<Box<dyn Predicate>>,
    client: Arc<dyn IncidentClient>,
    feedback: Arc<dyn FeedbackSink>,
    queue: HoldDownQueue,
    suppressed: Mutex<HashSet<i64>>,
    in_flight: AtomicUsize,
    runtime: Handle,
}

impl Inner {
    fn pid(&self) -> &str {
        &self.service.pid
    }

    /// Hands an event to the client without waiting for the result.
    fn send(self: &Arc<Self>, event: IncidentEvent) {
        info!(
            pid = %self.pid(),
            reduction_key = %event.dedup_key,
            action = %event.event_action,
            "sending event"
        );
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let inner = Arc::clone(self);
        self.runtime.spawn(async move {
            inner.deliver(&event).await;
            inner.in_flight.fetch_sub(1, Ordering::SeqCst);
        });
    }

    async fn deliver(&self, event: &IncidentEvent) {
        let reduction_key = event.dedup_key.as_str();
        match self.client.send_event(event).await {
            Ok(()) => {
                info!(pid = %self.pid(), reduction_key, "event sent successfully");
                self.feedback.emit(FeedbackEvent::send_successful(
                    reduction_key,
                    &self.service.routing_key,
                    self.pid(),
                ));
            }
            Err(e) => {
                warn!(pid = %self.pid(), reduction_key, error = %e, "sending event failed");
                self.feedback.emit(FeedbackEvent::send_failed(
                    reduction_key,
                    &self.service.routing_key,
                    self.pid(),
                    &e.to_string(),
                ));
            }
        }
    }

    async fn consume(self: Arc<Self>) {
        while let Some(task) = self.queue.next_due().await {
            debug!(pid = %self.pid(), reduction_key = %task.reduction_key(), "hold-down elapsed");
            self.send(task.into_event());
        }
        debug!(pid = %self.pid(), "consumer stopped");
    }
}

impl fmt::Debug for Inner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inner")
            .field("service", &self.service)
            .field("filter", &self.filter)
            .field("pending", &self.queue.len())
            .field("suppressed", &self.suppressed.lock().len())
            .finish_non_exhaustive()
    }
}

/// Forwards alarm transitions for one target to the incident service.
#[derive(Debug)]
pub struct Forwarder {
    inner: Arc<Inner>,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl Forwarder {
    /// Starts a forwarder on the current tokio runtime.
    ///
    /// The service's filter, if any, is compiled here.
    ///
    /// # Errors
    ///
    /// Returns an error if the service configuration is invalid, the filter
    /// does not compile, or there is no tokio runtime.
    pub fn start(
        service: ServiceConfig,
        plugin: PluginConfig,
        client: Arc<dyn IncidentClient>,
        feedback: Arc<dyn FeedbackSink>,
    ) -> Result<Self> {
        let filter = service
            .compile_filter()?
            .map(|expr| Box::new(expr) as Box<dyn Predicate>);
        Self::start_with_predicate(service, plugin, filter, client, feedback)
    }

    /// Starts a forwarder that uses `filter` instead of the configured
    /// expression.
    ///
    /// # Errors
    ///
    /// Returns an error if the service configuration is invalid or there is
    /// no tokio runtime.
    pub fn start_with_predicate(
        service: ServiceConfig,
        plugin: PluginConfig,
        filter: Option<Box<dyn Predicate>>,
        client: Arc<dyn IncidentClient>,
        feedback: Arc<dyn FeedbackSink>,
    ) -> Result<Self> {
        service.validate()?;
        let runtime = Handle::try_current().map_err(|e| ForwarderError::Runtime(e.to_string()))?;

        let inner = Arc::new(Inner {
            service,
            plugin,
            filter,
            client,
            feedback,
            queue: HoldDownQueue::new(),
            suppressed: Mutex::new(HashSet::new()),
            in_flight: AtomicUsize::new(0),
            runtime,
        });
        let consumer = inner.runtime.spawn(Arc::clone(&inner).consume());

        info!(
            pid = %inner.pid(),
            hold_down_secs = inner.service.hold_down_delay_secs,
            filtered = inner.filter.is_some(),
            "started forwarder"
        );
        Ok(Self {
            inner,
            consumer: Mutex::new(Some(consumer)),
        })
    }

    /// Returns the service identity.
    #[must_use]
    pub fn pid(&self) -> &str {
        self.inner.pid()
    }

    /// Returns the service configuration.
    #[must_use]
    pub fn service(&self) -> &ServiceConfig {
        &self.inner.service
    }

    /// Handles a new or changed alarm.
    ///
    /// # Errors
    ///
    /// Returns `ForwarderError::Filter` if the filter cannot be evaluated
    /// against the alarm; the alarm is then treated as suppressed. Returns
    /// `ForwarderError::ShutDown` after [`shutdown`](Self::shutdown).
    pub fn on_alarm_updated(&self, alarm: &Alarm) -> Result<Outcome> {
        if alarm.reduction_key.starts_with(RESERVED_UEI_PREFIX) {
            debug!(pid = %self.pid(), reduction_key = %alarm.reduction_key, "ignoring own alarm");
            return Ok(Outcome::Ignored);
        }
        self.ensure_running()?;

        let accepted = match self.should_process(alarm) {
            Ok(accepted) => accepted,
            Err(e) => {
                self.inner.suppressed.lock().insert(alarm.id);
                warn!(
                    pid = %self.pid(),
                    alarm_id = alarm.id,
                    error = %e,
                    "filter evaluation failed, not forwarding alarm"
                );
                return Err(e);
            }
        };

        if !accepted {
            self.inner.suppressed.lock().insert(alarm.id);
            debug!(pid = %self.pid(), alarm_id = alarm.id, "alarm suppressed by filter");
            return Ok(Outcome::Suppressed);
        }
        self.inner.suppressed.lock().remove(&alarm.id);

        let event = to_incident_event(alarm, &self.inner.service.routing_key, &self.inner.plugin);
        match event.event_action {
            EventAction::Trigger => self.schedule(event),
            EventAction::Acknowledge | EventAction::Resolve => Ok(self.cancel_or_send(event)),
        }
    }

    /// Handles a deleted alarm.
    ///
    /// # Errors
    ///
    /// Returns `ForwarderError::ShutDown` after [`shutdown`](Self::shutdown).
    pub fn on_alarm_deleted(&self, alarm_id: i64, reduction_key: &str) -> Result<Outcome> {
        if reduction_key.starts_with(RESERVED_UEI_PREFIX) {
            return Ok(Outcome::Ignored);
        }
        self.ensure_running()?;

        if self.inner.suppressed.lock().remove(&alarm_id) {
            debug!(pid = %self.pid(), alarm_id, "delete of suppressed alarm, not forwarding");
            return Ok(Outcome::Suppressed);
        }

        if self.inner.queue.cancel(reduction_key) > 0 {
            debug!(pid = %self.pid(), reduction_key, "deleted before hold-down elapsed");
            return Ok(Outcome::Absorbed);
        }

        info!(pid = %self.pid(), reduction_key, "sending resolve for deleted alarm");
        self.inner
            .send(resolve_for_deleted(reduction_key, &self.inner.service.routing_key));
        Ok(Outcome::Sent)
    }

    fn should_process(&self, alarm: &Alarm) -> Result<bool> {
        let Some(filter) = &self.inner.filter else {
            info!(pid = %self.pid(), "no filter configured, not forwarding alarm");
            return Ok(false);
        };
        Ok(filter.test(alarm)?)
    }

    fn schedule(&self, event: IncidentEvent) -> Result<Outcome> {
        let reduction_key = event.dedup_key.clone();
        let delay = self.inner.service.hold_down_delay();
        debug!(
            pid = %self.pid(),
            %reduction_key,
            delay_secs = delay.as_secs(),
            "scheduling trigger"
        );

        let task = DelayedTask::after(delay, reduction_key, event).ok_or_else(|| {
            ForwarderError::config(format!(
                "service '{}': hold-down delay of {}s is out of range",
                self.pid(),
                delay.as_secs()
            ))
        })?;
        match self.inner.queue.enqueue(task) {
            Enqueued::Scheduled { .. } => Ok(Outcome::Scheduled),
            Enqueued::Replaced { .. } => Ok(Outcome::Rescheduled),
            Enqueued::Closed => Err(ForwarderError::ShutDown {
                pid: self.pid().to_string(),
            }),
        }
    }

    fn cancel_or_send(&self, event: IncidentEvent) -> Outcome {
        if self.inner.queue.cancel(&event.dedup_key) > 0 {
            debug!(
                pid = %self.pid(),
                reduction_key = %event.dedup_key,
                action = %event.event_action,
                "cancelled pending trigger"
            );
            return Outcome::Absorbed;
        }
        self.inner.send(event);
        Outcome::Sent
    }

    fn ensure_running(&self) -> Result<()> {
        if self.inner.queue.is_closed() {
            return Err(ForwarderError::ShutDown {
                pid: self.pid().to_string(),
            });
        }
        Ok(())
    }

    /// Returns true if the alarm id is currently suppressed.
    #[must_use]
    pub fn is_suppressed(&self, alarm_id: i64) -> bool {
        self.inner.suppressed.lock().contains(&alarm_id)
    }

    /// Returns the number of suppressed alarm ids.
    #[must_use]
    pub fn suppressed_count(&self) -> usize {
        self.inner.suppressed.lock().len()
    }

    /// Returns true if a trigger is held back for the key.
    #[must_use]
    pub fn is_pending(&self, reduction_key: &str) -> bool {
        self.inner.queue.contains(reduction_key)
    }

    /// Returns the number of held-back triggers.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.queue.len()
    }

    /// Returns the number of sends that have not completed yet.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Returns true if nothing is held back or in flight.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.inner.queue.is_empty() && self.in_flight_count() == 0
    }

    /// Returns true once the forwarder was shut down.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.inner.queue.is_closed()
    }

    /// Stops the consumer, drops held-back triggers and closes the client.
    ///
    /// Sends already in flight are not waited for. Calling this again has
    /// no effect.
    pub fn shutdown(&self) {
        let Some(consumer) = self.consumer.lock().take() else {
            return;
        };
        let dropped = self.inner.queue.close();
        consumer.abort();
        self.inner.client.close();
        info!(pid = %self.pid(), dropped, "stopped forwarder");
    }
}

impl Drop for Forwarder {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl AlarmLifecycleListener for Forwarder {
    fn on_new_or_updated_alarm(&self, alarm: &Alarm) {
        if let Err(e) = self.on_alarm_updated(alarm) {
            warn!(pid = %self.pid(), alarm_id = alarm.id, error = %e, "failed to handle alarm");
        }
    }

    fn on_deleted_alarm(&self, alarm_id: i64, reduction_key: &str) {
        if let Err(e) = self.on_alarm_deleted(alarm_id, reduction_key) {
            warn!(pid = %self.pid(), alarm_id, error = %e, "failed to handle deleted alarm");
        }
    }
}
