//! Pending trigger notifications.

use std::time::Duration;

use claw_incident::IncidentEvent;
use tokio::time::Instant;

/// "Send `event` for `reduction_key` no earlier than `fire_at`."
#[derive(Debug, Clone, PartialEq)]
pub struct DelayedTask {
    fire_at: Instant,
    reduction_key: String,
    event: IncidentEvent,
}

impl DelayedTask {
    /// Creates a task that fires at the given instant.
    #[must_use]
    pub fn new(fire_at: Instant, reduction_key: impl Into<String>, event: IncidentEvent) -> Self {
        Self {
            fire_at,
            reduction_key: reduction_key.into(),
            event,
        }
    }

    /// Creates a task that fires `delay` from now.
    ///
    /// Returns `None` if the fire time cannot be represented.
    #[must_use]
    pub fn after(
        delay: Duration,
        reduction_key: impl Into<String>,
        event: IncidentEvent,
    ) -> Option<Self> {
        let fire_at = Instant::now().checked_add(delay)?;
        Some(Self::new(fire_at, reduction_key, event))
    }

    /// Returns when the task becomes due.
    #[must_use]
    pub const fn fire_at(&self) -> Instant {
        self.fire_at
    }

    /// Returns the reduction key the task belongs to.
    #[must_use]
    pub fn reduction_key(&self) -> &str {
        &self.reduction_key
    }

    /// Returns the event to send.
    #[must_use]
    pub const fn event(&self) -> &IncidentEvent {
        &self.event
    }

    /// Consumes the task, returning its event.
    #[must_use]
    pub fn into_event(self) -> IncidentEvent {
        self.event
    }

    /// Returns the time left until the task is due, zero once it is.
    #[must_use]
    pub fn remaining(&self, now: Instant) -> Duration {
        self.fire_at.saturating_duration_since(now)
    }

    /// Returns true if the task is due at `now`.
    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        self.fire_at <= now
    }

    pub(crate) fn replace_event(&mut self, event: IncidentEvent) {
        self.event = event;
    }
}
