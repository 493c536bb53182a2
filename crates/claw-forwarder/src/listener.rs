//! Alarm lifecycle callbacks and their line-delimited JSON form.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

use crate::alarm::Alarm;
use crate::error::Result;

/// Receives alarm lifecycle notifications from the host.
///
/// Callbacks may arrive concurrently and out of order. Implementations
/// handle their own errors; nothing is reported back to the caller.
pub trait AlarmLifecycleListener: Send + Sync {
    /// Called when an alarm is created or changes.
    fn on_new_or_updated_alarm(&self, alarm: &Alarm);

    /// Called when an alarm is deleted.
    fn on_deleted_alarm(&self, alarm_id: i64, reduction_key: &str);

    /// Called with the full set of current alarms.
    ///
    /// Snapshots are not reconciled; the default does nothing.
    fn on_alarm_snapshot(&self, alarms: &[Alarm]) {
        debug!(count = alarms.len(), "ignoring alarm snapshot");
    }
}

/// One lifecycle notification, as read from a JSON line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LifecycleEvent {
    /// An alarm was created or changed.
    Alarm {
        /// The alarm.
        alarm: Alarm,
    },
    /// An alarm was deleted.
    Deleted {
        /// Id of the deleted alarm.
        id: i64,
        /// Reduction key of the deleted alarm.
        #[serde(rename = "reductionKey")]
        reduction_key: String,
    },
    /// Full set of current alarms.
    Snapshot {
        /// The alarms.
        alarms: Vec<Alarm>,
    },
}

impl LifecycleEvent {
    /// Delivers the event to a listener.
    pub fn dispatch(&self, listener: &dyn AlarmLifecycleListener) {
        match self {
            Self::Alarm { alarm } => listener.on_new_or_updated_alarm(alarm),
            Self::Deleted { id, reduction_key } => listener.on_deleted_alarm(*id, reduction_key),
            Self::Snapshot { alarms } => listener.on_alarm_snapshot(alarms),
        }
    }
}

/// Counters for a processed lifecycle stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Lines dispatched to the listener.
    pub dispatched: usize,
    /// Lines that could not be parsed.
    pub malformed: usize,
}

/// Reads newline-delimited lifecycle events and dispatches them until EOF.
///
/// Blank lines are skipped. Malformed lines are logged and counted.
///
/// # Errors
///
/// Returns an error if reading from `reader` fails.
pub async fn process_lifecycle_stream<R>(
    reader: R,
    listener: &dyn AlarmLifecycleListener,
) -> Result<StreamStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = StreamStats::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<LifecycleEvent>(line) {
            Ok(event) => {
                event.dispatch(listener);
                stats.dispatched += 1;
            }
            Err(e) => {
                warn!(error = %e, "skipping malformed lifecycle event");
                stats.malformed += 1;
            }
        }
    }

    Ok(stats)
}
