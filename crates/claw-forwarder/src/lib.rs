//! # claw-forwarder
//!
//! Forwards alarm lifecycle transitions to an incident service.
//!
//! Each configured service gets a [`Forwarder`] which:
//! - ignores alarms raised by its own feedback events
//! - filters alarms with a [`claw_filter::Expression`] and remembers the ids
//!   it rejected, so their deletion is not forwarded either
//! - holds triggers back for a configurable hold-down delay and drops them
//!   when the alarm clears, is acknowledged or is deleted in the meantime
//! - delivers events asynchronously and reports each outcome as a
//!   [`FeedbackEvent`]
//!
//! ```text
//! lifecycle events ──► ServiceManager ──► Forwarder ──► HoldDownQueue
//!                                             │               │
//!                                             ▼               ▼
//!                                     IncidentClient ◄── consumer task
//!                                             │
//!                                             ▼
//!                                       FeedbackSink
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use claw_forwarder::{
//!     Alarm, Forwarder, LogFeedbackSink, PluginConfig, ServiceConfig, Severity,
//! };
//! use claw_incident::HttpIncidentClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = ServiceConfig::new("ops", "R0UT1NGK3Y")
//!     .with_filter("alarm.severityLevel >= 6")
//!     .with_hold_down_delay_secs(30);
//! let forwarder = Forwarder::start(
//!     service,
//!     PluginConfig::default(),
//!     Arc::new(HttpIncidentClient::new()?),
//!     Arc::new(LogFeedbackSink),
//! )?;
//!
//! let alarm = Alarm::new(1, "uei.opennms.org/nodes/nodeDown::1").with_severity(Severity::Major);
//! forwarder.on_alarm_updated(&alarm)?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod ack;
pub mod alarm;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod feedback;
pub mod forwarder;
pub mod listener;
pub mod manager;
pub mod mapping;
pub mod output;
pub mod queue;
pub mod task;

pub use ack::{DEFAULT_ACK_USER, acknowledge, acknowledgements};
pub use alarm::{Alarm, AlarmType, DatabaseEvent, EventParameter, IpInterface, Node, Severity};
pub use config::{ForwarderConfig, PluginConfig, ServiceConfig};
pub use error::{ForwarderError, Result};
pub use feedback::{
    ChannelFeedbackSink, FeedbackEvent, FeedbackSink, LogFeedbackSink, RESERVED_UEI_PREFIX,
};
pub use forwarder::{Forwarder, Outcome};
pub use listener::{AlarmLifecycleListener, LifecycleEvent, StreamStats, process_lifecycle_stream};
pub use manager::{ClientFactory, HttpClientFactory, ServiceManager};
pub use mapping::{event_action, to_incident_event};
pub use queue::{Enqueued, HoldDownQueue};
pub use task::DelayedTask;
