//! Forwarder configuration.
//!
//! Configuration is split into:
//! - [`PluginConfig`]: settings shared by every forwarding target
//! - [`ServiceConfig`]: one forwarding target (routing key, filter, hold-down)
//! - [`ForwarderConfig`]: the TOML file holding both

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use claw_filter::Expression;
use claw_incident::{DEFAULT_EVENTS_URL, SUMMARY_MAX_LENGTH};
use serde::{Deserialize, Serialize};

use crate::error::{ForwarderError, Result};

/// Default client name shown on incidents.
pub const DEFAULT_CLIENT: &str = "OpenNMS";

/// Default link from an incident back to the alarm.
pub const DEFAULT_ALARM_DETAILS_URL: &str =
    "http://localhost:8980/opennms/alarm/detail.htm?id={id}";

/// Longest accepted hold-down delay: one week.
pub const MAX_HOLD_DOWN_DELAY_SECS: u64 = 7 * 24 * 60 * 60;

/// Settings shared by all forwarding targets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PluginConfig {
    /// Client name sent with every event.
    pub client: String,
    /// Alarm details URL. `{id}` or `%d` is replaced by the alarm id.
    pub alarm_details_url: String,
    /// Maximum summary length in characters.
    pub summary_max_length: usize,
    /// Whether to embed the full alarm as `alarm_data` in custom details.
    pub include_alarm_data: bool,
    /// Events API endpoint.
    pub events_url: String,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            client: DEFAULT_CLIENT.to_string(),
            alarm_details_url: DEFAULT_ALARM_DETAILS_URL.to_string(),
            summary_max_length: SUMMARY_MAX_LENGTH,
            include_alarm_data: true,
            events_url: DEFAULT_EVENTS_URL.to_string(),
        }
    }
}

impl PluginConfig {
    /// Sets the client name.
    #[must_use]
    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client = client.into();
        self
    }

    /// Sets the alarm details URL pattern.
    #[must_use]
    pub fn with_alarm_details_url(mut self, pattern: impl Into<String>) -> Self {
        self.alarm_details_url = pattern.into();
        self
    }

    /// Sets the maximum summary length.
    #[must_use]
    pub const fn with_summary_max_length(mut self, max: usize) -> Self {
        self.summary_max_length = max;
        self
    }

    /// Sets whether the full alarm is embedded in custom details.
    #[must_use]
    pub const fn with_alarm_data(mut self, include: bool) -> Self {
        self.include_alarm_data = include;
        self
    }

    /// Sets the Events API endpoint.
    #[must_use]
    pub fn with_events_url(mut self, url: impl Into<String>) -> Self {
        self.events_url = url.into();
        self
    }

    /// Returns the details URL for an alarm.
    #[must_use]
    pub fn alarm_details_url_for(&self, alarm_id: i64) -> String {
        let id = alarm_id.to_string();
        self.alarm_details_url
            .replace("{id}", &id)
            .replace("%d", &id)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.summary_max_length == 0 {
            return Err(ForwarderError::config(
                "plugin.summary_max_length must be greater than 0",
            ));
        }

        if !self.events_url.starts_with("http://") && !self.events_url.starts_with("https://") {
            return Err(ForwarderError::config(
                "plugin.events_url must start with http:// or https://",
            ));
        }

        Ok(())
    }
}

/// One forwarding target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Identity of the target.
    pub pid: String,
    /// Integration key of the remote service.
    pub routing_key: String,
    /// Filter expression; alarms are only forwarded when it holds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Delay before a trigger is sent, in seconds.
    #[serde(default)]
    pub hold_down_delay_secs: u64,
}

impl ServiceConfig {
    /// Creates a target with no filter and no hold-down delay.
    #[must_use]
    pub fn new(pid: impl Into<String>, routing_key: impl Into<String>) -> Self {
        Self {
            pid: pid.into(),
            routing_key: routing_key.into(),
            filter: None,
            hold_down_delay_secs: 0,
        }
    }

    /// Sets the filter expression.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Sets the hold-down delay in seconds.
    #[must_use]
    pub const fn with_hold_down_delay_secs(mut self, secs: u64) -> Self {
        self.hold_down_delay_secs = secs;
        self
    }

    /// Returns the hold-down delay.
    #[must_use]
    pub const fn hold_down_delay(&self) -> Duration {
        Duration::from_secs(self.hold_down_delay_secs)
    }

    /// Compiles the filter, if one is configured.
    ///
    /// A blank filter counts as no filter.
    ///
    /// # Errors
    ///
    /// Returns `ForwarderError::Filter` if the expression does not compile.
    pub fn compile_filter(&self) -> Result<Option<Expression>> {
        match self.filter.as_deref().map(str::trim) {
            Some(source) if !source.is_empty() => Ok(Some(Expression::compile(source)?)),
            _ => Ok(None),
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.pid.trim().is_empty() {
            return Err(ForwarderError::config("service pid cannot be empty"));
        }

        if self.routing_key.trim().is_empty() {
            return Err(ForwarderError::config(format!(
                "service '{}': routing_key cannot be empty",
                self.pid
            )));
        }

        if self.hold_down_delay_secs > MAX_HOLD_DOWN_DELAY_SECS {
            return Err(ForwarderError::config(format!(
                "service '{}': hold_down_delay_secs must be at most {MAX_HOLD_DOWN_DELAY_SECS}",
                self.pid
            )));
        }

        Ok(())
    }
}

/// Contents of a forwarder configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForwarderConfig {
    /// Shared settings.
    #[serde(default)]
    pub plugin: PluginConfig,
    /// Forwarding targets.
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

impl ForwarderConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ForwarderError::config(format!(
                "failed to read config file '{}': {e}",
                path.as_ref().display()
            ))
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid or two
    /// services share a pid.
    pub fn validate(&self) -> Result<()> {
        self.plugin.validate()?;

        let mut seen = HashSet::new();
        for service in &self.services {
            service.validate()?;
            if !seen.insert(service.pid.as_str()) {
                return Err(ForwarderError::config(format!(
                    "duplicate service pid '{}'",
                    service.pid
                )));
            }
        }

        Ok(())
    }
}
