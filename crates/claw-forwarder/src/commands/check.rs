//! Configuration check command implementation.

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::config::ForwarderConfig;
use crate::output::{OutputFormat, TableDisplay};

/// Handler for the `check-config` subcommand.
pub struct CheckCommand<'a> {
    config_path: &'a Path,
}

impl<'a> CheckCommand<'a> {
    /// Creates a new check command handler.
    #[must_use]
    pub const fn new(config_path: &'a Path) -> Self {
        Self { config_path }
    }

    /// Loads the configuration, compiles every filter and prints a summary.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or a filter does not
    /// compile.
    pub fn execute<W: Write>(&self, out: &mut W, format: &OutputFormat) -> anyhow::Result<()> {
        let config = ForwarderConfig::from_file(self.config_path)?;

        let mut services = Vec::with_capacity(config.services.len());
        for service in &config.services {
            let filter = service.compile_filter()?;
            services.push(ServiceSummary {
                pid: service.pid.clone(),
                filter: filter.map(|f| f.source().to_string()),
                hold_down_delay_secs: service.hold_down_delay_secs,
            });
        }

        let summary = ConfigSummary {
            events_url: config.plugin.events_url,
            client: config.plugin.client,
            services,
        };
        format.write(out, &summary)
    }
}

/// Validated configuration, as reported by `check-config`.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    /// Events endpoint.
    pub events_url: String,
    /// Client name.
    pub client: String,
    /// Configured services.
    pub services: Vec<ServiceSummary>,
}

/// One configured service.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceSummary {
    /// Service pid.
    pub pid: String,
    /// Compiled filter, if any.
    pub filter: Option<String>,
    /// Hold-down delay in seconds.
    pub hold_down_delay_secs: u64,
}

impl TableDisplay for ConfigSummary {
    fn write_table<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writeln!(writer, "Configuration OK")?;
        writeln!(writer, "Events URL:  {}", self.events_url)?;
        writeln!(writer, "Client:      {}", self.client)?;
        writeln!(writer)?;
        if self.services.is_empty() {
            writeln!(writer, "No services configured.")?;
            return Ok(());
        }
        writeln!(writer, "{:<20} {:>10}  FILTER", "PID", "HOLD-DOWN")?;
        for service in &self.services {
            writeln!(
                writer,
                "{:<20} {:>9}s  {}",
                service.pid,
                service.hold_down_delay_secs,
                service.filter.as_deref().unwrap_or("(none, alarms are not forwarded)")
            )?;
        }
        Ok(())
    }
}
