//! Registry of forwarders keyed by service pid.
//!
//! The [`ServiceManager`] owns one [`Forwarder`] per configured target and
//! fans alarm lifecycle callbacks out to all of them.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use claw_incident::{HttpIncidentClient, IncidentClient};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::alarm::Alarm;
use crate::config::{ForwarderConfig, PluginConfig, ServiceConfig};
use crate::error::{ForwarderError, Result};
use crate::feedback::FeedbackSink;
use crate::forwarder::Forwarder;
use crate::listener::AlarmLifecycleListener;

/// Builds the delivery client for a new forwarder.
pub trait ClientFactory: Send + Sync {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built from `plugin`.
    fn create(&self, plugin: &PluginConfig) -> claw_incident::Result<Arc<dyn IncidentClient>>;
}

impl<F> ClientFactory for F
where
    F: Fn(&PluginConfig) -> claw_incident::Result<Arc<dyn IncidentClient>> + Send + Sync,
{
    fn create(&self, plugin: &PluginConfig) -> claw_incident::Result<Arc<dyn IncidentClient>> {
        self(plugin)
    }
}

/// Creates an HTTP client for the configured events endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpClientFactory;

impl ClientFactory for HttpClientFactory {
    fn create(&self, plugin: &PluginConfig) -> claw_incident::Result<Arc<dyn IncidentClient>> {
        Ok(Arc::new(HttpIncidentClient::with_endpoint(&plugin.events_url)?))
    }
}

/// Owns the forwarders for all configured services.
pub struct ServiceManager {
    plugin: PluginConfig,
    factory: Box<dyn ClientFactory>,
    feedback: Arc<dyn FeedbackSink>,
    forwarders: RwLock<HashMap<String, Arc<Forwarder>>>,
}

impl ServiceManager {
    /// Creates a manager with no services.
    #[must_use]
    pub fn new(
        plugin: PluginConfig,
        factory: impl ClientFactory + 'static,
        feedback: Arc<dyn FeedbackSink>,
    ) -> Self {
        Self {
            plugin,
            factory: Box::new(factory),
            feedback,
            forwarders: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a manager and starts a forwarder for every configured service.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or a forwarder fails
    /// to start. Forwarders started before the failure are shut down.
    pub fn from_config(
        config: &ForwarderConfig,
        factory: impl ClientFactory + 'static,
        feedback: Arc<dyn FeedbackSink>,
    ) -> Result<Self> {
        config.validate()?;
        let manager = Self::new(config.plugin.clone(), factory, feedback);
        for service in &config.services {
            if let Err(e) = manager.update(service.clone()) {
                manager.shutdown_all();
                return Err(e);
            }
        }
        Ok(manager)
    }

    /// Returns the shared plugin settings.
    #[must_use]
    pub const fn plugin(&self) -> &PluginConfig {
        &self.plugin
    }

    /// Starts a forwarder for `service`, replacing any forwarder with the
    /// same pid.
    ///
    /// The replacement is built first. If that fails the existing forwarder
    /// keeps running.
    ///
    /// # Errors
    ///
    /// Returns an error if the service configuration is invalid, its filter
    /// does not compile, or the client cannot be built.
    pub fn update(&self, service: ServiceConfig) -> Result<()> {
        let pid = service.pid.clone();
        let client = self.factory.create(&self.plugin)?;
        let forwarder = Forwarder::start(
            service,
            self.plugin.clone(),
            client,
            Arc::clone(&self.feedback),
        )?;

        let previous = self.forwarders.write().insert(pid.clone(), Arc::new(forwarder));
        match previous {
            Some(old) => {
                info!(%pid, "updating existing forwarder");
                old.shutdown();
            }
            None => info!(%pid, "creating new forwarder"),
        }
        Ok(())
    }

    /// Stops and removes the forwarder for `pid`.
    ///
    /// # Errors
    ///
    /// Returns `ForwarderError::ServiceNotFound` if no forwarder is
    /// registered under `pid`.
    pub fn remove(&self, pid: &str) -> Result<()> {
        let forwarder = self
            .forwarders
            .write()
            .remove(pid)
            .ok_or_else(|| ForwarderError::ServiceNotFound {
                pid: pid.to_string(),
            })?;
        forwarder.shutdown();
        info!(pid, "removed forwarder");
        Ok(())
    }

    /// Returns the forwarder for `pid`.
    #[must_use]
    pub fn get(&self, pid: &str) -> Option<Arc<Forwarder>> {
        self.forwarders.read().get(pid).cloned()
    }

    /// Returns the registered pids in sorted order.
    #[must_use]
    pub fn pids(&self) -> Vec<String> {
        let mut pids: Vec<String> = self.forwarders.read().keys().cloned().collect();
        pids.sort();
        pids
    }

    /// Returns the number of registered forwarders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.forwarders.read().len()
    }

    /// Returns true if no forwarder is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forwarders.read().is_empty()
    }

    /// Returns the number of held-back triggers across all forwarders.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.forwarders.read().values().map(|f| f.pending_count()).sum()
    }

    /// Returns the number of unfinished sends across all forwarders.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.forwarders.read().values().map(|f| f.in_flight_count()).sum()
    }

    /// Returns true if no forwarder has pending or in-flight work.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.forwarders.read().values().all(|f| f.is_idle())
    }

    /// Stops and removes every forwarder.
    pub fn shutdown_all(&self) {
        let forwarders: Vec<_> = self.forwarders.write().drain().collect();
        for (pid, forwarder) in forwarders {
            debug!(%pid, "shutting down forwarder");
            forwarder.shutdown();
        }
    }

    fn snapshot(&self) -> Vec<Arc<Forwarder>> {
        self.forwarders.read().values().cloned().collect()
    }
}

impl fmt::Debug for ServiceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceManager")
            .field("plugin", &self.plugin)
            .field("pids", &self.pids())
            .finish_non_exhaustive()
    }
}

impl Drop for ServiceManager {
    fn drop(&mut self) {
        self.shutdown_all();
    }
}

impl AlarmLifecycleListener for ServiceManager {
    fn on_new_or_updated_alarm(&self, alarm: &Alarm) {
        for forwarder in self.snapshot() {
            if let Err(e) = forwarder.on_alarm_updated(alarm) {
                warn!(
                    pid = %forwarder.pid(),
                    alarm_id = alarm.id,
                    error = %e,
                    "failed to handle alarm"
                );
            }
        }
    }

    fn on_deleted_alarm(&self, alarm_id: i64, reduction_key: &str) {
        for forwarder in self.snapshot() {
            if let Err(e) = forwarder.on_alarm_deleted(alarm_id, reduction_key) {
                warn!(pid = %forwarder.pid(), alarm_id, error = %e, "failed to handle deleted alarm");
            }
        }
    }
}
