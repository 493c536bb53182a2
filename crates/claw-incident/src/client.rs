//! Delivery of incident events.
//!
//! This module provides the [`IncidentClient`] trait the forwarding engine
//! sends through, and [`HttpIncidentClient`], which posts events to the
//! Events API v2 over HTTPS.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};

use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use tracing::{debug, info};

use crate::error::{ClientError, Result};
use crate::event::IncidentEvent;

/// Default Events API v2 endpoint.
pub const DEFAULT_EVENTS_URL: &str = "https://events.pagerduty.com/v2/enqueue";

const CLIENT_USER_AGENT: &str = concat!("claw-incident/", env!("CARGO_PKG_VERSION"));

/// Future returned by [`IncidentClient::send_event`].
pub type SendFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Trait for incident delivery backends.
///
/// Implementations must not block the caller: all I/O happens inside the
/// returned future.
pub trait IncidentClient: Send + Sync + fmt::Debug {
    /// Sends a single event.
    ///
    /// # Errors
    ///
    /// Returns an error if the event could not be delivered.
    fn send_event<'a>(&'a self, event: &'a IncidentEvent) -> SendFuture<'a>;

    /// Releases resources held by the client.
    fn close(&self) {}
}

/// Posts incident events as JSON to an HTTP endpoint.
#[derive(Debug)]
pub struct HttpIncidentClient {
    client: reqwest::Client,
    endpoint: reqwest::Url,
    closed: AtomicBool,
}

impl HttpIncidentClient {
    /// Creates a client for the default Events API v2 endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new() -> Result<Self> {
        Self::with_endpoint(DEFAULT_EVENTS_URL)
    }

    /// Creates a client for a custom endpoint.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidEndpoint` if the URL cannot be parsed.
    pub fn with_endpoint(endpoint: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(CLIENT_USER_AGENT)
            .build()?;
        Self::from_reqwest(endpoint, client)
    }

    /// Creates a client on top of an existing `reqwest` client.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidEndpoint` if the URL cannot be parsed.
    pub fn from_reqwest(endpoint: &str, client: reqwest::Client) -> Result<Self> {
        let endpoint = reqwest::Url::parse(endpoint).map_err(|e| ClientError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ClientError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: format!("unsupported scheme '{}'", endpoint.scheme()),
            });
        }

        Ok(Self {
            client,
            endpoint,
            closed: AtomicBool::new(false),
        })
    }

    /// Returns the endpoint events are posted to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    /// Returns true once [`IncidentClient::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    async fn post(&self, event: &IncidentEvent) -> Result<()> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }

        let body = event.to_json()?;
        debug!(
            dedup_key = %event.dedup_key,
            action = %event.event_action,
            url = %self.endpoint,
            "posting incident event"
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(text) if !text.is_empty() => text,
                _ => "(empty)".to_string(),
            };
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

impl IncidentClient for HttpIncidentClient {
    fn send_event<'a>(&'a self, event: &'a IncidentEvent) -> SendFuture<'a> {
        Box::pin(self.post(event))
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!(url = %self.endpoint, "closed incident client");
        }
    }
}
