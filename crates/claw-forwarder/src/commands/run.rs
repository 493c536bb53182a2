//! Forwarding command implementation.
//!
//! Starts a [`ServiceManager`] from the configuration file, feeds it
//! lifecycle events read as JSON lines and writes every feedback event to
//! the output as a JSON line.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::config::ForwarderConfig;
use crate::feedback::{ChannelFeedbackSink, FeedbackEvent};
use crate::listener::process_lifecycle_stream;
use crate::manager::{ClientFactory, HttpClientFactory, ServiceManager};

/// How often `--drain` checks for outstanding work.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long to wait for feedback of in-flight sends after shutdown.
const FEEDBACK_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Handler for the `run` subcommand.
pub struct RunCommand<'a, F = HttpClientFactory> {
    config_path: &'a Path,
    factory: F,
}

impl<'a> RunCommand<'a> {
    /// Creates a handler that delivers over HTTP.
    #[must_use]
    pub const fn new(config_path: &'a Path) -> Self {
        Self {
            config_path,
            factory: HttpClientFactory,
        }
    }
}

impl<'a, F> RunCommand<'a, F>
where
    F: ClientFactory + 'static,
{
    /// Creates a handler that builds its delivery clients with `factory`.
    #[must_use]
    pub const fn with_factory(config_path: &'a Path, factory: F) -> Self {
        Self {
            config_path,
            factory,
        }
    }

    /// Forwards lifecycle events from `input` until end of input or Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded, a forwarder
    /// fails to start, or reading `input` fails.
    pub async fn execute<R, W>(self, input: R, output: W, args: &RunArgs) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let config = ForwarderConfig::from_file(self.config_path)?;
        let (sink, feedback) = ChannelFeedbackSink::new();
        let printer = tokio::spawn(print_feedback(feedback, output));

        let manager = ServiceManager::from_config(&config, self.factory, Arc::new(sink))?;
        info!(
            config = %self.config_path.display(),
            services = ?manager.pids(),
            "forwarding lifecycle events"
        );

        let interrupted = tokio::select! {
            stats = process_lifecycle_stream(input, &manager) => {
                let stats = stats?;
                info!(dispatched = stats.dispatched, malformed = stats.malformed, "end of input");
                false
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                true
            }
        };

        if args.drain && !interrupted {
            drain(&manager).await;
        }

        manager.shutdown_all();
        drop(manager);
        flush(printer).await;
        Ok(())
    }
}

async fn drain(manager: &ServiceManager) {
    info!(
        pending = manager.pending_count(),
        in_flight = manager.in_flight_count(),
        "draining"
    );
    loop {
        if manager.is_idle() {
            return;
        }
        tokio::select! {
            () = tokio::time::sleep(DRAIN_POLL_INTERVAL) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted while draining");
                return;
            }
        }
    }
}

async fn flush(printer: JoinHandle<std::io::Result<()>>) {
    match tokio::time::timeout(FEEDBACK_FLUSH_TIMEOUT, printer).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => warn!(error = %e, "failed to write feedback"),
        Ok(Err(e)) => warn!(error = %e, "feedback writer failed"),
        Err(_) => warn!("timed out waiting for in-flight sends"),
    }
}

async fn print_feedback<W>(
    mut feedback: mpsc::UnboundedReceiver<FeedbackEvent>,
    mut output: W,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(event) = feedback.recv().await {
        let mut line = serde_json::to_vec(&event).map_err(std::io::Error::other)?;
        line.push(b'\n');
        output.write_all(&line).await?;
        output.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use claw_incident::{IncidentClient, IncidentEvent, SendFuture};
    use parking_lot::Mutex;
    use tempfile::NamedTempFile;

    use super::*;
    use crate::config::PluginConfig;

    #[derive(Debug, Default)]
    struct Recorder {
        sent: Mutex<Vec<String>>,
    }

    impl IncidentClient for Recorder {
        fn send_event<'a>(&'a self, event: &'a IncidentEvent) -> SendFuture<'a> {
            Box::pin(async move {
                self.sent
                    .lock()
                    .push(format!("{}:{}", event.event_action, event.dedup_key));
                Ok(())
            })
        }
    }

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("failed to write temp file");
        file
    }

    const CONFIG: &str = r#"
[[services]]
pid = "ops"
routing_key = "R0UT1NG"
filter = "alarm.severityLevel >= 6"
hold_down_delay_secs = 0
"#;

    #[tokio::test]
    async fn forwards_and_reports_feedback() {
        let file = create_temp_config(CONFIG);
        let recorder = Arc::new(Recorder::default());
        let factory = {
            let recorder = Arc::clone(&recorder);
            move |_: &PluginConfig| -> claw_incident::Result<Arc<dyn IncidentClient>> {
                Ok(Arc::clone(&recorder) as Arc<dyn IncidentClient>)
            }
        };

        let input = concat!(
            r#"{"type":"alarm","alarm":{"id":1,"reductionKey":"k1","severity":"MAJOR"}}"#,
            "\n",
            r#"{"type":"alarm","alarm":{"id":2,"reductionKey":"k2","severity":"MINOR"}}"#,
            "\n",
            r#"{"type":"deleted","id":2,"reductionKey":"k2"}"#,
            "\n",
        );
        let (writer, mut reader) = tokio::io::duplex(64 * 1024);
        let args = RunArgs {
            config: file.path().to_path_buf(),
            drain: true,
        };

        RunCommand::with_factory(file.path(), factory)
            .execute(input.as_bytes(), writer, &args)
            .await
            .unwrap();

        assert_eq!(*recorder.sent.lock(), vec!["trigger:k1".to_string()]);

        let mut printed = String::new();
        tokio::io::AsyncReadExt::read_to_string(&mut reader, &mut printed)
            .await
            .unwrap();
        let events: Vec<FeedbackEvent> = printed
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].parameter("reductionKey"), Some("k1"));
        assert!(!events[0].is_failure());
    }

    #[tokio::test]
    async fn missing_config_fails() {
        let args = RunArgs {
            config: "/nonexistent/fwd.toml".into(),
            drain: false,
        };
        let result = RunCommand::new(&args.config)
            .execute(&b""[..], tokio::io::sink(), &args)
            .await;
        assert!(result.is_err());
    }
}
