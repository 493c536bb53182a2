//! Webhook acknowledgement command implementation.
//!
//! Reads an inbound webhook body and prints one acknowledge event per
//! matched alarm as a JSON line.

use std::io::{Read, Write};

use anyhow::Context;
use claw_incident::WebhookPayload;
use tracing::info;

use crate::ack::acknowledgements;
use crate::alarm::Alarm;
use crate::cli::AckArgs;
use crate::commands::load_alarms;

/// Handler for the `ack` subcommand.
#[derive(Debug, Default)]
pub struct AckCommand;

impl AckCommand {
    /// Creates a new ack command handler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Executes the ack subcommand, reading the webhook body from `input`
    /// unless `args.payload` names a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the alarms or the webhook body cannot be read or
    /// parsed.
    pub fn execute<W: Write, R: Read>(
        &self,
        out: &mut W,
        input: R,
        args: &AckArgs,
    ) -> anyhow::Result<usize> {
        let alarms = load_alarms(&args.alarms)?;
        let body = match &args.payload {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("failed to read webhook body from '{}'", path.display()))?,
            None => read_all(input)?,
        };
        self.respond(out, &body, &alarms, &args.user)
    }

    /// Writes the acknowledge events for a webhook body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not a webhook payload or writing fails.
    pub fn respond<W: Write>(
        &self,
        out: &mut W,
        body: &str,
        alarms: &[Alarm],
        user: &str,
    ) -> anyhow::Result<usize> {
        let payload = WebhookPayload::parse(body).context("failed to parse webhook payload")?;
        let events = acknowledgements(&payload, alarms, user);
        for event in &events {
            serde_json::to_writer(&mut *out, event)?;
            writeln!(out)?;
        }
        info!(count = events.len(), "sent ack events");
        Ok(events.len())
    }
}

fn read_all<R: Read>(mut input: R) -> anyhow::Result<String> {
    let mut body = String::new();
    input
        .read_to_string(&mut body)
        .context("failed to read webhook body")?;
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::FeedbackEvent;

    const BODY: &str = r#"{"messages":[{"event":"incident.acknowledge","incident":{"alerts":[{"alert_key":"k1"},{"alert_key":"k9"}]}}]}"#;

    #[test]
    fn writes_one_line_per_matched_alarm() {
        let alarms = vec![Alarm::new(1, "k1"), Alarm::new(2, "k2")];
        let mut out = Vec::new();

        let count = AckCommand::new()
            .respond(&mut out, BODY, &alarms, "bob")
            .unwrap();
        assert_eq!(count, 1);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 1);
        let event: FeedbackEvent = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(event.parameter("refId"), Some("1"));
        assert_eq!(event.parameter("ackUser"), Some("bob"));
    }

    #[test]
    fn rejects_malformed_body() {
        let mut out = Vec::new();
        let err = AckCommand::new()
            .respond(&mut out, "{not json", &[], "bob")
            .unwrap_err();
        assert!(err.to_string().contains("failed to parse webhook payload"));
    }
}
