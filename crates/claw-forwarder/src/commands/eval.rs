//! Filter evaluation command implementation.
//!
//! Evaluates a filter expression against a set of alarms and reports which
//! of them a forwarder would accept.

use std::io::Write;

use claw_filter::{Expression, Predicate};
use claw_incident::EventPayload;
use serde::Serialize;
use tracing::warn;

use crate::alarm::Alarm;
use crate::cli::EvalArgs;
use crate::commands::load_alarms;
use crate::config::{ForwarderConfig, PluginConfig};
use crate::mapping::build_payload;
use crate::output::{OutputFormat, TableDisplay};

/// Handler for the `eval` subcommand.
#[derive(Debug, Default)]
pub struct EvalCommand;

impl EvalCommand {
    /// Creates a new eval command handler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Executes the eval subcommand.
    ///
    /// # Errors
    ///
    /// Returns an error if the expression does not compile or the alarms or
    /// configuration cannot be loaded.
    pub fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        args: &EvalArgs,
    ) -> anyhow::Result<()> {
        let expression = Expression::compile(&args.expression)?;
        let plugin = match &args.config {
            Some(path) => ForwarderConfig::from_file(path)?.plugin,
            None => PluginConfig::default(),
        };
        let alarms = load_alarms(&args.alarms)?;

        let report = evaluate(&expression, &alarms, &plugin, args);
        format.write(out, &report)
    }
}

/// Tests an alarm against a filter, treating evaluation errors as no match.
fn matches(expression: &Expression, alarm: &Alarm) -> bool {
    expression.test(alarm).unwrap_or_else(|e| {
        warn!(alarm_id = alarm.id, error = %e, "filter evaluation failed");
        false
    })
}

/// Builds the report for `args` over `alarms`.
#[must_use]
pub fn evaluate(
    expression: &Expression,
    alarms: &[Alarm],
    plugin: &PluginConfig,
    args: &EvalArgs,
) -> EvalReport {
    let to_payload = if args.to_payload && args.count {
        warn!("options --to-payload and --count are mutually exclusive, ignoring --to-payload");
        false
    } else {
        args.to_payload
    };

    let mut report = EvalReport {
        expression: expression.source().to_string(),
        total: alarms.len(),
        matched_count: 0,
        count_only: args.count,
        matches: Vec::new(),
        lookup: args.alarm_id.map(|id| AlarmLookup {
            id,
            reduction_key: None,
            matched: false,
        }),
    };

    for alarm in alarms {
        let matched = matches(expression, alarm);

        if let Some(lookup) = report.lookup.as_mut().filter(|l| l.id == alarm.id) {
            lookup.reduction_key = Some(alarm.reduction_key.clone());
            lookup.matched = matched;
        }
        if !matched {
            continue;
        }

        report.matched_count += 1;
        let selected = args.alarm_id.is_none_or(|id| id == alarm.id);
        if !args.count && selected {
            report.matches.push(AlarmMatch {
                id: alarm.id,
                reduction_key: alarm.reduction_key.clone(),
                payload: to_payload.then(|| build_payload(alarm, plugin)),
            });
        }
    }

    report
}

/// Result of evaluating an expression against a set of alarms.
#[derive(Debug, Clone, Serialize)]
pub struct EvalReport {
    /// The evaluated expression.
    pub expression: String,
    /// Number of alarms evaluated.
    pub total: usize,
    /// Number of alarms that matched.
    pub matched_count: usize,
    /// Whether only the count was requested.
    #[serde(skip)]
    pub count_only: bool,
    /// Matching alarms, empty when only the count was requested.
    pub matches: Vec<AlarmMatch>,
    /// The alarm requested with `--alarm-id`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookup: Option<AlarmLookup>,
}

/// A matching alarm.
#[derive(Debug, Clone, Serialize)]
pub struct AlarmMatch {
    /// Alarm id.
    pub id: i64,
    /// Alarm reduction key.
    pub reduction_key: String,
    /// Incident payload the alarm would produce.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<EventPayload>,
}

/// Outcome for the alarm requested by id.
#[derive(Debug, Clone, Serialize)]
pub struct AlarmLookup {
    /// Requested id.
    pub id: i64,
    /// Reduction key, `None` if no alarm has the id.
    pub reduction_key: Option<String>,
    /// Whether the expression matched the alarm.
    pub matched: bool,
}

impl TableDisplay for EvalReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        if let Some(lookup) = &self.lookup {
            if let Some(reduction_key) = &lookup.reduction_key {
                writeln!(
                    writer,
                    "Alarm with ID '{}' has reduction key: '{reduction_key}'",
                    lookup.id
                )?;
                writeln!(writer, "Expression evaluates: {}", lookup.matched)?;
            }
        }

        for m in &self.matches {
            if self.lookup.is_none() {
                writeln!(writer, "MATCHED: id={} reductionKey={}", m.id, m.reduction_key)?;
            }
            if let Some(payload) = &m.payload {
                let json = serde_json::to_string_pretty(payload).map_err(std::io::Error::other)?;
                writeln!(writer, "Incident payload:\n{json}")?;
                writeln!(writer)?;
            }
        }

        writeln!(writer)?;
        if self.total == 0 {
            writeln!(writer, "No alarms present.")?;
        } else if self.matched_count == 0 {
            writeln!(writer, "No alarms matched (out of {} alarms.)", self.total)?;
        } else if let Some(lookup) = self.lookup.as_ref().filter(|l| l.reduction_key.is_none()) {
            writeln!(writer, "No alarm with ID '{}' was found!", lookup.id)?;
        } else {
            writeln!(
                writer,
                "Expression matched {} alarms (out of {} alarms.)",
                self.matched_count, self.total
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use test_case::test_case;

    use super::*;
    use crate::alarm::{Node, Severity};
    use crate::cli::Format;

    fn args() -> EvalArgs {
        EvalArgs {
            expression: String::new(),
            alarms: PathBuf::from("unused.json"),
            to_payload: false,
            count: false,
            alarm_id: None,
            config: None,
        }
    }

    fn alarms() -> Vec<Alarm> {
        vec![
            Alarm::new(1, "nodeDown::1")
                .with_severity(Severity::Critical)
                .with_log_message("Node down")
                .with_node(Node::new("router-1")),
            Alarm::new(2, "nodeDown::2").with_severity(Severity::Minor),
            Alarm::new(3, "nodeDown::3").with_severity(Severity::Major),
        ]
    }

    fn render(report: &EvalReport) -> String {
        let mut out = Vec::new();
        OutputFormat::new(Format::Table).write(&mut out, report).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn run(expression: &str, args: &EvalArgs, alarms: &[Alarm]) -> EvalReport {
        let expression = Expression::compile(expression).unwrap();
        evaluate(&expression, alarms, &PluginConfig::default(), args)
    }

    #[test_case("alarm.severityLevel >= 6", 2; "major and above")]
    #[test_case("alarm.severity == 'MINOR'", 1; "exact severity")]
    #[test_case("alarm.severityLevel > 7", 0; "nothing")]
    #[test_case("alarm.node.label == 'router-1'", 1; "by node label")]
    fn counts_matches(expression: &str, expected: usize) {
        let report = run(expression, &args(), &alarms());
        assert_eq!(report.total, 3);
        assert_eq!(report.matched_count, expected);
        assert_eq!(report.matches.len(), expected);
    }

    #[test]
    fn summary_lines() {
        let report = run("alarm.severityLevel >= 6", &args(), &alarms());
        let text = render(&report);
        assert!(text.contains("MATCHED: id=1 reductionKey=nodeDown::1"));
        assert!(text.contains("Expression matched 2 alarms (out of 3 alarms.)"));

        let report = run("alarm.severityLevel > 7", &args(), &alarms());
        assert!(render(&report).contains("No alarms matched (out of 3 alarms.)"));

        let report = run("true", &args(), &[]);
        assert!(render(&report).contains("No alarms present."));
    }

    #[test]
    fn evaluation_errors_do_not_match() {
        let report = run("alarm.nope == 1", &args(), &alarms());
        assert_eq!(report.matched_count, 0);
    }

    #[test]
    fn count_only_omits_matches_and_payloads() {
        let args = EvalArgs {
            count: true,
            to_payload: true,
            ..args()
        };
        let report = run("true", &args, &alarms());
        assert_eq!(report.matched_count, 3);
        assert!(report.matches.is_empty());
        assert!(!render(&report).contains("MATCHED"));
    }

    #[test]
    fn payloads_for_matches() {
        let args = EvalArgs {
            to_payload: true,
            ..args()
        };
        let report = run("alarm.id == 1", &args, &alarms());
        let payload = report.matches[0].payload.as_ref().unwrap();
        assert_eq!(payload.summary, "Node down");
        assert_eq!(payload.source, "router-1");
        assert!(render(&report).contains("Incident payload:"));
    }

    #[test]
    fn lookup_by_id() {
        let args = EvalArgs {
            alarm_id: Some(3),
            ..args()
        };
        let report = run("alarm.severityLevel >= 6", &args, &alarms());
        let text = render(&report);
        assert!(text.contains("Alarm with ID '3' has reduction key: 'nodeDown::3'"));
        assert!(text.contains("Expression evaluates: true"));
        assert!(!text.contains("MATCHED"));
    }

    #[test]
    fn lookup_of_missing_id() {
        let args = EvalArgs {
            alarm_id: Some(99),
            ..args()
        };
        let report = run("true", &args, &alarms());
        assert!(render(&report).contains("No alarm with ID '99' was found!"));
    }
}
