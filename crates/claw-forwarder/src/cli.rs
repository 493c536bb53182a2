//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::ack::DEFAULT_ACK_USER;

/// Forwards alarms to an incident service.
#[derive(Parser, Debug, Clone)]
#[command(name = "claw-forwarder")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table, global = true)]
    pub format: Format,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// Human-readable text.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Forward lifecycle events read from stdin as JSON lines.
    Run(RunArgs),

    /// Evaluate a filter expression against alarms from a file.
    Eval(EvalArgs),

    /// Load and validate a configuration file.
    CheckConfig {
        /// Path to the configuration file.
        #[arg(short, long, env = "CLAW_FORWARDER_CONFIG")]
        config: PathBuf,
    },

    /// Acknowledge alarms from an incident webhook body.
    Ack(AckArgs),
}

/// Arguments for the `run` command.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Path to the configuration file.
    #[arg(short, long, env = "CLAW_FORWARDER_CONFIG")]
    pub config: PathBuf,

    /// After end of input, wait for held-back triggers and sends to finish.
    #[arg(long)]
    pub drain: bool,
}

/// Arguments for the `eval` command.
#[derive(Args, Debug, Clone)]
pub struct EvalArgs {
    /// Filter expression to evaluate.
    pub expression: String,

    /// JSON file holding an array of alarms.
    #[arg(long)]
    pub alarms: PathBuf,

    /// Print the incident payload for matching alarms.
    #[arg(short = 'p', long)]
    pub to_payload: bool,

    /// Only report the number of matching alarms.
    #[arg(short, long)]
    pub count: bool,

    /// Evaluate against the alarm with this id only.
    #[arg(short, long)]
    pub alarm_id: Option<i64>,

    /// Configuration file whose plugin settings shape the payload.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Arguments for the `ack` command.
#[derive(Args, Debug, Clone)]
pub struct AckArgs {
    /// JSON file holding an array of alarms.
    #[arg(long)]
    pub alarms: PathBuf,

    /// Webhook body to read instead of stdin.
    #[arg(long)]
    pub payload: Option<PathBuf>,

    /// User recorded on the acknowledgements.
    #[arg(short, long, default_value = DEFAULT_ACK_USER)]
    pub user: String,
}
