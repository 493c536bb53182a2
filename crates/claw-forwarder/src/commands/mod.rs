//! CLI command implementations.
//!
//! Each submodule implements one subcommand:
//! - [`run`] - Forward lifecycle events from stdin
//! - [`eval`] - Try a filter expression against stored alarms
//! - [`check`] - Validate a configuration file
//! - [`ack`] - Acknowledge alarms from a webhook body

pub mod ack;
pub mod check;
pub mod eval;
pub mod run;

use std::path::Path;

use anyhow::Context;

use crate::alarm::Alarm;

pub use ack::AckCommand;
pub use check::CheckCommand;
pub use eval::EvalCommand;
pub use run::RunCommand;

/// Reads a JSON array of alarms from a file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a JSON array of
/// alarms.
pub fn load_alarms(path: &Path) -> anyhow::Result<Vec<Alarm>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read alarms from '{}'", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse alarms in '{}'", path.display()))
}
