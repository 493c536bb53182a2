//! claw-forwarder binary entrypoint.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use claw_forwarder::cli::{Cli, Commands};
use claw_forwarder::commands::{AckCommand, CheckCommand, EvalCommand, RunCommand};
use claw_forwarder::output::OutputFormat;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(cli));
    // A blocked stdin read must not hold up exit.
    runtime.shutdown_background();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let format = OutputFormat::new(cli.format);

    match cli.command {
        Commands::Run(args) => {
            let input = BufReader::new(tokio::io::stdin());
            RunCommand::new(&args.config)
                .execute(input, tokio::io::stdout(), &args)
                .await?;
        }
        Commands::Eval(args) => {
            EvalCommand::new().execute(&mut io::stdout().lock(), &format, &args)?;
        }
        Commands::CheckConfig { config } => {
            CheckCommand::new(&config).execute(&mut io::stdout().lock(), &format)?;
        }
        Commands::Ack(args) => {
            AckCommand::new().execute(&mut io::stdout().lock(), io::stdin().lock(), &args)?;
        }
    }

    Ok(())
}
