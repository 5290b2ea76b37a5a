mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use std::process::ExitCode;

use crate::cli::Cli;
use crate::commands::CommandResult;
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    match run().await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, CliError> {
    let cli = Cli::parse();

    let result = commands::run(&cli).await?;
    output::render(&result, cli.format, cli.pretty)?;

    completion_code(&result, cli.strict).map(ExitCode::from)
}

/// Exit code once output is written: 0 clean, 3 when any instrument failed.
/// Strict mode turns warnings or failures into a violation (exit 5).
fn completion_code(result: &CommandResult, strict: bool) -> Result<u8, CliError> {
    if strict && (!result.warnings.is_empty() || result.failures > 0) {
        return Err(CliError::StrictModeViolation {
            warning_count: result.warnings.len(),
            failure_count: result.failures,
        });
    }

    if result.failures > 0 {
        return Ok(3);
    }

    Ok(0)
}

// Logs go to stderr; stdout carries only command output.
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init()
}
