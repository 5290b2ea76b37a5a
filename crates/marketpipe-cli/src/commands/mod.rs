mod batch;
mod flow;
mod instruments;

use marketpipe_core::{InstrumentCatalog, MarketDataConfig};
use serde_json::Value;
use tracing::debug;

use crate::cli::{Cli, Command};
use crate::error::CliError;

/// Rows for `--format table`, alongside the JSON document.
#[derive(Debug, Default)]
pub struct Table {
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<String>>,
}

pub struct CommandResult {
    pub data: Value,
    pub table: Table,
    pub warnings: Vec<String>,
    /// Instruments that ended in a failure.
    pub failures: usize,
}

impl CommandResult {
    pub fn ok(data: Value, table: Table) -> Self {
        Self {
            data,
            table,
            warnings: Vec::new(),
            failures: 0,
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn with_failures(mut self, failures: usize) -> Self {
        self.failures = failures;
        self
    }
}

pub async fn run(cli: &Cli) -> Result<CommandResult, CliError> {
    let catalog = load_catalog(cli)?;
    let config = load_config(cli)?;

    match &cli.command {
        Command::Batch(args) => batch::run(args, catalog, config, cli.retries).await,
        Command::Instruments(args) => instruments::run(args, &catalog),
        Command::Flow(args) => flow::run(args, &config).await,
    }
}

fn load_catalog(cli: &Cli) -> Result<InstrumentCatalog, CliError> {
    match &cli.catalog {
        Some(path) => {
            debug!(path = %path.display(), "loading instrument catalog");
            Ok(InstrumentCatalog::from_json_file(path)?)
        }
        None => Ok(InstrumentCatalog::builtin()),
    }
}

fn load_config(cli: &Cli) -> Result<MarketDataConfig, CliError> {
    let config = MarketDataConfig::from_env()?;
    Ok(match cli.timeout_ms {
        Some(timeout_ms) => config
            .with_scrape_timeout_ms(timeout_ms)
            .with_rest_timeout_ms(timeout_ms),
        None => config,
    })
}
