//! CLI argument definitions for marketpipe.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `batch` | Fetch and normalize a set of instruments in one batch |
//! | `instruments` | List the instrument catalog |
//! | `flow` | Fetch one REST aggregate endpoint as a flow delta |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--format` | `json` | Output format (json, table) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--strict` | `false` | Treat warnings and failures as errors |
//! | `--timeout-ms` | env / config | Timeout for every upstream call |
//! | `--catalog` | builtin | JSON catalog file |
//! | `--retries` | `0` | Extra batch rounds for retryable failures |
//!
//! # Examples
//!
//! ```bash
//! marketpipe batch currencies/usd-vnd indices/vn flows/foreign-trade --pretty
//! marketpipe batch indices/vn --period P1Y --resolution P1W --points 52
//! marketpipe instruments --format table
//! marketpipe flow /api/v1/market/foreign-trade --label HOSE
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Market data acquisition and normalization CLI.
#[derive(Debug, Parser)]
#[command(
    name = "marketpipe",
    author,
    version,
    about = "Market data acquisition and normalization CLI",
    long_about = "marketpipe fetches price history from a scraped chart site and foreign \
investor trade flow from a REST endpoint, normalizes both into canonical records, \
and reports one result per requested instrument.\n\
\n\
Use 'marketpipe <command> --help' for command-specific help."
)]
pub struct Cli {
    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Treat warnings and failed instruments as errors (exit code 5).
    #[arg(long, global = true, default_value_t = false)]
    pub strict: bool,

    /// Timeout in milliseconds for every upstream call.
    ///
    /// Overrides MARKETPIPE_SCRAPE_TIMEOUT_MS and MARKETPIPE_REST_TIMEOUT_MS.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Instrument catalog file (JSON array). Defaults to the builtin catalog.
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Extra batch rounds for instruments that failed with a retryable error.
    #[arg(long, global = true, default_value_t = 0)]
    pub retries: u32,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format for terminal display.
    Table,
    /// Single JSON object output.
    Json,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch one or more instruments in a single batch.
    ///
    /// Every requested key yields exactly one result. Unknown keys fail
    /// without touching any upstream.
    ///
    /// # Examples
    ///
    ///   marketpipe batch currencies/usd-vnd
    ///   marketpipe batch indices/vn flows/foreign-trade --format table
    Batch(BatchArgs),

    /// List the instrument catalog.
    Instruments(InstrumentsArgs),

    /// Fetch a REST aggregate endpoint and normalize it as a flow delta.
    ///
    /// # Examples
    ///
    ///   marketpipe flow /api/v1/market/foreign-trade
    Flow(FlowArgs),
}

/// Arguments for the `batch` command.
#[derive(Debug, Args)]
pub struct BatchArgs {
    /// Logical instrument keys (e.g., currencies/usd-vnd, indices/vn).
    #[arg(required = true, num_args = 1..)]
    pub keys: Vec<String>,

    /// History period (P1D, P1W, P1M, P3M, P6M, P1Y, P5Y, MAX).
    #[arg(long)]
    pub period: Option<String>,

    /// History resolution (PT1M, PT5M, PT15M, PT30M, PT1H, PT5H, P1D, P1W, P1M).
    #[arg(long)]
    pub resolution: Option<String>,

    /// Number of history points to request.
    #[arg(long)]
    pub points: Option<u16>,
}

/// Arguments for the `instruments` command.
#[derive(Debug, Args)]
pub struct InstrumentsArgs {
    /// Only list instruments served by this source (scrape, rest).
    #[arg(long)]
    pub source: Option<SourceFilter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceFilter {
    Scrape,
    Rest,
}

/// Arguments for the `flow` command.
#[derive(Debug, Args)]
pub struct FlowArgs {
    /// Endpoint path relative to the REST base URL.
    pub path: String,

    /// Label for the resulting flow delta when the payload has none.
    #[arg(long, default_value = "flow")]
    pub label: String,
}
