use std::sync::Arc;

use marketpipe_core::{
    overview, FetchResult, HistoryQuery, InstrumentCatalog, MarketDataConfig, MarketDataService,
    RetryConfig, ViewDetail,
};

use crate::cli::BatchArgs;
use crate::error::CliError;

use super::{CommandResult, Table};

pub async fn run(
    args: &BatchArgs,
    catalog: InstrumentCatalog,
    config: MarketDataConfig,
    retries: u32,
) -> Result<CommandResult, CliError> {
    let history = history_query(args, config.history)?;
    let catalog = Arc::new(catalog);
    let service = MarketDataService::from_config(Arc::clone(&catalog), config.with_history(history));

    let retry = if retries == 0 {
        RetryConfig::no_retry()
    } else {
        RetryConfig::exponential(retries)
    };
    let report = service.run_batch_with_retry(args.keys.as_slice(), &retry).await;

    let warnings = report
        .iter()
        .filter_map(|(key, result)| match result {
            FetchResult::Success { warnings, .. } if !warnings.is_empty() => {
                Some(format!("{key}: {}", warnings.join("; ")))
            }
            _ => None,
        })
        .collect();

    let rows = overview(&catalog, &report)
        .into_iter()
        .map(|view| {
            let (status, summary) = match &view.detail {
                ViewDetail::Quote {
                    last,
                    change,
                    change_pct,
                    as_of,
                    ..
                } => (
                    "ok",
                    format!(
                        "{last:.4} {change:+.4} ({change_pct:+.2}%) {}",
                        as_of.as_deref().unwrap_or("-")
                    ),
                ),
                ViewDetail::Flow {
                    net_volume,
                    net_value,
                    sign,
                } => (
                    "ok",
                    format!("net_volume={net_volume} net_value={net_value} ({sign})"),
                ),
                ViewDetail::Unavailable { message } => ("failed", message.clone()),
            };
            vec![
                view.key,
                view.display_name,
                String::from(status),
                summary,
            ]
        })
        .collect();

    let failures = report.failure_count();
    let data = serde_json::to_value(&report)?;
    Ok(CommandResult::ok(
        data,
        Table {
            headers: vec!["key", "name", "status", "detail"],
            rows,
        },
    )
    .with_warnings(warnings)
    .with_failures(failures))
}

fn history_query(args: &BatchArgs, defaults: HistoryQuery) -> Result<HistoryQuery, CliError> {
    let period = match &args.period {
        Some(raw) => raw.parse()?,
        None => defaults.period,
    };
    let resolution = match &args.resolution {
        Some(raw) => raw.parse()?,
        None => defaults.resolution,
    };
    Ok(HistoryQuery::new(
        period,
        resolution,
        args.points.unwrap_or(defaults.points),
    )?)
}
