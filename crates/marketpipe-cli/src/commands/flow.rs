use marketpipe_core::{normalize_aggregate_payload, MarketDataConfig, RestQuoteClient};
use serde_json::json;

use crate::cli::FlowArgs;
use crate::error::CliError;

use super::{CommandResult, Table};

pub async fn run(args: &FlowArgs, config: &MarketDataConfig) -> Result<CommandResult, CliError> {
    let client = RestQuoteClient::with_reqwest(config.rest_base_url.clone());
    let headers = vec!["label", "net_volume", "net_value", "sign"];

    let outcome = match client.fetch_aggregate(&args.path, config.rest_timeout_ms).await {
        Ok(raw) => normalize_aggregate_payload(&args.label, &raw),
        Err(error) => Err(error),
    };

    match outcome {
        Ok(flow) => {
            let row = vec![
                flow.label.clone(),
                flow.net_volume.to_string(),
                flow.net_value.to_string(),
                flow.sign.to_string(),
            ];
            let data = serde_json::to_value(&flow)?;
            Ok(CommandResult::ok(
                data,
                Table {
                    headers,
                    rows: vec![row],
                },
            ))
        }
        Err(error) => {
            let data = json!({
                "path": args.path,
                "kind": error.kind(),
                "code": error.code(),
                "message": error.message(),
                "retryable": error.retryable(),
            });
            let row = vec![args.label.clone(), String::from("-"), String::from("-"), error.to_string()];
            Ok(CommandResult::ok(
                data,
                Table {
                    headers,
                    rows: vec![row],
                },
            )
            .with_failures(1))
        }
    }
}
