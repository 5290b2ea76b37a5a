//! Read-only views over a [`BatchReport`] for dashboards and the CLI.

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::{AssetClass, BatchReport, Candle, FetchResult, InstrumentCatalog, MarketPayload, Sign};

/// One row of the market overview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentView {
    pub key: String,
    pub display_name: String,
    /// `None` for keys the catalog does not know.
    pub asset_class: Option<AssetClass>,
    pub detail: ViewDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewDetail {
    Quote {
        last: f64,
        change: f64,
        change_pct: f64,
        sign: Sign,
        /// RFC 3339, UTC. `None` when the timestamp is out of range.
        as_of: Option<String>,
    },
    Flow {
        net_volume: f64,
        net_value: f64,
        sign: Sign,
    },
    Unavailable {
        message: String,
    },
}

impl ViewDetail {
    /// Change is measured against the previous close, or against the open
    /// when the series holds a single candle.
    pub fn from_candles(candles: &[Candle]) -> Self {
        let Some(last) = candles.last() else {
            return Self::Unavailable {
                message: String::from("no candles"),
            };
        };

        let reference = candles
            .len()
            .checked_sub(2)
            .map_or(last.open, |index| candles[index].close);
        let change = last.close - reference;
        let change_pct = if reference == 0.0 {
            0.0
        } else {
            change / reference * 100.0
        };

        Self::Quote {
            last: last.close,
            change,
            change_pct,
            sign: Sign::of(change),
            as_of: format_millis(last.timestamp),
        }
    }
}

/// Builds one view per reported instrument, in report order.
///
/// Keys missing from the catalog (unknown instruments) fall back to the key
/// as display name.
pub fn overview(catalog: &InstrumentCatalog, report: &BatchReport) -> Vec<InstrumentView> {
    report
        .iter()
        .map(|(key, result)| {
            let (display_name, asset_class) = match catalog.resolve(key) {
                Ok(instrument) => (instrument.display_name.clone(), Some(instrument.asset_class)),
                Err(_) => (key.clone(), None),
            };

            let detail = match result {
                FetchResult::Success {
                    payload: MarketPayload::Candles(candles),
                    ..
                } => ViewDetail::from_candles(candles),
                FetchResult::Success {
                    payload: MarketPayload::Flow(flow),
                    ..
                } => ViewDetail::Flow {
                    net_volume: flow.net_volume,
                    net_value: flow.net_value,
                    sign: flow.sign,
                },
                FetchResult::Failure { message, kind, .. } => ViewDetail::Unavailable {
                    message: format!("{message} ({kind})"),
                },
            };

            InstrumentView {
                key: key.clone(),
                display_name,
                asset_class,
                detail,
            }
        })
        .collect()
}

fn format_millis(timestamp_ms: i64) -> Option<String> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(timestamp_ms) * 1_000_000)
        .ok()?
        .format(&Rfc3339)
        .ok()
}
