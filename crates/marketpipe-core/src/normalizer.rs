//! Conversion of raw upstream payloads into canonical records.
//!
//! Everything here is pure: no I/O and no shared state, so it can be
//! exercised against fixed payload fixtures.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Candle, FetchError, FlowDelta, RawSeriesPoint};

/// Keys read from the foreign-trade aggregate, in `FlowDelta` order.
pub const FLOW_FIELDS: [&str; 4] = ["buyVolume", "sellVolume", "buyValue", "sellValue"];

/// Raw payload from either upstream, tagged by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    Series(Vec<RawSeriesPoint>),
    Aggregate(Value),
}

/// Canonical payload handed to consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum MarketPayload {
    Candles(Vec<Candle>),
    Flow(FlowDelta),
}

/// Candles plus counts of what was discarded on the way.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedSeries {
    pub candles: Vec<Candle>,
    /// Points missing timestamp/open/high/low/close.
    pub dropped_incomplete: usize,
    /// Points failing candle validation.
    pub rejected_invalid: usize,
}

impl NormalizedSeries {
    pub fn is_partial(&self) -> bool {
        self.dropped_incomplete > 0 || self.rejected_invalid > 0
    }
}

/// Output of [`normalize`]: the payload and any partial-data warnings.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub payload: MarketPayload,
    pub warnings: Vec<String>,
}

/// Validates, sorts ascending and de-duplicates a scraped series.
///
/// On duplicate timestamps the later valid point wins.
pub fn normalize_scrape_series(instrument_key: &str, points: &[RawSeriesPoint]) -> NormalizedSeries {
    let mut by_timestamp = BTreeMap::new();
    let mut dropped_incomplete = 0;
    let mut rejected_invalid = 0;

    for point in points {
        let (Some(timestamp), Some(open), Some(high), Some(low), Some(close)) =
            (point.timestamp, point.open, point.high, point.low, point.close)
        else {
            dropped_incomplete += 1;
            continue;
        };

        let volume = point.value.unwrap_or(0.0);
        match Candle::new(instrument_key, timestamp, open, high, low, close, volume) {
            Ok(candle) => {
                by_timestamp.insert(timestamp, candle);
            }
            Err(_) => rejected_invalid += 1,
        }
    }

    NormalizedSeries {
        candles: by_timestamp.into_values().collect(),
        dropped_incomplete,
        rejected_invalid,
    }
}

/// Extracts a [`FlowDelta`] from the REST aggregate.
///
/// Accepts an object, an object wrapped as `{"data": {...}}`, or a non-empty
/// array of objects whose fields are summed. Every field in [`FLOW_FIELDS`]
/// must be a JSON number; strings are never coerced. A string `label` on
/// a single object overrides `label`.
pub fn normalize_aggregate_payload(label: &str, raw: &Value) -> Result<FlowDelta, FetchError> {
    match unwrap_data_envelope(raw) {
        Value::Object(fields) => {
            let [buy_volume, sell_volume, buy_value, sell_value] = read_flow_fields(fields, None)?;
            let label = fields.get("label").and_then(Value::as_str).unwrap_or(label);
            Ok(FlowDelta::new(
                label,
                buy_volume,
                sell_volume,
                buy_value,
                sell_value,
            ))
        }
        Value::Array(items) => {
            if items.is_empty() {
                return Err(FetchError::schema_mismatch(
                    "aggregate payload is an empty array",
                ));
            }

            let mut totals = [0.0_f64; 4];
            for (index, item) in items.iter().enumerate() {
                let Value::Object(fields) = item else {
                    return Err(FetchError::schema_mismatch(format!(
                        "aggregate element {index} is {}, expected object",
                        json_type(item)
                    )));
                };
                let values = read_flow_fields(fields, Some(index))?;
                for (total, value) in totals.iter_mut().zip(values) {
                    *total += value;
                }
            }

            let [buy_volume, sell_volume, buy_value, sell_value] = totals;
            Ok(FlowDelta::new(
                label,
                buy_volume,
                sell_volume,
                buy_value,
                sell_value,
            ))
        }
        other => Err(FetchError::schema_mismatch(format!(
            "aggregate payload is {}, expected object or array",
            json_type(other)
        ))),
    }
}

/// Single entry point used by the service for either payload shape.
///
/// A series whose every point was discarded fails with `EmptyResponse`.
pub fn normalize(
    instrument_key: &str,
    label: &str,
    payload: RawPayload,
) -> Result<Normalized, FetchError> {
    match payload {
        RawPayload::Series(points) => {
            let series = normalize_scrape_series(instrument_key, &points);
            if series.candles.is_empty() {
                return Err(FetchError::empty_response(format!(
                    "all {} point(s) for '{instrument_key}' were discarded",
                    points.len()
                )));
            }

            let mut warnings = Vec::new();
            if series.dropped_incomplete > 0 {
                warnings.push(format!(
                    "{} point(s) missing required fields were dropped",
                    series.dropped_incomplete
                ));
            }
            if series.rejected_invalid > 0 {
                warnings.push(format!(
                    "{} point(s) violating candle bounds were rejected",
                    series.rejected_invalid
                ));
            }

            Ok(Normalized {
                payload: MarketPayload::Candles(series.candles),
                warnings,
            })
        }
        RawPayload::Aggregate(raw) => Ok(Normalized {
            payload: MarketPayload::Flow(normalize_aggregate_payload(label, &raw)?),
            warnings: Vec::new(),
        }),
    }
}

fn unwrap_data_envelope(raw: &Value) -> &Value {
    match raw {
        Value::Object(fields) if !fields.contains_key(FLOW_FIELDS[0]) => {
            fields.get("data").unwrap_or(raw)
        }
        _ => raw,
    }
}

fn read_flow_fields(
    fields: &Map<String, Value>,
    element: Option<usize>,
) -> Result<[f64; 4], FetchError> {
    let mut values = [0.0; 4];
    for (slot, field) in values.iter_mut().zip(FLOW_FIELDS) {
        *slot = read_number(fields, field, element)?;
    }
    Ok(values)
}

fn read_number(
    fields: &Map<String, Value>,
    field: &str,
    element: Option<usize>,
) -> Result<f64, FetchError> {
    let location = match element {
        Some(index) => format!("'{field}' in element {index}"),
        None => format!("'{field}'"),
    };

    match fields.get(field) {
        None => Err(FetchError::schema_mismatch(format!(
            "required field {location} is missing"
        ))),
        Some(Value::Number(number)) => number
            .as_f64()
            .filter(|value| value.is_finite())
            .ok_or_else(|| {
                FetchError::schema_mismatch(format!("field {location} is not a finite number"))
            }),
        Some(other) => Err(FetchError::schema_mismatch(format!(
            "field {location} is {}, expected number",
            json_type(other)
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
