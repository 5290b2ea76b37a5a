use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Canonical OHLC + volume observation for one instrument at one timestamp.
///
/// `timestamp` is epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub instrument_key: String,
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(
        instrument_key: impl Into<String>,
        timestamp: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, ValidationError> {
        validate_finite("open", open)?;
        validate_finite("high", high)?;
        validate_finite("low", low)?;
        validate_finite("close", close)?;
        validate_finite("volume", volume)?;
        if volume < 0.0 {
            return Err(ValidationError::NegativeValue { field: "volume" });
        }

        if high < low {
            return Err(ValidationError::InvalidCandleRange { high, low });
        }

        if open.min(close) < low || open.max(close) > high {
            return Err(ValidationError::InvalidCandleBounds);
        }

        Ok(Self {
            instrument_key: instrument_key.into(),
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        })
    }

    /// Close-minus-open over the candle body.
    pub fn body(&self) -> f64 {
        self.close - self.open
    }
}

fn validate_finite(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    Ok(())
}
