//! # Domain Models
//!
//! Canonical domain types for marketpipe.
//!
//! ## Models
//!
//! | Type | Description |
//! |------|-------------|
//! | [`InstrumentRef`] | Catalog entry mapping a logical key to source identifiers |
//! | [`RawSeriesPoint`] | Unvalidated point as received from the scraping source |
//! | [`Candle`] | Validated OHLC + volume observation |
//! | [`FlowDelta`] | Foreign-investor buy/sell aggregate with derived nets |
//! | [`HistoryQuery`] | Period / resolution / point-count triple for history fetches |
//!
//! ## Validation
//!
//! Candles enforce `low <= min(open, close) <= max(open, close) <= high` at
//! construction time. Invalid candles are rejected, never clamped:
//!
//! ```rust
//! use marketpipe_core::{Candle, ValidationError};
//!
//! let ok = Candle::new("currencies/usd-vnd", 1_700_000_000_000, 24_000.0, 24_100.0, 23_950.0, 24_050.0, 0.0);
//! assert!(ok.is_ok());
//!
//! let inverted = Candle::new("currencies/usd-vnd", 1_700_000_000_000, 24_000.0, 23_900.0, 24_100.0, 24_050.0, 0.0);
//! assert!(matches!(inverted, Err(ValidationError::InvalidCandleRange { .. })));
//! ```

mod candle;
mod flow;
mod history;
mod instrument;

pub use candle::Candle;
pub use flow::{FlowDelta, Sign};
pub use history::{HistoryQuery, Period, RawSeriesPoint, Resolution};
pub use instrument::{AssetClass, InstrumentRef, SourceKind};
