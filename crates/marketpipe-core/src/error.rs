use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation and contract errors raised while constructing domain values.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("field '{field}' cannot be empty")]
    EmptyField { field: &'static str },
    #[error("duplicate logical key '{key}' in instrument catalog")]
    DuplicateInstrument { key: String },

    #[error("invalid period '{value}', expected one of P1D, P1W, P1M, P3M, P6M, P1Y, P5Y, MAX")]
    InvalidPeriod { value: String },
    #[error(
        "invalid resolution '{value}', expected one of PT1M, PT5M, PT15M, PT30M, PT1H, PT5H, P1D, P1W, P1M"
    )]
    InvalidResolution { value: String },
    #[error("history point count must be greater than zero")]
    ZeroPointCount,

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },

    #[error("candle high {high} must be >= low {low}")]
    InvalidCandleRange { high: f64, low: f64 },
    #[error("candle open/close must be within low/high range")]
    InvalidCandleBounds,

    #[error("environment variable {name} has invalid value '{value}'")]
    InvalidEnv { name: &'static str, value: String },
}

/// Top-level error type for catalog and configuration loading.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure classification carried by every per-instrument failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "status", rename_all = "snake_case")]
pub enum ErrorKind {
    UnknownInstrument,
    FetchTimeout,
    Timeout,
    EmptyResponse,
    SourceError,
    HttpError(u16),
    NetworkError,
    SchemaMismatch,
}

impl ErrorKind {
    pub const fn code(self) -> &'static str {
        match self {
            Self::UnknownInstrument => "instrument.unknown",
            Self::FetchTimeout => "scrape.timeout",
            Self::Timeout => "rest.timeout",
            Self::EmptyResponse => "scrape.empty",
            Self::SourceError => "scrape.source",
            Self::HttpError(_) => "rest.http",
            Self::NetworkError => "rest.network",
            Self::SchemaMismatch => "normalize.schema_mismatch",
        }
    }

    /// Whether a later batch may reasonably succeed for the same instrument.
    pub const fn retryable(self) -> bool {
        match self {
            Self::FetchTimeout | Self::Timeout | Self::NetworkError | Self::SourceError => true,
            Self::HttpError(status) => matches!(status, 408 | 429 | 500..=599),
            Self::UnknownInstrument | Self::EmptyResponse | Self::SchemaMismatch => false,
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HttpError(status) => write!(f, "{} ({status})", self.code()),
            _ => f.write_str(self.code()),
        }
    }
}

/// Structured fetch or normalization failure for a single instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    kind: ErrorKind,
    message: String,
}

impl FetchError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unknown_instrument(key: &str) -> Self {
        Self::new(
            ErrorKind::UnknownInstrument,
            format!("instrument '{key}' is not in the catalog"),
        )
    }

    pub fn fetch_timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::FetchTimeout, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn empty_response(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::EmptyResponse, message)
    }

    pub fn source(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SourceError, message)
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::HttpError(status), message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NetworkError, message)
    }

    pub fn schema_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SchemaMismatch, message)
    }

    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub const fn retryable(&self) -> bool {
        self.kind.retryable()
    }
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl std::error::Error for FetchError {}
