use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Lookback range of a history request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "P1D")]
    OneDay,
    #[serde(rename = "P1W")]
    OneWeek,
    #[serde(rename = "P1M")]
    OneMonth,
    #[serde(rename = "P3M")]
    ThreeMonths,
    #[serde(rename = "P6M")]
    SixMonths,
    #[serde(rename = "P1Y")]
    OneYear,
    #[serde(rename = "P5Y")]
    FiveYears,
    #[serde(rename = "MAX")]
    Max,
}

impl Period {
    pub const ALL: [Self; 8] = [
        Self::OneDay,
        Self::OneWeek,
        Self::OneMonth,
        Self::ThreeMonths,
        Self::SixMonths,
        Self::OneYear,
        Self::FiveYears,
        Self::Max,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneDay => "P1D",
            Self::OneWeek => "P1W",
            Self::OneMonth => "P1M",
            Self::ThreeMonths => "P3M",
            Self::SixMonths => "P6M",
            Self::OneYear => "P1Y",
            Self::FiveYears => "P5Y",
            Self::Max => "MAX",
        }
    }
}

impl Display for Period {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|period| period.as_str() == normalized)
            .ok_or(ValidationError::InvalidPeriod { value: normalized })
    }
}

/// Bucket width of each point in a history series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "PT1M")]
    OneMinute,
    #[serde(rename = "PT5M")]
    FiveMinutes,
    #[serde(rename = "PT15M")]
    FifteenMinutes,
    #[serde(rename = "PT30M")]
    ThirtyMinutes,
    #[serde(rename = "PT1H")]
    OneHour,
    #[serde(rename = "PT5H")]
    FiveHours,
    #[serde(rename = "P1D")]
    OneDay,
    #[serde(rename = "P1W")]
    OneWeek,
    #[serde(rename = "P1M")]
    OneMonth,
}

impl Resolution {
    pub const ALL: [Self; 9] = [
        Self::OneMinute,
        Self::FiveMinutes,
        Self::FifteenMinutes,
        Self::ThirtyMinutes,
        Self::OneHour,
        Self::FiveHours,
        Self::OneDay,
        Self::OneWeek,
        Self::OneMonth,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneMinute => "PT1M",
            Self::FiveMinutes => "PT5M",
            Self::FifteenMinutes => "PT15M",
            Self::ThirtyMinutes => "PT30M",
            Self::OneHour => "PT1H",
            Self::FiveHours => "PT5H",
            Self::OneDay => "P1D",
            Self::OneWeek => "P1W",
            Self::OneMonth => "P1M",
        }
    }
}

impl Display for Resolution {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|resolution| resolution.as_str() == normalized)
            .ok_or(ValidationError::InvalidResolution { value: normalized })
    }
}

/// Parameters of one history retrieval against the scraping source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryQuery {
    pub period: Period,
    pub resolution: Resolution,
    pub points: u16,
}

impl HistoryQuery {
    pub fn new(period: Period, resolution: Resolution, points: u16) -> Result<Self, ValidationError> {
        if points == 0 {
            return Err(ValidationError::ZeroPointCount);
        }
        Ok(Self {
            period,
            resolution,
            points,
        })
    }
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            period: Period::OneMonth,
            resolution: Resolution::OneDay,
            points: 120,
        }
    }
}

/// Point as received from the scraping source, before validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSeriesPoint {
    pub timestamp: Option<i64>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub value: Option<f64>,
}

impl RawSeriesPoint {
    pub const fn complete(timestamp: i64, open: f64, high: f64, low: f64, close: f64, value: f64) -> Self {
        Self {
            timestamp: Some(timestamp),
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close: Some(close),
            value: Some(value),
        }
    }
}
