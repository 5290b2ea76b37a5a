use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Upstream that serves an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Scrape,
    Rest,
}

impl SourceKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scrape => "scrape",
            Self::Rest => "rest",
        }
    }
}

impl Display for SourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical instrument class, used to group the overview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    Currency,
    Index,
    Commodity,
    Equity,
    Flow,
}

impl AssetClass {
    pub const ALL: [Self; 5] = [
        Self::Currency,
        Self::Index,
        Self::Commodity,
        Self::Equity,
        Self::Flow,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Currency => "currency",
            Self::Index => "index",
            Self::Commodity => "commodity",
            Self::Equity => "equity",
            Self::Flow => "flow",
        }
    }
}

impl Display for AssetClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog entry mapping a logical key to source-specific identifiers.
///
/// For scrape instruments `source_key` is the site path and `external_id`
/// the pair id; for REST instruments `source_key` is the endpoint path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentRef {
    pub logical_key: String,
    pub source_key: String,
    pub external_id: String,
    pub display_name: String,
    pub source: SourceKind,
    pub asset_class: AssetClass,
}

impl InstrumentRef {
    pub fn new(
        logical_key: impl Into<String>,
        source_key: impl Into<String>,
        external_id: impl Into<String>,
        display_name: impl Into<String>,
        source: SourceKind,
        asset_class: AssetClass,
    ) -> Result<Self, ValidationError> {
        let instrument = Self {
            logical_key: logical_key.into().trim().to_owned(),
            source_key: source_key.into(),
            external_id: external_id.into(),
            display_name: display_name.into(),
            source,
            asset_class,
        };
        instrument.validate()?;
        Ok(instrument)
    }

    pub fn scrape(
        logical_key: &str,
        external_id: &str,
        display_name: &str,
        asset_class: AssetClass,
    ) -> Result<Self, ValidationError> {
        Self::new(
            logical_key,
            logical_key,
            external_id,
            display_name,
            SourceKind::Scrape,
            asset_class,
        )
    }

    pub fn rest(logical_key: &str, endpoint_path: &str, display_name: &str) -> Result<Self, ValidationError> {
        Self::new(
            logical_key,
            endpoint_path,
            "",
            display_name,
            SourceKind::Rest,
            AssetClass::Flow,
        )
    }

    /// Checks required fields; deserialized entries go through this too.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.logical_key.trim().is_empty() {
            return Err(ValidationError::EmptyField {
                field: "logical_key",
            });
        }
        if self.source_key.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "source_key" });
        }
        if self.display_name.trim().is_empty() {
            return Err(ValidationError::EmptyField {
                field: "display_name",
            });
        }
        if self.source == SourceKind::Scrape && self.external_id.trim().is_empty() {
            return Err(ValidationError::EmptyField {
                field: "external_id",
            });
        }
        Ok(())
    }
}
