//! Process-wide instrument catalog.
//!
//! The catalog is a read-only lookup table from logical key
//! (`"currencies/usd-vnd"`) to [`InstrumentRef`]. Iteration order is
//! insertion order.

use std::collections::HashMap;
use std::path::Path;

use crate::{AssetClass, CoreError, FetchError, InstrumentRef, SourceKind, ValidationError};

/// Endpoint path of the foreign-investor trade flow aggregate.
pub const FOREIGN_FLOW_PATH: &str = "/api/v1/market/foreign-trade";

#[derive(Debug, Clone, Default)]
pub struct InstrumentCatalog {
    instruments: Vec<InstrumentRef>,
    index: HashMap<String, usize>,
}

impl InstrumentCatalog {
    /// Builds a catalog, trimming every logical key so it matches what
    /// [`resolve`](Self::resolve) looks up.
    pub fn new(mut instruments: Vec<InstrumentRef>) -> Result<Self, ValidationError> {
        let mut index = HashMap::with_capacity(instruments.len());
        for (position, instrument) in instruments.iter_mut().enumerate() {
            let trimmed = instrument.logical_key.trim();
            if trimmed.len() != instrument.logical_key.len() {
                instrument.logical_key = trimmed.to_owned();
            }
            instrument.validate()?;
            if index
                .insert(instrument.logical_key.clone(), position)
                .is_some()
            {
                return Err(ValidationError::DuplicateInstrument {
                    key: instrument.logical_key.clone(),
                });
            }
        }

        Ok(Self { instruments, index })
    }

    /// Instruments shown by the overview and foreign-flow widgets.
    pub fn builtin() -> Self {
        let entries = [
            ("currencies/usd-vnd", "1956", "USD/VND", AssetClass::Currency),
            ("currencies/eur-usd", "1", "EUR/USD", AssetClass::Currency),
            ("currencies/usd-jpy", "3", "USD/JPY", AssetClass::Currency),
            ("indices/vn", "41064", "VN-Index", AssetClass::Index),
            ("indices/us-30", "169", "Dow Jones", AssetClass::Index),
            ("indices/us-spx-500", "166", "S&P 500", AssetClass::Index),
            ("indices/japan-ni225", "178", "Nikkei 225", AssetClass::Index),
            ("commodities/gold", "8830", "Gold", AssetClass::Commodity),
            ("commodities/crude-oil", "8849", "Crude Oil WTI", AssetClass::Commodity),
            ("equities/vietnam-dairy-products-jsc", "41078", "Vinamilk", AssetClass::Equity),
            ("equities/vingroup-jsc", "41083", "Vingroup", AssetClass::Equity),
        ];

        let instruments = entries
            .into_iter()
            .map(|(key, id, name, asset_class)| InstrumentRef {
                logical_key: key.to_owned(),
                source_key: key.to_owned(),
                external_id: id.to_owned(),
                display_name: name.to_owned(),
                source: SourceKind::Scrape,
                asset_class,
            })
            .chain(std::iter::once(InstrumentRef {
                logical_key: String::from("flows/foreign-trade"),
                source_key: String::from(FOREIGN_FLOW_PATH),
                external_id: String::new(),
                display_name: String::from("Foreign trade flow"),
                source: SourceKind::Rest,
                asset_class: AssetClass::Flow,
            }))
            .collect::<Vec<_>>();
        let index = instruments
            .iter()
            .enumerate()
            .map(|(position, instrument)| (instrument.logical_key.clone(), position))
            .collect();

        Self { instruments, index }
    }

    /// Loads a catalog from a JSON array of instrument records.
    pub fn from_json_str(input: &str) -> Result<Self, CoreError> {
        let instruments: Vec<InstrumentRef> = serde_json::from_str(input)?;
        Ok(Self::new(instruments)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn resolve(&self, logical_key: &str) -> Result<&InstrumentRef, FetchError> {
        let key = logical_key.trim();
        self.index
            .get(key)
            .map(|position| &self.instruments[*position])
            .ok_or_else(|| FetchError::unknown_instrument(key))
    }

    pub fn all(&self) -> impl Iterator<Item = &InstrumentRef> + Clone + '_ {
        self.instruments.iter()
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}
