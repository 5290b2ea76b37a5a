use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Direction of a change, used only to pick a visual treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sign {
    Positive,
    Negative,
    Zero,
}

impl Sign {
    pub fn of(value: f64) -> Self {
        if value > 0.0 {
            Self::Positive
        } else if value < 0.0 {
            Self::Negative
        } else {
            Self::Zero
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Zero => "zero",
        }
    }
}

impl Display for Sign {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Foreign-investor buy/sell aggregate with derived nets.
///
/// Derived fields are computed once by [`FlowDelta::new`] and never
/// recomputed, so a deserialized value keeps whatever the producer wrote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDelta {
    pub label: String,
    pub buy_volume: f64,
    pub sell_volume: f64,
    pub buy_value: f64,
    pub sell_value: f64,
    pub net_volume: f64,
    pub net_value: f64,
    pub sign: Sign,
}

impl FlowDelta {
    pub fn new(
        label: impl Into<String>,
        buy_volume: f64,
        sell_volume: f64,
        buy_value: f64,
        sell_value: f64,
    ) -> Self {
        let net_volume = buy_volume - sell_volume;
        let net_value = buy_value - sell_value;

        Self {
            label: label.into(),
            buy_volume,
            sell_volume,
            buy_value,
            sell_value,
            net_volume,
            net_value,
            sign: Sign::of(net_value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_follows_net_value() {
        let delta = FlowDelta::new("HOSE", 10.0, 20.0, 500.0, 100.0);
        assert_eq!(delta.net_volume, -10.0);
        assert_eq!(delta.net_value, 400.0);
        assert_eq!(delta.sign, Sign::Positive);
    }

    #[test]
    fn balanced_flow_is_zero() {
        let delta = FlowDelta::new("HOSE", 5.0, 5.0, 7.0, 7.0);
        assert_eq!(delta.sign, Sign::Zero);
    }
}
