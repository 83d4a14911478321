// Trading Signal Data Models
// Signals trade distance from equilibrium, not direction

use serde::{Deserialize, Serialize};

/// Signal direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    /// Expect reversion upward (spot below true)
    Long,
    /// Expect reversion downward (spot above true)
    Short,
    Neutral,
}

/// Price target with reach probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub price: f64,
    pub probability: f64,
    pub label: String,
}

/// Expected reversion timeframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeframe {
    pub expected_hours: f64,
    pub range_hours: (f64, f64),
    pub confidence: f64,
}

/// Trading signal based on deviation from the true-price estimate.
///
/// USDT-dominant deviations carry a higher reversion probability;
/// USDC-dominant deviations may be trend and revert less reliably.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    #[serde(rename = "type")]
    pub signal_type: SignalType,
    pub confidence: f64,
    pub reversion_probability: f64,
    pub manipulation_probability: f64,
    pub zscore: f64,
    pub regime_name: String,
    pub targets: Vec<Target>,
    pub timeframe: Option<Timeframe>,
    pub stop_loss: Option<f64>,
}

impl Signal {
    /// Neutral (no trade) signal: all numeric fields zero, no targets.
    pub fn neutral() -> Self {
        Self {
            signal_type: SignalType::Neutral,
            confidence: 0.0,
            reversion_probability: 0.0,
            manipulation_probability: 0.0,
            zscore: 0.0,
            regime_name: "NORMAL".to_string(),
            targets: Vec::new(),
            timeframe: None,
            stop_loss: None,
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.confidence >= 0.5 && self.signal_type != SignalType::Neutral
    }

    pub fn is_high_conviction(&self) -> bool {
        self.confidence >= 0.75 && self.reversion_probability >= 0.7
    }

    /// The most likely target (T1), if any.
    pub fn primary_target(&self) -> Option<&Target> {
        self.targets.first()
    }
}
