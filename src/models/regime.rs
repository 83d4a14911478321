// Regime Classification Data Models

use serde::{Deserialize, Serialize};

/// Market regime tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegimeType {
    /// Default market conditions
    Normal,
    /// USDC-dominant, genuine price discovery
    Trend,
    /// Stable, low leverage, tight bands
    LowVolatility,
    /// Elevated leverage but no cascade
    HighLeverage,
    /// USDT-dominant, leverage-driven distortion
    Manipulation,
    /// Active liquidation cascade
    Cascade,
}

impl RegimeType {
    pub fn name(&self) -> &'static str {
        match self {
            RegimeType::Normal => "NORMAL",
            RegimeType::Trend => "TREND",
            RegimeType::LowVolatility => "LOW_VOLATILITY",
            RegimeType::HighLeverage => "HIGH_LEVERAGE",
            RegimeType::Manipulation => "MANIPULATION",
            RegimeType::Cascade => "CASCADE",
        }
    }
}

/// Qualitative expected decay rate of a deviation per regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReversionSpeed {
    Slow,
    Normal,
    Fast,
}

/// Market regime classification with confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Regime {
    #[serde(rename = "type")]
    pub regime_type: RegimeType,
    pub confidence: f64,
    pub manipulation_probability: f64,
}

impl Regime {
    pub fn normal(confidence: f64) -> Self {
        Self {
            regime_type: RegimeType::Normal,
            confidence,
            manipulation_probability: 0.1,
        }
    }

    pub fn trend(confidence: f64) -> Self {
        Self {
            regime_type: RegimeType::Trend,
            confidence,
            manipulation_probability: 0.1,
        }
    }

    pub fn low_volatility(confidence: f64) -> Self {
        Self {
            regime_type: RegimeType::LowVolatility,
            confidence,
            manipulation_probability: 0.05,
        }
    }

    pub fn high_leverage(confidence: f64) -> Self {
        Self {
            regime_type: RegimeType::HighLeverage,
            confidence,
            manipulation_probability: 0.4,
        }
    }

    pub fn manipulation(confidence: f64) -> Self {
        Self {
            regime_type: RegimeType::Manipulation,
            confidence,
            manipulation_probability: confidence,
        }
    }

    pub fn cascade(confidence: f64) -> Self {
        Self {
            regime_type: RegimeType::Cascade,
            confidence,
            manipulation_probability: 0.9,
        }
    }

    pub fn is_high_risk(&self) -> bool {
        matches!(
            self.regime_type,
            RegimeType::Manipulation | RegimeType::Cascade | RegimeType::HighLeverage
        )
    }

    pub fn is_trending(&self) -> bool {
        self.regime_type == RegimeType::Trend
    }

    /// Deviation band multiplier for this regime.
    pub fn band_multiplier(&self) -> f64 {
        match self.regime_type {
            RegimeType::Normal => 1.0,
            RegimeType::Trend => 0.85,
            RegimeType::LowVolatility => 0.8,
            RegimeType::HighLeverage => 1.5,
            RegimeType::Manipulation => 1.75,
            RegimeType::Cascade => 2.0,
        }
    }

    /// Expected reversion speed for this regime.
    pub fn reversion_speed(&self) -> ReversionSpeed {
        match self.regime_type {
            RegimeType::Normal => ReversionSpeed::Normal,
            RegimeType::Trend => ReversionSpeed::Slow,
            RegimeType::LowVolatility => ReversionSpeed::Fast,
            RegimeType::HighLeverage => ReversionSpeed::Normal,
            RegimeType::Manipulation => ReversionSpeed::Fast,
            RegimeType::Cascade => ReversionSpeed::Fast,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_multipliers_match_regime_table() {
        assert_eq!(Regime::normal(0.8).band_multiplier(), 1.0);
        assert_eq!(Regime::trend(0.9).band_multiplier(), 0.85);
        assert_eq!(Regime::cascade(0.8).band_multiplier(), 2.0);
    }

    #[test]
    fn risk_flags() {
        assert!(Regime::manipulation(0.8).is_high_risk());
        assert!(Regime::cascade(0.9).is_high_risk());
        assert!(!Regime::normal(0.8).is_high_risk());
        assert!(Regime::trend(0.7).is_trending());
    }

    #[test]
    fn manipulation_probability_tracks_confidence_only_for_manipulation() {
        assert_eq!(Regime::manipulation(0.85).manipulation_probability, 0.85);
        assert_eq!(Regime::cascade(0.85).manipulation_probability, 0.9);
        assert_eq!(Regime::normal(0.8).manipulation_probability, 0.1);
    }
}
