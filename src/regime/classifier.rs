// Regime Classifier
// Priority-ordered evaluation; the most severe condition wins:
//   CASCADE > MANIPULATION > TREND > HIGH_LEVERAGE > LOW_VOLATILITY > NORMAL

use tracing::debug;

use crate::config::RegimeConfig;
use crate::models::leverage::{CascadeDetection, LeverageStress};
use crate::models::regime::{Regime, RegimeType, ReversionSpeed};
use crate::models::stablecoin::{RegimeSignal, StablecoinState};

/// Per-regime model adjustments.
#[derive(Debug, Clone, PartialEq)]
pub struct RegimeParameters {
    pub process_noise_mult: f64,
    pub observation_noise_mult: f64,
    pub band_mult: f64,
    pub reversion_speed: ReversionSpeed,
}

/// Classifies the market regime from stablecoin flow signals, leverage
/// stress, cascade status, and realized volatility. Pure function of its
/// inputs.
pub struct RegimeClassifier {
    config: RegimeConfig,
}

impl RegimeClassifier {
    pub fn new(config: &RegimeConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn classify(
        &self,
        leverage_stress: &LeverageStress,
        cascade_detection: &CascadeDetection,
        stablecoin_state: &StablecoinState,
        volatility_annualized: f64,
    ) -> Regime {
        let regime = self.classify_inner(
            leverage_stress,
            cascade_detection,
            stablecoin_state,
            volatility_annualized,
        );
        debug!(
            regime = regime.regime_type.name(),
            confidence = regime.confidence,
            "regime classified"
        );
        regime
    }

    fn classify_inner(
        &self,
        leverage_stress: &LeverageStress,
        cascade_detection: &CascadeDetection,
        stablecoin_state: &StablecoinState,
        volatility_annualized: f64,
    ) -> Regime {
        // Priority 1: active cascade
        if cascade_detection.is_cascade {
            return Regime::cascade(cascade_detection.confidence);
        }

        // Priority 2: stablecoin-based manipulation signal
        let manip_prob = stablecoin_state.flow_ratio.manipulation_probability;
        if manip_prob > self.config.manipulation_prob_threshold {
            return Regime::manipulation(manip_prob);
        }

        // Priority 3: USDC-confirmed trend
        let usdc = &stablecoin_state.usdc_impact;
        if usdc.regime_signal == RegimeSignal::Trend && stablecoin_state.flow_ratio.usdc_dominant {
            return Regime::trend(usdc.confidence);
        }

        // Priority 4: elevated leverage without a cascade
        if leverage_stress.score > self.config.leverage_stress_high {
            return Regime::high_leverage(leverage_stress.score);
        }

        // Priority 5: quiet tape
        if volatility_annualized < self.config.volatility_low_threshold {
            let confidence = 1.0 - volatility_annualized / self.config.volatility_low_threshold;
            return Regime::low_volatility(confidence);
        }

        Regime::normal(0.8)
    }

    /// Regime-specific filter and band adjustments.
    pub fn regime_parameters(&self, regime: &Regime) -> RegimeParameters {
        match regime.regime_type {
            RegimeType::Trend => RegimeParameters {
                process_noise_mult: 1.2,
                observation_noise_mult: 0.8,
                band_mult: 0.85,
                reversion_speed: ReversionSpeed::Slow,
            },
            RegimeType::LowVolatility => RegimeParameters {
                process_noise_mult: 0.5,
                observation_noise_mult: 0.8,
                band_mult: 0.8,
                reversion_speed: ReversionSpeed::Fast,
            },
            RegimeType::Normal => RegimeParameters {
                process_noise_mult: 1.0,
                observation_noise_mult: 1.0,
                band_mult: 1.0,
                reversion_speed: ReversionSpeed::Normal,
            },
            RegimeType::HighLeverage => RegimeParameters {
                process_noise_mult: 1.5,
                observation_noise_mult: 2.0,
                band_mult: 1.5,
                reversion_speed: ReversionSpeed::Normal,
            },
            RegimeType::Manipulation => RegimeParameters {
                process_noise_mult: 0.3,
                observation_noise_mult: 3.0,
                band_mult: 1.5,
                reversion_speed: ReversionSpeed::Fast,
            },
            RegimeType::Cascade => RegimeParameters {
                process_noise_mult: 0.5,
                observation_noise_mult: 5.0,
                band_mult: 2.0,
                reversion_speed: ReversionSpeed::Fast,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::leverage::CascadeDirection;
    use crate::models::stablecoin::{FlowRatio, USDCImpact, USDTImpact};

    fn stablecoin_state(usdt: f64, usdc: f64, signal: RegimeSignal, confidence: f64) -> StablecoinState {
        StablecoinState {
            usdt_impact: USDTImpact {
                volatility_multiplier: 1.0,
                trust_reduction: 0.0,
                manipulation_prob_adjustment: 0.0,
            },
            usdc_impact: USDCImpact {
                drift_confidence_adjustment: 0.0,
                regime_signal: signal,
                confidence,
            },
            flow_ratio: FlowRatio::from_flows(usdt, usdc),
        }
    }

    fn classifier() -> RegimeClassifier {
        RegimeClassifier::new(&RegimeConfig::default())
    }

    fn calm_stress() -> LeverageStress {
        LeverageStress::from_components(0.1, 0.1, 0.1, 0.0, 0.1)
    }

    #[test]
    fn cascade_takes_priority_over_everything() {
        let state = stablecoin_state(5e9, 1e8, RegimeSignal::Manipulation, 0.9);
        let cascade = CascadeDetection::detected(0.85, CascadeDirection::LongSqueeze);
        let regime = classifier().classify(&calm_stress(), &cascade, &state, 0.1);
        assert_eq!(regime.regime_type, RegimeType::Cascade);
        assert_eq!(regime.confidence, 0.85);
    }

    #[test]
    fn manipulation_from_flow_ratio() {
        let state = stablecoin_state(5e9, 1e8, RegimeSignal::Manipulation, 0.9);
        let regime = classifier().classify(
            &calm_stress(),
            &CascadeDetection::no_cascade(0.1),
            &state,
            0.5,
        );
        assert_eq!(regime.regime_type, RegimeType::Manipulation);
        assert!(regime.confidence > 0.7);
    }

    #[test]
    fn trend_requires_both_signal_and_dominance() {
        let dominant = stablecoin_state(1e8, 5e8, RegimeSignal::Trend, 0.8);
        let regime = classifier().classify(
            &calm_stress(),
            &CascadeDetection::no_cascade(0.1),
            &dominant,
            0.5,
        );
        assert_eq!(regime.regime_type, RegimeType::Trend);

        // Trend signal without dominance falls through
        let mixed = stablecoin_state(5e8, 5e8, RegimeSignal::Trend, 0.8);
        let regime = classifier().classify(
            &calm_stress(),
            &CascadeDetection::no_cascade(0.1),
            &mixed,
            0.5,
        );
        assert_ne!(regime.regime_type, RegimeType::Trend);
    }

    #[test]
    fn high_leverage_then_low_volatility_then_normal() {
        let state = stablecoin_state(1e8, 1e8, RegimeSignal::Uncertain, 0.5);
        let no_cascade = CascadeDetection::no_cascade(0.1);

        let hot = LeverageStress::from_components(0.9, 0.9, 0.9, 0.5, 0.9);
        let regime = classifier().classify(&hot, &no_cascade, &state, 0.5);
        assert_eq!(regime.regime_type, RegimeType::HighLeverage);

        let regime = classifier().classify(&calm_stress(), &no_cascade, &state, 0.1);
        assert_eq!(regime.regime_type, RegimeType::LowVolatility);
        assert!((regime.confidence - 0.5).abs() < 1e-12);

        let regime = classifier().classify(&calm_stress(), &no_cascade, &state, 0.5);
        assert_eq!(regime.regime_type, RegimeType::Normal);
        assert_eq!(regime.confidence, 0.8);
    }

    #[test]
    fn classification_is_pure() {
        let state = stablecoin_state(1e8, 1e8, RegimeSignal::Uncertain, 0.5);
        let no_cascade = CascadeDetection::no_cascade(0.1);
        let a = classifier().classify(&calm_stress(), &no_cascade, &state, 0.5);
        let b = classifier().classify(&calm_stress(), &no_cascade, &state, 0.5);
        assert_eq!(a, b);
    }
}
