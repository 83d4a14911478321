// True Price Signal Generator
// Trades distance from equilibrium, not direction. USDT-dominant
// deviations revert hard; USDC-dominant deviations may be trend.

use crate::config::SignalConfig;
use crate::models::leverage::LeverageStress;
use crate::models::regime::{Regime, RegimeType};
use crate::models::signal::{Signal, SignalType, Target, Timeframe};
use crate::models::stablecoin::StablecoinState;
use crate::models::true_price::TruePriceEstimate;

pub struct TruePriceSignalGenerator {
    config: SignalConfig,
}

impl TruePriceSignalGenerator {
    pub fn new(config: &SignalConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Generate a trading signal from the current estimate. Deviations
    /// below the z-score threshold yield a neutral signal.
    pub fn generate(
        &self,
        estimate: &TruePriceEstimate,
        leverage_stress: &LeverageStress,
        stablecoin_state: &StablecoinState,
    ) -> Signal {
        let z = estimate.deviation_zscore;
        let spot = estimate.spot_median;
        let true_price = estimate.price;
        let regime = &estimate.regime;

        if z.abs() < self.config.min_zscore_threshold {
            return Signal::neutral();
        }

        let manip_prob = self.manipulation_probability(z, regime, leverage_stress, stablecoin_state);
        let reversion_prob =
            self.reversion_probability(manip_prob, regime, stablecoin_state);

        // Direction: fade the deviation
        let direction = if z > 0.0 { SignalType::Short } else { SignalType::Long };

        let confidence = self.confidence(z, stablecoin_state);
        let targets = self.targets(spot, true_price, stablecoin_state);
        let timeframe = self.timeframe(z, regime, stablecoin_state);
        let stop_loss = self.stop_loss(spot, z, regime, stablecoin_state);

        Signal {
            signal_type: direction,
            confidence,
            reversion_probability: reversion_prob,
            manipulation_probability: manip_prob,
            zscore: z,
            regime_name: regime.regime_type.name().to_string(),
            targets,
            timeframe: Some(timeframe),
            stop_loss: Some(stop_loss),
        }
    }

    /// Probability that the current deviation is manipulation-driven:
    /// logistic in |z| centered at 2 sigma, scaled by regime, leverage
    /// stress, and stablecoin dominance; capped at 0.95.
    fn manipulation_probability(
        &self,
        z: f64,
        regime: &Regime,
        leverage_stress: &LeverageStress,
        stablecoin_state: &StablecoinState,
    ) -> f64 {
        let base_prob = 1.0 / (1.0 + (-2.0 * (z.abs() - 2.0)).exp());

        let regime_mult = match regime.regime_type {
            RegimeType::Cascade => 1.5,
            RegimeType::Manipulation => 1.8,
            RegimeType::HighLeverage => 1.3,
            RegimeType::Normal => 1.0,
            RegimeType::LowVolatility => 0.7,
            RegimeType::Trend => 0.5,
        };

        let stress_mult = 1.0 + leverage_stress.score * 0.5;

        let stablecoin_mult = if stablecoin_state.flow_ratio.usdt_dominant {
            1.5
        } else if stablecoin_state.flow_ratio.usdc_dominant {
            0.6
        } else {
            1.0
        };

        (base_prob * regime_mult * stress_mult * stablecoin_mult).min(0.95)
    }

    /// Probability that spot reverts toward the estimate within the
    /// timeframe, banded by stablecoin dominance and shifted per regime.
    fn reversion_probability(
        &self,
        manip_prob: f64,
        regime: &Regime,
        stablecoin_state: &StablecoinState,
    ) -> f64 {
        let base = if stablecoin_state.flow_ratio.usdt_dominant {
            0.6 + 0.35 * manip_prob
        } else if stablecoin_state.flow_ratio.usdc_dominant {
            0.3 + 0.3 * manip_prob
        } else {
            0.5 + 0.4 * manip_prob
        };

        let adjustment = match regime.regime_type {
            RegimeType::Cascade => 0.1,
            RegimeType::Manipulation => 0.1,
            RegimeType::HighLeverage => 0.05,
            RegimeType::Normal => 0.0,
            RegimeType::LowVolatility => -0.1,
            RegimeType::Trend => -0.2,
        };

        (base + adjustment).clamp(0.2, 0.95)
    }

    /// Signal confidence scales with |z| and with stablecoin clarity
    /// (distance of the flow ratio from parity).
    fn confidence(&self, z: f64, stablecoin_state: &StablecoinState) -> f64 {
        let base = (self.config.base_confidence
            + self.config.zscore_confidence_scale * (z.abs() - 1.5))
            .min(0.95);

        let clarity = (stablecoin_state.flow_ratio.ratio - 1.0).abs().min(3.0);
        (base * (1.0 + 0.1 * clarity)).min(0.95)
    }

    /// Four ordered reversion targets: 50%, 75%, full, and 25% overshoot.
    fn targets(&self, spot: f64, true_price: f64, stablecoin_state: &StablecoinState) -> Vec<Target> {
        let deviation = spot - true_price;

        let prob_mult: f64 = if stablecoin_state.flow_ratio.usdt_dominant {
            1.2
        } else if stablecoin_state.flow_ratio.usdc_dominant {
            0.7
        } else {
            1.0
        };

        vec![
            Target {
                price: spot - 0.5 * deviation,
                probability: (0.70 * prob_mult).min(0.95),
                label: "T1_50%".to_string(),
            },
            Target {
                price: spot - 0.75 * deviation,
                probability: (0.50 * prob_mult).min(0.80),
                label: "T2_75%".to_string(),
            },
            Target {
                price: true_price,
                probability: (0.35 * prob_mult).min(0.60),
                label: "T3_Full".to_string(),
            },
            Target {
                price: true_price - 0.25 * deviation,
                probability: (0.15 * prob_mult).min(0.30),
                label: "T4_Overshoot".to_string(),
            },
        ]
    }

    /// Expected reversion horizon. Larger deviations and leverage-driven
    /// regimes resolve faster; trends may never revert.
    fn timeframe(&self, z: f64, regime: &Regime, stablecoin_state: &StablecoinState) -> Timeframe {
        let base_hours = self.config.base_reversion_hours;

        let zscore_mult = (2.0 - z.abs() * 0.3).max(0.5);

        let regime_mult = match regime.regime_type {
            RegimeType::Cascade => 0.25,
            RegimeType::Manipulation => 0.5,
            RegimeType::HighLeverage => 0.75,
            RegimeType::Normal => 1.0,
            RegimeType::LowVolatility => 1.5,
            RegimeType::Trend => 3.0,
        };

        let stablecoin_mult = if stablecoin_state.flow_ratio.usdt_dominant {
            0.7
        } else if stablecoin_state.flow_ratio.usdc_dominant {
            1.5
        } else {
            1.0
        };

        let hours = base_hours * zscore_mult * regime_mult * stablecoin_mult;

        Timeframe {
            expected_hours: hours,
            range_hours: (hours * 0.5, hours * 2.0),
            confidence: 0.7,
        }
    }

    /// Stop placed opposite the signal direction, widened in stressed
    /// regimes and under USDT dominance.
    fn stop_loss(
        &self,
        spot: f64,
        z: f64,
        regime: &Regime,
        stablecoin_state: &StablecoinState,
    ) -> f64 {
        let mut stop_pct = 0.02;

        match regime.regime_type {
            RegimeType::Cascade | RegimeType::Manipulation => stop_pct *= 1.5,
            RegimeType::Trend => stop_pct *= 1.3,
            _ => {}
        }

        if stablecoin_state.flow_ratio.usdt_dominant {
            stop_pct *= 1.2;
        }

        if z > 0.0 {
            // Short: stop above
            spot * (1.0 + stop_pct)
        } else {
            // Long: stop below
            spot * (1.0 - stop_pct)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::regime::Regime;
    use crate::models::stablecoin::{FlowRatio, RegimeSignal, USDCImpact, USDTImpact};
    use approx::assert_relative_eq;

    fn generator() -> TruePriceSignalGenerator {
        TruePriceSignalGenerator::new(&SignalConfig::default())
    }

    fn stablecoins(usdt: f64, usdc: f64) -> StablecoinState {
        StablecoinState {
            usdt_impact: USDTImpact {
                volatility_multiplier: 1.5,
                trust_reduction: 0.25,
                manipulation_prob_adjustment: 0.1,
            },
            usdc_impact: USDCImpact {
                drift_confidence_adjustment: 0.0,
                regime_signal: RegimeSignal::Uncertain,
                confidence: 0.5,
            },
            flow_ratio: FlowRatio::from_flows(usdt, usdc),
        }
    }

    fn estimate(spot: f64, true_price: f64, std: f64, regime: Regime) -> TruePriceEstimate {
        TruePriceEstimate {
            price: true_price,
            std,
            confidence_interval: (true_price - 1.96 * std, true_price + 1.96 * std),
            deviation_zscore: (spot - true_price) / std,
            spot_median: spot,
            regime,
            timestamp: 1_700_000_000,
            data_hash: [0u8; 32],
        }
    }

    fn calm_stress() -> LeverageStress {
        LeverageStress::from_components(0.2, 0.2, 0.1, 0.0, 0.2)
    }

    #[test]
    fn neutral_below_zscore_threshold() {
        let signal = generator().generate(
            &estimate(30010.0, 30000.0, 10.0, Regime::normal(0.8)),
            &calm_stress(),
            &stablecoins(1e8, 1e8),
        );
        assert_eq!(signal.signal_type, SignalType::Neutral);
        assert!(signal.targets.is_empty());
    }

    #[test]
    fn directional_iff_zscore_at_threshold() {
        // Exactly at the threshold counts as a signal
        let signal = generator().generate(
            &estimate(30015.0, 30000.0, 10.0, Regime::normal(0.8)),
            &calm_stress(),
            &stablecoins(1e8, 1e8),
        );
        assert_eq!(signal.signal_type, SignalType::Short);
    }

    #[test]
    fn short_above_long_below() {
        let short = generator().generate(
            &estimate(30300.0, 30000.0, 10.0, Regime::normal(0.8)),
            &calm_stress(),
            &stablecoins(1e8, 1e8),
        );
        assert_eq!(short.signal_type, SignalType::Short);

        let long = generator().generate(
            &estimate(29700.0, 30000.0, 10.0, Regime::normal(0.8)),
            &calm_stress(),
            &stablecoins(1e8, 1e8),
        );
        assert_eq!(long.signal_type, SignalType::Long);
    }

    #[test]
    fn targets_monotone_in_direction() {
        let short = generator().generate(
            &estimate(30300.0, 30000.0, 10.0, Regime::normal(0.8)),
            &calm_stress(),
            &stablecoins(1e8, 1e8),
        );
        let prices: Vec<f64> = short.targets.iter().map(|t| t.price).collect();
        assert_eq!(prices.len(), 4);
        assert!(prices.windows(2).all(|w| w[0] > w[1]), "short targets must descend");

        let long = generator().generate(
            &estimate(29700.0, 30000.0, 10.0, Regime::normal(0.8)),
            &calm_stress(),
            &stablecoins(1e8, 1e8),
        );
        let prices: Vec<f64> = long.targets.iter().map(|t| t.price).collect();
        assert!(prices.windows(2).all(|w| w[0] < w[1]), "long targets must ascend");
    }

    #[test]
    fn usdt_dominance_raises_reversion_probability() {
        let usdt = generator().generate(
            &estimate(30300.0, 30000.0, 10.0, Regime::manipulation(0.8)),
            &calm_stress(),
            &stablecoins(3e9, 1e8),
        );
        assert!(usdt.reversion_probability >= 0.6);

        let usdc = generator().generate(
            &estimate(30300.0, 30000.0, 10.0, Regime::trend(0.8)),
            &calm_stress(),
            &stablecoins(1e8, 3e9),
        );
        assert!(usdc.reversion_probability <= 0.6);
        assert!(usdc.reversion_probability >= 0.2);
    }

    #[test]
    fn probability_caps_hold_under_extremes() {
        let signal = generator().generate(
            &estimate(33000.0, 30000.0, 10.0, Regime::manipulation(0.95)),
            &LeverageStress::from_components(1.0, 1.0, 1.0, 1.0, 1.0),
            &stablecoins(5e9, 1e7),
        );
        assert!(signal.manipulation_probability <= 0.95);
        assert!(signal.reversion_probability <= 0.95);
        assert!(signal.confidence <= 0.95);
        for target in &signal.targets {
            assert!(target.probability <= 0.95);
        }
    }

    #[test]
    fn trend_regime_stretches_timeframe() {
        let trend = generator().generate(
            &estimate(30016.0, 30000.0, 10.0, Regime::trend(0.8)),
            &calm_stress(),
            &stablecoins(1e7, 3e9),
        );
        let timeframe = trend.timeframe.unwrap();
        // 3x regime mult and 1.5x USDC mult on the base horizon
        assert!(timeframe.expected_hours >= 3.0 * SignalConfig::default().base_reversion_hours);
        assert_relative_eq!(
            timeframe.range_hours.1,
            timeframe.expected_hours * 2.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn stop_widens_in_cascade_and_sits_opposite_direction() {
        let short = generator().generate(
            &estimate(30300.0, 30000.0, 10.0, Regime::cascade(0.8)),
            &calm_stress(),
            &stablecoins(1e8, 1e8),
        );
        let stop = short.stop_loss.unwrap();
        assert_relative_eq!(stop, 30300.0 * 1.03, epsilon = 1e-6);

        let long = generator().generate(
            &estimate(29700.0, 30000.0, 10.0, Regime::cascade(0.8)),
            &calm_stress(),
            &stablecoins(1e8, 1e8),
        );
        let stop = long.stop_loss.unwrap();
        assert_relative_eq!(stop, 29700.0 * 0.97, epsilon = 1e-6);
    }
}
