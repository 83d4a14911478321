// Leverage Stress Calculator
// Composite stress score in [0, 1]. High stress means spot prices are
// driven by forced flows and deserve less trust.

use std::collections::VecDeque;

use tracing::debug;

use crate::config::StressConfig;
use crate::models::leverage::{LeverageState, LeverageStress};
use crate::models::stablecoin::StablecoinState;

/// Warm-path statistics require this many samples; below it the absolute
/// cold-start thresholds apply.
const MIN_HISTORY_SAMPLES: usize = 10;

/// Fixed-capacity FIFO of recent samples with O(1) push and summary
/// statistics computed on demand.
#[derive(Debug, Clone)]
struct SampleHistory {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl SampleHistory {
    fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, value: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    fn len(&self) -> usize {
        self.samples.len()
    }

    fn as_slice(&mut self) -> &[f64] {
        self.samples.make_contiguous()
    }

    fn mean(&mut self) -> f64 {
        statistical::mean(self.as_slice())
    }

    fn std_dev(&mut self) -> f64 {
        statistical::population_standard_deviation(self.as_slice(), None)
    }

    fn median(&mut self) -> f64 {
        statistical::median(self.as_slice())
    }

    fn max(&self) -> f64 {
        self.samples.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}

/// Calculates leverage stress from five components. Stateful only in the
/// two capped sample histories, which are mutated exclusively during
/// `calculate`.
pub struct LeverageStressCalculator {
    config: StressConfig,
    oi_history: SampleHistory,
    funding_history: SampleHistory,
}

impl LeverageStressCalculator {
    pub fn new(config: &StressConfig) -> Self {
        Self {
            config: config.clone(),
            oi_history: SampleHistory::new(config.history_capacity),
            funding_history: SampleHistory::new(config.history_capacity),
        }
    }

    /// Compute the composite stress score and record the current sample.
    pub fn calculate(
        &mut self,
        leverage_state: &LeverageState,
        price_return_1h: f64,
        stablecoin_state: Option<&StablecoinState>,
    ) -> LeverageStress {
        self.oi_history.push(leverage_state.open_interest);
        self.funding_history.push(leverage_state.funding_rate);

        let oi_stress = self.oi_stress(leverage_state.open_interest);
        let funding_stress = self.funding_stress(leverage_state.funding_rate);

        // Saturates at 5x the typical hourly liquidation volume
        let liq_intensity =
            leverage_state.total_liquidations_1h() / self.config.typical_liquidation_volume;
        let liq_stress = (liq_intensity / 5.0).min(1.0);

        // Funding and price moving against each other is the pathological
        // leverage-unwind signature
        let divergence = leverage_state.funding_rate * (-price_return_1h);
        let divergence_stress = (divergence * 10.0).clamp(0.0, 1.0);

        let usdt_stress = match stablecoin_state {
            Some(state) => ((state.usdt_impact.volatility_multiplier - 1.0) / 2.0).clamp(0.0, 1.0),
            None => 0.0,
        };

        let stress = LeverageStress::from_components(
            oi_stress,
            funding_stress,
            liq_stress,
            divergence_stress,
            usdt_stress,
        );
        if stress.is_high_stress() {
            debug!(score = stress.score, "leverage stress elevated");
        }
        stress
    }

    /// OI stress: percentile rank once warm, absolute normalization on
    /// cold start.
    fn oi_stress(&mut self, current_oi: f64) -> f64 {
        if self.oi_history.len() < MIN_HISTORY_SAMPLES {
            return (current_oi / self.config.typical_oi).min(1.0);
        }

        let median = self.oi_history.median();
        if current_oi <= median {
            return 0.0;
        }

        let max_oi = self.oi_history.max();
        if max_oi == median {
            return 0.0;
        }

        // 0 at the median, saturating toward the historical max
        let rank = (current_oi - median) / (max_oi - median);
        (rank * 2.0).clamp(0.0, 1.0)
    }

    /// Funding stress: z-score against history once warm, absolute
    /// threshold on cold start.
    fn funding_stress(&mut self, current_funding: f64) -> f64 {
        if self.funding_history.len() < MIN_HISTORY_SAMPLES {
            return (current_funding.abs() / 0.001).min(1.0);
        }

        let mean = self.funding_history.mean();
        let std = self.funding_history.std_dev() + 1e-10;

        let zscore = (current_funding - mean).abs() / std;
        (zscore / 3.0).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn state(oi: f64, funding: f64, long_liq: f64, short_liq: f64) -> LeverageState {
        LeverageState::new(oi, funding, long_liq, short_liq, 10.0, 0.0).unwrap()
    }

    fn calculator() -> LeverageStressCalculator {
        LeverageStressCalculator::new(&StressConfig::default())
    }

    #[test]
    fn cold_start_uses_absolute_thresholds() {
        let mut calc = calculator();
        let stress = calc.calculate(&state(5e9, 5e-4, 0.0, 0.0), 0.0, None);
        // 5e9 / 1e10 typical OI, |5e-4| / 1e-3 funding
        assert_relative_eq!(stress.oi_component, 0.5, epsilon = 1e-12);
        assert_relative_eq!(stress.funding_component, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn warm_oi_stress_is_percentile_based() {
        let mut calc = calculator();
        for _ in 0..20 {
            calc.calculate(&state(1e10, 1e-4, 0.0, 0.0), 0.0, None);
        }
        // At the historical median -> zero stress
        let stress = calc.calculate(&state(1e10, 1e-4, 0.0, 0.0), 0.0, None);
        assert_eq!(stress.oi_component, 0.0);

        // Push a ramp so the max exceeds the median, then probe above it
        for i in 0..20 {
            calc.calculate(&state(1e10 + i as f64 * 1e9, 1e-4, 0.0, 0.0), 0.0, None);
        }
        let stress = calc.calculate(&state(2.5e10, 1e-4, 0.0, 0.0), 0.0, None);
        assert!(stress.oi_component > 0.5);
    }

    #[test]
    fn warm_funding_stress_is_zscore_based() {
        let mut calc = calculator();
        for _ in 0..30 {
            calc.calculate(&state(1e10, 1e-4, 0.0, 0.0), 0.0, None);
        }
        // Far outside the observed distribution saturates at 3 sigma
        let stress = calc.calculate(&state(1e10, 5e-3, 0.0, 0.0), 0.0, None);
        assert_eq!(stress.funding_component, 1.0);
    }

    #[test]
    fn liquidation_stress_saturates_at_five_times_typical() {
        let mut calc = calculator();
        let stress = calc.calculate(&state(1e9, 0.0, 1e8, 5e7), 0.0, None);
        assert_relative_eq!(stress.liquidation_component, 0.6, epsilon = 1e-12);

        let stress = calc.calculate(&state(1e9, 0.0, 1e10, 1e10), 0.0, None);
        assert_eq!(stress.liquidation_component, 1.0);
    }

    #[test]
    fn divergence_stress_captures_funding_against_price() {
        let mut calc = calculator();
        // Positive funding with falling price
        let stress = calc.calculate(&state(1e9, 5e-3, 0.0, 0.0), -0.05, None);
        assert_relative_eq!(stress.divergence_component, 5e-3 * 0.05 * 10.0, epsilon = 1e-12);

        // Positive funding with rising price -> clipped at zero
        let stress = calc.calculate(&state(1e9, 5e-3, 0.0, 0.0), 0.05, None);
        assert_eq!(stress.divergence_component, 0.0);
    }

    #[test]
    fn history_is_capped() {
        let mut config = StressConfig::default();
        config.history_capacity = 16;
        let mut calc = LeverageStressCalculator::new(&config);
        for i in 0..100 {
            calc.calculate(&state(1e9 + i as f64, 1e-4, 0.0, 0.0), 0.0, None);
        }
        assert_eq!(calc.oi_history.len(), 16);
        assert_eq!(calc.funding_history.len(), 16);
    }

    #[test]
    fn components_and_composite_stay_in_unit_interval() {
        let mut calc = calculator();
        let stress = calc.calculate(&state(1e12, 0.05, 1e10, 1e10), -0.5, None);
        for component in [
            stress.score,
            stress.oi_component,
            stress.funding_component,
            stress.liquidation_component,
            stress.divergence_component,
            stress.usdt_component,
        ] {
            assert!((0.0..=1.0).contains(&component));
        }
    }
}
