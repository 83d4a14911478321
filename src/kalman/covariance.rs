// Time-Varying Covariance Matrices
// Observation noise widens with leverage stress, degraded order books,
// cascades, and USDT flows; it tightens when USDC confirms the trend.

use nalgebra::DMatrix;

use crate::config::{KalmanConfig, VenueConfig};
use crate::errors::{OracleError, OracleResult};
use crate::models::leverage::LeverageStress;
use crate::models::stablecoin::{RegimeSignal, StablecoinState};

/// Builds the time-varying `Q` and per-venue `R` entries for the filter.
#[derive(Debug, Clone)]
pub struct CovarianceManager {
    config: KalmanConfig,
}

impl CovarianceManager {
    pub fn new(config: &KalmanConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Process noise for one predict step. USDC-confirmed trends allow the
    /// true price to drift faster.
    pub fn process_noise(
        &self,
        q_base: &DMatrix<f64>,
        stablecoin_state: Option<&StablecoinState>,
    ) -> DMatrix<f64> {
        let mut multiplier = 1.0;

        if let Some(state) = stablecoin_state {
            let usdc = &state.usdc_impact;
            if usdc.regime_signal == RegimeSignal::Trend {
                multiplier = 1.0 + 0.2 * usdc.drift_confidence_adjustment;
            }
        }

        q_base * multiplier
    }

    /// Observation variance for a single venue. `venue_weight` is the
    /// stablecoin-context weight multiplier: a higher weight means a more
    /// trusted venue and therefore a lower variance.
    pub fn observation_variance(
        &self,
        venue: &VenueConfig,
        leverage_stress: Option<&LeverageStress>,
        orderbook_quality: f64,
        stablecoin_state: Option<&StablecoinState>,
        is_cascade: bool,
        venue_weight: f64,
    ) -> OracleResult<f64> {
        let base_variance = self.config.base_observation_var;

        // Higher reliability lowers the base variance
        let venue_mult = 2.0 - venue.base_reliability;

        // Up to 6x during peak leverage stress
        let leverage_mult = match leverage_stress {
            Some(stress) => 1.0 + stress.score * 5.0,
            None => 1.0,
        };

        // Up to 4x for a fully degraded order book
        let quality_mult = 1.0 + (1.0 - orderbook_quality) * 3.0;

        // Heavily discount venue prices while a cascade runs
        let cascade_mult = if is_cascade { 10.0 } else { 1.0 };

        let mut usdt_mult = 1.0;
        let mut usdc_adj = 1.0;
        let mut derivatives_mult = 1.0;
        if let Some(state) = stablecoin_state {
            usdt_mult = state.usdt_impact.volatility_multiplier;

            if state.usdc_impact.regime_signal == RegimeSignal::Trend {
                usdc_adj = 0.9;
            }

            // Derivatives venues are penalized while USDT dominates
            if venue.has_derivatives && state.flow_ratio.usdt_dominant {
                derivatives_mult = 1.5;
            }
        }

        let variance = base_variance
            * venue_mult
            * leverage_mult
            * quality_mult
            * cascade_mult
            * usdt_mult
            * usdc_adj
            * derivatives_mult
            / venue_weight;

        if !(variance > 0.0 && variance.is_finite()) {
            return Err(OracleError::NumericalInstability(format!(
                "observation variance for venue '{}' degenerated to {}",
                venue.name, variance
            )));
        }
        Ok(variance)
    }
}

/// Weighted trimmed median across venue prices. Trims `trim_pct` of the
/// extreme observations from each end, then takes the weight-balanced
/// median of the remainder. Falls back to the plain median when trimming
/// exhausts the sample.
pub fn weighted_trimmed_median(
    prices: &[f64],
    weights: &[f64],
    trim_pct: f64,
) -> OracleResult<f64> {
    if prices.is_empty() {
        return Err(OracleError::InsufficientObservations { got: 0, min: 1 });
    }
    if prices.len() != weights.len() {
        return Err(OracleError::InvalidInput(format!(
            "price/weight length mismatch: {} vs {}",
            prices.len(),
            weights.len()
        )));
    }

    let mut indexed: Vec<(f64, f64)> = prices.iter().copied().zip(weights.iter().copied()).collect();
    indexed.sort_by(|a, b| a.0.total_cmp(&b.0));

    let n = indexed.len();
    let trim_n = (n as f64 * trim_pct) as usize;
    let trimmed: &[(f64, f64)] = if trim_n > 0 && n > 2 * trim_n {
        &indexed[trim_n..n - trim_n]
    } else if trim_n > 0 {
        &[]
    } else {
        &indexed[..]
    };

    if trimmed.is_empty() {
        let sorted: Vec<f64> = indexed.iter().map(|(p, _)| *p).collect();
        return Ok(statistical::median(&sorted));
    }

    let total_weight: f64 = trimmed.iter().map(|(_, w)| w).sum();
    let mut cumsum = 0.0;
    for (price, weight) in trimmed {
        cumsum += weight;
        if cumsum >= total_weight / 2.0 {
            return Ok(*price);
        }
    }
    Ok(trimmed[trimmed.len() - 1].0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::stablecoin::{FlowRatio, USDCImpact, USDTImpact};
    use approx::assert_relative_eq;

    fn state(vol_mult: f64, usdt_dominant: bool, trend: bool) -> StablecoinState {
        let ratio = if usdt_dominant { 3.0 } else { 1.0 };
        StablecoinState {
            usdt_impact: USDTImpact {
                volatility_multiplier: vol_mult,
                trust_reduction: 0.5 * (vol_mult - 1.0),
                manipulation_prob_adjustment: 0.0,
            },
            usdc_impact: USDCImpact {
                drift_confidence_adjustment: if trend { 0.1 } else { 0.0 },
                regime_signal: if trend { RegimeSignal::Trend } else { RegimeSignal::Uncertain },
                confidence: 0.5,
            },
            flow_ratio: FlowRatio::from_flows(ratio, 1.0 - 1e-10),
        }
    }

    #[test]
    fn process_noise_scales_only_in_trend() {
        let manager = CovarianceManager::new(&KalmanConfig::default());
        let q_base = DMatrix::from_diagonal(&nalgebra::DVector::from_vec(vec![1.0, 0.01]));

        let q = manager.process_noise(&q_base, Some(&state(1.0, false, true)));
        assert_relative_eq!(q[(0, 0)], 1.02, epsilon = 1e-12);

        let q = manager.process_noise(&q_base, Some(&state(1.0, false, false)));
        assert_relative_eq!(q[(0, 0)], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn observation_variance_product_chain() {
        let manager = CovarianceManager::new(&KalmanConfig::default());
        let venue = VenueConfig::new("kraken", 0.8);

        let calm = manager
            .observation_variance(&venue, None, 1.0, None, false, 1.0)
            .unwrap();
        assert_relative_eq!(calm, 10.0 * 1.2, epsilon = 1e-12);

        // Cascade multiplies by 10, weight 2 halves
        let stressed = manager
            .observation_variance(&venue, None, 1.0, None, true, 2.0)
            .unwrap();
        assert_relative_eq!(stressed, 10.0 * 1.2 * 10.0 / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn derivatives_penalty_requires_usdt_dominance() {
        let manager = CovarianceManager::new(&KalmanConfig::default());
        let venue = VenueConfig::new("binance", 0.5).with_derivatives(0.7);

        let dominated = manager
            .observation_variance(&venue, None, 1.0, Some(&state(2.0, true, false)), false, 1.0)
            .unwrap();
        let mixed = manager
            .observation_variance(&venue, None, 1.0, Some(&state(2.0, false, false)), false, 1.0)
            .unwrap();
        assert_relative_eq!(dominated / mixed, 1.5, epsilon = 1e-12);
    }

    #[test]
    fn variance_stays_strictly_positive() {
        let manager = CovarianceManager::new(&KalmanConfig::default());
        let venue = VenueConfig::new("coinbase", 1.0);
        let variance = manager
            .observation_variance(&venue, None, 1.0, None, false, 1.2)
            .unwrap();
        assert!(variance > 0.0);
    }

    #[test]
    fn trimmed_median_drops_outliers() {
        let prices = [30000.0, 30010.0, 30020.0, 30030.0, 30040.0, 30050.0, 30060.0, 30070.0, 30080.0, 45000.0];
        let weights = [1.0; 10];
        let median = weighted_trimmed_median(&prices, &weights, 0.1).unwrap();
        assert!(median < 31000.0);
    }

    #[test]
    fn trimmed_median_rejects_empty_input() {
        assert!(weighted_trimmed_median(&[], &[], 0.1).is_err());
    }
}
