// Liquidation Cascade Detector
// Five weighted signals: OI drop, liquidation spike, price/volume
// divergence, funding-price alignment, and stablecoin pressure.

use tracing::{debug, warn};

use crate::config::CascadeConfig;
use crate::models::leverage::{CascadeDetection, CascadeDirection, LeverageState};
use crate::models::stablecoin::StablecoinState;

/// Detects whether a liquidation cascade is in progress.
pub struct CascadeDetector {
    config: CascadeConfig,
}

impl CascadeDetector {
    pub fn new(config: &CascadeConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn detect(
        &self,
        leverage_state: &LeverageState,
        price_return_5m: f64,
        spot_volume_5m: f64,
        stablecoin_state: Option<&StablecoinState>,
    ) -> CascadeDetection {
        // Signal 1: OI dropping fast (>5% in 5 minutes is the cascade signature)
        let oi_drop_signal = (leverage_state.oi_change_5m.abs() / 0.05).min(1.0);

        // Signal 2: liquidation volume spiking past 5x typical
        let liq_ratio =
            leverage_state.total_liquidations_1h() / self.config.typical_liquidation_volume;
        let liq_spike_signal = (liq_ratio / 5.0).min(1.0);

        // Signal 3: price moving faster than spot volume justifies
        let divergence_signal = if spot_volume_5m > 0.0 {
            let expected_move = (spot_volume_5m / 1e9).min(0.02);
            let actual_move = price_return_5m.abs();
            let divergence_ratio = actual_move / (expected_move + 1e-10);
            ((divergence_ratio - 1.0) / 4.0).clamp(0.0, 1.0)
        } else {
            0.0
        };

        // Signal 4: funding and price moving together (abnormal outside a squeeze)
        let funding_price_alignment = if leverage_state.funding_rate * price_return_5m > 0.0 {
            (leverage_state.funding_rate.abs() * 100.0).min(1.0)
        } else {
            0.0
        };

        // Signal 5: leverage-enabled stablecoin context
        let stablecoin_signal = stablecoin_state
            .map(|s| s.flow_ratio.manipulation_probability)
            .unwrap_or(0.0);

        let confidence = 0.25 * oi_drop_signal
            + 0.30 * liq_spike_signal
            + 0.15 * divergence_signal
            + 0.10 * funding_price_alignment
            + 0.20 * stablecoin_signal;

        if confidence > self.config.confidence_threshold {
            let direction =
                if leverage_state.long_liquidations_1h > leverage_state.short_liquidations_1h {
                    CascadeDirection::LongSqueeze
                } else {
                    CascadeDirection::ShortSqueeze
                };
            warn!(confidence, ?direction, "liquidation cascade detected");
            CascadeDetection::detected(confidence, direction)
        } else {
            debug!(confidence, "no cascade");
            CascadeDetection::no_cascade(confidence)
        }
    }
}

/// Probability that a cascade is imminent rather than in progress.
pub struct PrecascadeRiskCalculator;

impl PrecascadeRiskCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Combine proximity to the nearest liquidation cluster, funding
    /// extremity, leverage elevation, order-book thinness, and USDT
    /// dominance into a pre-cascade risk score in [0, 1].
    pub fn compute_risk(
        &self,
        leverage_state: &LeverageState,
        price_distance_to_liquidation_cluster: f64,
        orderbook_thinness: f64,
        stablecoin_state: Option<&StablecoinState>,
    ) -> f64 {
        let proximity_risk = (1.0 - price_distance_to_liquidation_cluster / 0.05).max(0.0);

        let funding_risk = (leverage_state.funding_rate.abs() / 0.001).min(1.0);

        let oi_risk = if leverage_state.leverage_ratio > 20.0 { 0.5 } else { 0.2 };

        let thinness_risk = orderbook_thinness;

        let usdt_risk = match stablecoin_state {
            Some(state) if state.flow_ratio.usdt_dominant => 0.8,
            _ => 0.0,
        };

        let risk = 0.30 * proximity_risk
            + 0.20 * funding_risk
            + 0.15 * oi_risk
            + 0.15 * thinness_risk
            + 0.20 * usdt_risk;
        risk.min(1.0)
    }
}

impl Default for PrecascadeRiskCalculator {
    fn default() -> Self {
        Self::new()
    }
}
