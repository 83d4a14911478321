// Stablecoin Flow Analyzer
// Asymmetric treatment of the two majors:
//   USDT flows -> volatility amplifier (raises observation noise)
//   USDC flows -> capital validator (confirms trend direction)

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{StablecoinConfig, VenueConfig};
use crate::errors::{validate_finite, validate_non_negative, OracleError, OracleResult};
use crate::models::leverage::LeverageState;
use crate::models::stablecoin::{FlowRatio, PriceDirection, RegimeSignal, StablecoinState};
use crate::stablecoins::usdc_model::USDCFlowModel;
use crate::stablecoins::usdt_model::USDTFlowModel;

/// Hourly flow history never exceeds one day of samples.
pub const MAX_HOURLY_FLOWS: usize = 24;

/// Raw stablecoin flow data for one tick. Construct through
/// [`StablecoinFlowData::builder`], which enforces the numeric invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StablecoinFlowData {
    // USDT side
    pub usdt_mint_volume_24h: f64,
    pub usdt_derivatives_flow: f64,
    pub usdt_spot_flow: f64,
    /// Past 24 hours, most recent last, length <= 24
    pub usdt_hourly_flows: Vec<f64>,

    // USDC side
    pub usdc_mint_volume_24h: f64,
    pub usdc_spot_flow: f64,
    pub usdc_custody_flow: f64,
    pub usdc_defi_flow: f64,
    pub usdc_burn_volume_24h: f64,

    // Price context
    pub price_return_24h: f64,
    pub price_direction: PriceDirection,
}

impl StablecoinFlowData {
    pub fn builder() -> StablecoinFlowDataBuilder {
        StablecoinFlowDataBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct StablecoinFlowDataBuilder {
    usdt_mint_volume_24h: f64,
    usdt_derivatives_flow: f64,
    usdt_spot_flow: f64,
    usdt_hourly_flows: Vec<f64>,
    usdc_mint_volume_24h: f64,
    usdc_spot_flow: f64,
    usdc_custody_flow: f64,
    usdc_defi_flow: f64,
    usdc_burn_volume_24h: f64,
    price_return_24h: f64,
    price_direction: Option<PriceDirection>,
}

impl StablecoinFlowDataBuilder {
    pub fn usdt(mut self, mint_24h: f64, derivatives_flow: f64, spot_flow: f64, hourly: Vec<f64>) -> Self {
        self.usdt_mint_volume_24h = mint_24h;
        self.usdt_derivatives_flow = derivatives_flow;
        self.usdt_spot_flow = spot_flow;
        self.usdt_hourly_flows = hourly;
        self
    }

    pub fn usdc(mut self, mint_24h: f64, spot_flow: f64, custody_flow: f64, defi_flow: f64, burn_24h: f64) -> Self {
        self.usdc_mint_volume_24h = mint_24h;
        self.usdc_spot_flow = spot_flow;
        self.usdc_custody_flow = custody_flow;
        self.usdc_defi_flow = defi_flow;
        self.usdc_burn_volume_24h = burn_24h;
        self
    }

    pub fn price_context(mut self, return_24h: f64, direction: PriceDirection) -> Self {
        self.price_return_24h = return_24h;
        self.price_direction = Some(direction);
        self
    }

    pub fn build(self) -> OracleResult<StablecoinFlowData> {
        if self.usdt_hourly_flows.len() > MAX_HOURLY_FLOWS {
            return Err(OracleError::InvalidInput(format!(
                "usdt_hourly_flows holds {} samples, maximum is {}",
                self.usdt_hourly_flows.len(),
                MAX_HOURLY_FLOWS
            )));
        }
        for (i, flow) in self.usdt_hourly_flows.iter().enumerate() {
            validate_finite(*flow, &format!("usdt_hourly_flows[{}]", i))?;
        }
        Ok(StablecoinFlowData {
            usdt_mint_volume_24h: validate_non_negative(self.usdt_mint_volume_24h, "usdt_mint_volume_24h")?,
            usdt_derivatives_flow: validate_non_negative(self.usdt_derivatives_flow, "usdt_derivatives_flow")?,
            usdt_spot_flow: validate_non_negative(self.usdt_spot_flow, "usdt_spot_flow")?,
            usdt_hourly_flows: self.usdt_hourly_flows,
            usdc_mint_volume_24h: validate_non_negative(self.usdc_mint_volume_24h, "usdc_mint_volume_24h")?,
            usdc_spot_flow: validate_non_negative(self.usdc_spot_flow, "usdc_spot_flow")?,
            usdc_custody_flow: validate_non_negative(self.usdc_custody_flow, "usdc_custody_flow")?,
            usdc_defi_flow: validate_non_negative(self.usdc_defi_flow, "usdc_defi_flow")?,
            usdc_burn_volume_24h: validate_non_negative(self.usdc_burn_volume_24h, "usdc_burn_volume_24h")?,
            price_return_24h: validate_finite(self.price_return_24h, "price_return_24h")?,
            price_direction: self.price_direction.unwrap_or(PriceDirection::Neutral),
        })
    }
}

/// Kalman filter parameter adjustments derived from the stablecoin state.
#[derive(Debug, Clone, PartialEq)]
pub struct KalmanAdjustments {
    /// Multiplier for the observation noise (from USDT)
    pub observation_noise_mult: f64,
    /// Multiplier for the process noise (from USDC)
    pub process_noise_mult: f64,
    usdt_dominant: bool,
}

impl KalmanAdjustments {
    /// Venue weight multiplier under the current stablecoin context.
    /// While USDT dominates, derivatives-heavy venues are down-weighted
    /// and centralized spot venues are boosted; decentralized venues are
    /// left alone. Higher weight means lower observation variance.
    pub fn venue_weight(&self, venue: &VenueConfig) -> f64 {
        if !self.usdt_dominant {
            return 1.0;
        }
        if venue.has_derivatives {
            (1.2 - venue.derivatives_ratio).clamp(0.5, 0.6)
        } else if venue.is_decentralized {
            1.0
        } else {
            1.2
        }
    }
}

/// Turns raw flows into the covariance modifiers and venue-weight
/// adjustments consumed by the filter. `analyze` is pure and
/// deterministic.
pub struct StablecoinFlowAnalyzer {
    usdt_model: USDTFlowModel,
    usdc_model: USDCFlowModel,
}

impl StablecoinFlowAnalyzer {
    pub fn new(config: &StablecoinConfig) -> Self {
        Self {
            usdt_model: USDTFlowModel::new(config),
            usdc_model: USDCFlowModel::new(config),
        }
    }

    /// Compute the full stablecoin state for one tick.
    pub fn analyze(
        &self,
        flow_data: &StablecoinFlowData,
        leverage_state: Option<&LeverageState>,
    ) -> StablecoinState {
        let usdt_impact = self.usdt_model.compute_impact(flow_data, leverage_state);
        let usdc_impact = self.usdc_model.compute_impact(flow_data);
        let flow_ratio = Self::flow_ratio(flow_data);

        debug!(
            ratio = flow_ratio.ratio,
            usdt_dominant = flow_ratio.usdt_dominant,
            usdc_dominant = flow_ratio.usdc_dominant,
            vol_mult = usdt_impact.volatility_multiplier,
            "stablecoin flows analyzed"
        );

        StablecoinState {
            usdt_impact,
            usdc_impact,
            flow_ratio,
        }
    }

    /// USDT/USDC flow ratio as a regime indicator. Derivatives + spot on
    /// the USDT side; spot + custody + DeFi on the USDC side.
    fn flow_ratio(flow_data: &StablecoinFlowData) -> FlowRatio {
        let usdt_total = flow_data.usdt_derivatives_flow + flow_data.usdt_spot_flow;
        let usdc_total =
            flow_data.usdc_spot_flow + flow_data.usdc_custody_flow + flow_data.usdc_defi_flow;
        FlowRatio::from_flows(usdt_total, usdc_total)
    }

    /// Kalman parameter adjustments for the current state.
    pub fn kalman_adjustments(&self, state: &StablecoinState) -> KalmanAdjustments {
        let observation_noise_mult = state.usdt_impact.volatility_multiplier;

        let process_noise_mult = if state.usdc_impact.regime_signal == RegimeSignal::Trend {
            1.0 + 0.2 * state.usdc_impact.drift_confidence_adjustment
        } else {
            1.0
        };

        KalmanAdjustments {
            observation_noise_mult,
            process_noise_mult,
            usdt_dominant: state.flow_ratio.usdt_dominant,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StablecoinConfig;
    use approx::assert_relative_eq;

    fn usdt_dominant_data() -> StablecoinFlowData {
        StablecoinFlowData::builder()
            .usdt(1.5e9, 1.2e9, 1e8, vec![5e7; 24])
            .usdc(5e7, 3e7, 1e7, 5e6, 0.0)
            .build()
            .unwrap()
    }

    #[test]
    fn analyze_is_deterministic() {
        let analyzer = StablecoinFlowAnalyzer::new(&StablecoinConfig::default());
        let data = usdt_dominant_data();
        let a = analyzer.analyze(&data, None);
        let b = analyzer.analyze(&data, None);
        assert_eq!(a, b);
    }

    #[test]
    fn builder_rejects_invalid_flows() {
        assert!(StablecoinFlowData::builder()
            .usdt(-1.0, 0.0, 0.0, vec![])
            .build()
            .is_err());
        assert!(StablecoinFlowData::builder()
            .usdt(0.0, f64::NAN, 0.0, vec![])
            .build()
            .is_err());
        assert!(StablecoinFlowData::builder()
            .usdt(0.0, 0.0, 0.0, vec![0.0; 25])
            .build()
            .is_err());
    }

    #[test]
    fn venue_weights_follow_descriptor_rules() {
        let analyzer = StablecoinFlowAnalyzer::new(&StablecoinConfig::default());
        let state = analyzer.analyze(&usdt_dominant_data(), None);
        assert!(state.flow_ratio.usdt_dominant);
        let adjustments = analyzer.kalman_adjustments(&state);

        let binance = VenueConfig::new("binance", 0.5).with_derivatives(0.7);
        let okx = VenueConfig::new("okx", 0.5).with_derivatives(0.6);
        let coinbase = VenueConfig::new("coinbase", 0.8).usdc_primary();
        let kraken = VenueConfig::new("kraken", 0.8);
        let uniswap = VenueConfig::new("uniswap", 0.6).decentralized();

        assert_relative_eq!(adjustments.venue_weight(&binance), 0.5, epsilon = 1e-12);
        assert_relative_eq!(adjustments.venue_weight(&okx), 0.6, epsilon = 1e-12);
        assert_relative_eq!(adjustments.venue_weight(&coinbase), 1.2, epsilon = 1e-12);
        assert_relative_eq!(adjustments.venue_weight(&kraken), 1.2, epsilon = 1e-12);
        assert_relative_eq!(adjustments.venue_weight(&uniswap), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn venue_weights_neutral_without_usdt_dominance() {
        let analyzer = StablecoinFlowAnalyzer::new(&StablecoinConfig::default());
        let data = StablecoinFlowData::builder()
            .usdt(1e8, 5e7, 5e7, vec![])
            .usdc(4e8, 3e8, 5e7, 2e7, 0.0)
            .build()
            .unwrap();
        let state = analyzer.analyze(&data, None);
        assert!(!state.flow_ratio.usdt_dominant);
        let adjustments = analyzer.kalman_adjustments(&state);

        let binance = VenueConfig::new("binance", 0.5).with_derivatives(0.7);
        assert_relative_eq!(adjustments.venue_weight(&binance), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn process_noise_mult_only_in_trend() {
        let analyzer = StablecoinFlowAnalyzer::new(&StablecoinConfig::default());

        let trending = StablecoinFlowData::builder()
            .usdt(1e7, 1e7, 1e7, vec![])
            .usdc(5e8, 4e8, 1e8, 5e7, 0.0)
            .price_context(0.05, PriceDirection::Up)
            .build()
            .unwrap();
        let state = analyzer.analyze(&trending, None);
        assert_eq!(state.usdc_impact.regime_signal, RegimeSignal::Trend);
        let adjustments = analyzer.kalman_adjustments(&state);
        assert!(adjustments.process_noise_mult > 1.0);

        let state = analyzer.analyze(&usdt_dominant_data(), None);
        let adjustments = analyzer.kalman_adjustments(&state);
        assert_relative_eq!(adjustments.process_noise_mult, 1.0, epsilon = 1e-12);
    }
}
