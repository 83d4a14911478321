// USDT Flow Model
// USDT flows are treated as leverage fuel, not capital: they widen the
// expected volatility and cut trust in spot inputs instead of moving the
// true-price estimate.

use crate::config::StablecoinConfig;
use crate::models::leverage::LeverageState;
use crate::models::stablecoin::USDTImpact;
use crate::stablecoins::analyzer::StablecoinFlowData;

pub struct USDTFlowModel {
    config: StablecoinConfig,
}

impl USDTFlowModel {
    pub fn new(config: &StablecoinConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Compute the impact of USDT flows on the true-price model.
    pub fn compute_impact(
        &self,
        flow_data: &StablecoinFlowData,
        leverage_state: Option<&LeverageState>,
    ) -> USDTImpact {
        let mint_normalized = normalize(
            flow_data.usdt_mint_volume_24h,
            self.config.usdt_typical_mint_volume,
        );
        let derivatives_normalized = normalize(
            flow_data.usdt_derivatives_flow,
            self.config.usdt_typical_derivatives_flow,
        );

        let oi_correlation = match leverage_state {
            Some(state) if !flow_data.usdt_hourly_flows.is_empty() => {
                self.oi_correlation(flow_data, state)
            }
            _ => 0.0,
        };

        // Large USDT flows toward derivatives venues foreshadow volatility
        let derivatives_ratio = flow_data.usdt_derivatives_flow
            / (flow_data.usdt_derivatives_flow + flow_data.usdt_spot_flow + 1.0);

        let vol_multiplier = (self.config.usdt_volatility_mult_base
            + 0.5 * mint_normalized
            + 0.3 * derivatives_ratio
            + 0.2 * oi_correlation.max(0.0))
        .clamp(
            self.config.usdt_volatility_mult_base,
            self.config.usdt_volatility_mult_max,
        );

        // Leverage-reflecting spot prices deserve less trust
        let trust_reduction = (0.5 * (vol_multiplier - 1.0)).clamp(0.0, 1.0);

        // Concentrated derivatives flows raise the manipulation prior
        let manip_adjustment = (0.2 * derivatives_normalized).clamp(0.0, 0.3);

        USDTImpact {
            volatility_multiplier: vol_multiplier,
            trust_reduction,
            manipulation_prob_adjustment: manip_adjustment,
        }
    }

    /// Coarse correlation between recent USDT flow and the 5-minute OI
    /// delta. A recent flow spike that coincides with rising OI reads as
    /// leverage enablement. Callers with high-resolution OI history may
    /// substitute a true lagged cross-correlation.
    fn oi_correlation(&self, flow_data: &StablecoinFlowData, leverage_state: &LeverageState) -> f64 {
        let flows = &flow_data.usdt_hourly_flows;
        if flows.len() < 5 || leverage_state.open_interest == 0.0 {
            return 0.0;
        }

        let recent = statistical::mean(&flows[flows.len() - 4..]);
        let typical = statistical::mean(flows) + 1e-10;

        if recent > typical * 1.5 {
            if leverage_state.oi_change_5m > 0.01 {
                return 0.8;
            } else if leverage_state.oi_change_5m > 0.0 {
                return 0.5;
            }
            return 0.2;
        }
        0.0
    }
}

fn normalize(value: f64, typical: f64) -> f64 {
    if typical == 0.0 {
        return 0.0;
    }
    (value / typical).min(2.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn flow_data(mint: f64, derivatives: f64, spot: f64, hourly: Vec<f64>) -> StablecoinFlowData {
        StablecoinFlowData::builder()
            .usdt(mint, derivatives, spot, hourly)
            .usdc(1e8, 5e7, 2e7, 1e7, 0.0)
            .build()
            .unwrap()
    }

    fn leverage(oi_change_5m: f64) -> LeverageState {
        LeverageState::new(5e9, 1e-4, 1e6, 1e6, 10.0, oi_change_5m).unwrap()
    }

    #[test]
    fn multiplier_stays_within_configured_band() {
        let model = USDTFlowModel::new(&StablecoinConfig::default());

        let calm = model.compute_impact(&flow_data(0.0, 0.0, 0.0, vec![]), None);
        assert_relative_eq!(calm.volatility_multiplier, 1.0, epsilon = 1e-12);

        let extreme = model.compute_impact(
            &flow_data(5e9, 5e9, 0.0, vec![1e9; 24]),
            Some(&leverage(0.05)),
        );
        assert!(extreme.volatility_multiplier <= 3.0);
        assert!(extreme.volatility_multiplier >= 1.0);
    }

    #[test]
    fn trust_reduction_tracks_multiplier() {
        let model = USDTFlowModel::new(&StablecoinConfig::default());
        let impact = model.compute_impact(&flow_data(1e9, 6e8, 1e8, vec![]), None);
        assert_relative_eq!(
            impact.trust_reduction,
            0.5 * (impact.volatility_multiplier - 1.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn manipulation_adjustment_capped() {
        let model = USDTFlowModel::new(&StablecoinConfig::default());
        let impact = model.compute_impact(&flow_data(0.0, 1e10, 0.0, vec![]), None);
        assert_relative_eq!(impact.manipulation_prob_adjustment, 0.3, epsilon = 1e-12);
    }

    #[test]
    fn oi_correlation_requires_history_and_spike() {
        let model = USDTFlowModel::new(&StablecoinConfig::default());

        // Short history -> no correlation contribution
        let short = flow_data(5e8, 3e8, 1e8, vec![1e8; 3]);
        assert_eq!(model.oi_correlation(&short, &leverage(0.05)), 0.0);

        // Flat history -> no spike
        let flat = flow_data(5e8, 3e8, 1e8, vec![1e8; 24]);
        assert_eq!(model.oi_correlation(&flat, &leverage(0.05)), 0.0);

        // Spike in the last 4 hours, graded by OI delta
        let mut spiky = vec![1e7; 20];
        spiky.extend([1e9; 4]);
        let spike = flow_data(5e8, 3e8, 1e8, spiky);
        assert_eq!(model.oi_correlation(&spike, &leverage(0.05)), 0.8);
        assert_eq!(model.oi_correlation(&spike, &leverage(0.005)), 0.5);
        assert_eq!(model.oi_correlation(&spike, &leverage(-0.01)), 0.2);
    }
}
