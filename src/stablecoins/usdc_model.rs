// USDC Flow Model
// USDC flows to spot and custody are genuine buying power. They confirm
// drift direction and separate trend from manipulation.

use crate::config::StablecoinConfig;
use crate::models::stablecoin::{PriceDirection, RegimeSignal, USDCImpact};
use crate::stablecoins::analyzer::StablecoinFlowData;

pub struct USDCFlowModel {
    config: StablecoinConfig,
}

impl USDCFlowModel {
    pub fn new(config: &StablecoinConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Compute the impact of USDC flows on the true-price model.
    pub fn compute_impact(&self, flow_data: &StablecoinFlowData) -> USDCImpact {
        let spot_normalized = normalize(flow_data.usdc_spot_flow, self.config.usdc_typical_spot_flow);
        let custody_normalized =
            normalize(flow_data.usdc_custody_flow, self.config.usdc_typical_custody_flow);
        let defi_normalized = normalize(flow_data.usdc_defi_flow, self.config.usdc_typical_defi_flow);

        let capital_score =
            (0.5 * spot_normalized + 0.3 * custody_normalized + 0.2 * defi_normalized).min(1.0);

        // Confidence in drift rises only when flows align with the move:
        // mints above typical on the way up, burns on the way down
        let mut drift_confidence_adj = 0.0;
        match flow_data.price_direction {
            PriceDirection::Up => {
                if flow_data.usdc_mint_volume_24h > self.config.usdc_typical_spot_flow {
                    drift_confidence_adj =
                        (0.1 * capital_score).min(self.config.usdc_drift_confidence_max);
                }
            }
            PriceDirection::Down => {
                if flow_data.usdc_burn_volume_24h > 0.0 {
                    drift_confidence_adj =
                        (0.1 * capital_score).min(self.config.usdc_drift_confidence_max);
                }
            }
            PriceDirection::Neutral => {}
        }

        let (regime_signal, confidence) = Self::regime_signal(flow_data);

        USDCImpact {
            drift_confidence_adjustment: drift_confidence_adj,
            regime_signal,
            confidence,
        }
    }

    /// Whether current price action reads as trend or manipulation, from
    /// the USDC share of total stablecoin flow.
    fn regime_signal(flow_data: &StablecoinFlowData) -> (RegimeSignal, f64) {
        let usdc_flow =
            flow_data.usdc_spot_flow + flow_data.usdc_custody_flow + flow_data.usdc_defi_flow;
        let usdt_flow = flow_data.usdt_derivatives_flow + flow_data.usdt_spot_flow;

        let total_flow = usdc_flow + usdt_flow + 1e-10;
        let usdc_ratio = usdc_flow / total_flow;

        if usdc_ratio > 0.6 {
            (RegimeSignal::Trend, usdc_ratio)
        } else if usdc_ratio < 0.3 {
            (RegimeSignal::Manipulation, 1.0 - usdc_ratio)
        } else {
            (RegimeSignal::Uncertain, 0.5)
        }
    }
}

fn normalize(value: f64, typical: f64) -> f64 {
    if typical == 0.0 {
        return 0.0;
    }
    (value / typical).min(2.0)
}
