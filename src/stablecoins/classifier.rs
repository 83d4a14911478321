// Stablecoin Flow Classifier
// Scores a single flow event as inventory rebalancing, leverage
// enablement, or genuine capital.

use serde::{Deserialize, Serialize};

use crate::errors::{validate_finite, validate_non_negative, validate_unit_interval, OracleResult};
use crate::models::stablecoin::{FlowClassification, FlowType};

/// A single observed stablecoin flow event with its derivatives context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowEvent {
    pub flow_type: FlowType,
    pub mint_amount: f64,
    pub mint_frequency_24h: u32,
    /// Share of the flow routed to derivatives venues
    pub derivatives_venue_ratio: f64,
    /// Share of the flow routed to spot venues
    pub spot_venue_ratio: f64,
    pub oi_change_1h: f64,
    pub funding_rate: f64,
    pub funding_rate_change: f64,
}

impl FlowEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        flow_type: FlowType,
        mint_amount: f64,
        mint_frequency_24h: u32,
        derivatives_venue_ratio: f64,
        spot_venue_ratio: f64,
        oi_change_1h: f64,
        funding_rate: f64,
        funding_rate_change: f64,
    ) -> OracleResult<Self> {
        Ok(Self {
            flow_type,
            mint_amount: validate_non_negative(mint_amount, "flow_event.mint_amount")?,
            mint_frequency_24h,
            derivatives_venue_ratio: validate_unit_interval(
                derivatives_venue_ratio,
                "flow_event.derivatives_venue_ratio",
            )?,
            spot_venue_ratio: validate_unit_interval(spot_venue_ratio, "flow_event.spot_venue_ratio")?,
            oi_change_1h: validate_finite(oi_change_1h, "flow_event.oi_change_1h")?,
            funding_rate: validate_finite(funding_rate, "flow_event.funding_rate")?,
            funding_rate_change: validate_finite(
                funding_rate_change,
                "flow_event.funding_rate_change",
            )?,
        })
    }
}

/// Market-impact label attached to a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketImpact {
    Neutral,
    AmplifyVolatility,
    ConfirmTrend,
}

/// Result of classifying one flow event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub classification: FlowClassification,
    pub confidence: f64,
    pub market_impact: MarketImpact,
}

/// Classifies stablecoin flow events by their market impact.
pub struct FlowClassifier;

impl FlowClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, event: &FlowEvent) -> ClassificationResult {
        let is_large_mint = event.mint_amount > 100_000_000.0;
        let is_high_frequency = event.mint_frequency_24h > 5;
        let is_derivatives_heavy = event.derivatives_venue_ratio > 0.6;
        let is_spot_heavy = event.spot_venue_ratio > 0.6;
        let oi_increasing = event.oi_change_1h > 0.01;
        let funding_accelerating = event.funding_rate_change.abs() > 0.0001;

        let mut inventory_score: f64 = 0.0;
        if !is_large_mint {
            inventory_score += 0.3;
        }
        if event.derivatives_venue_ratio > 0.3 && event.derivatives_venue_ratio < 0.7 {
            inventory_score += 0.3;
        }
        if !oi_increasing {
            inventory_score += 0.2;
        }
        if !funding_accelerating {
            inventory_score += 0.2;
        }

        let mut leverage_score: f64 = 0.0;
        if is_large_mint || is_high_frequency {
            leverage_score += 0.3;
        }
        if is_derivatives_heavy {
            leverage_score += 0.3;
        }
        if oi_increasing {
            leverage_score += 0.2;
        }
        if funding_accelerating {
            leverage_score += 0.1;
        }
        if event.flow_type == FlowType::Usdt {
            leverage_score += 0.1;
        }

        let mut capital_score: f64 = 0.0;
        if event.mint_frequency_24h < 3 {
            capital_score += 0.2;
        }
        if is_spot_heavy {
            capital_score += 0.3;
        }
        if !oi_increasing {
            capital_score += 0.2;
        }
        if event.funding_rate.abs() < 0.0005 {
            capital_score += 0.2;
        }
        if event.flow_type == FlowType::Usdc {
            capital_score += 0.1;
        }

        let mut best = (FlowClassification::InventoryRebalancing, inventory_score);
        for candidate in [
            (FlowClassification::LeverageEnablement, leverage_score),
            (FlowClassification::GenuineCapital, capital_score),
        ] {
            if candidate.1 > best.1 {
                best = candidate;
            }
        }
        let (classification, score) = best;

        let market_impact = match classification {
            FlowClassification::InventoryRebalancing => MarketImpact::Neutral,
            FlowClassification::LeverageEnablement => MarketImpact::AmplifyVolatility,
            FlowClassification::GenuineCapital => MarketImpact::ConfirmTrend,
        };

        ClassificationResult {
            classification,
            confidence: score.min(1.0),
            market_impact,
        }
    }
}

impl Default for FlowClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn large_derivatives_usdt_mint_reads_as_leverage() {
        let classifier = FlowClassifier::new();
        let event = FlowEvent::new(FlowType::Usdt, 5e8, 8, 0.8, 0.1, 0.03, 0.0008, 0.0003).unwrap();
        let result = classifier.classify(&event);
        assert_eq!(result.classification, FlowClassification::LeverageEnablement);
        assert_eq!(result.market_impact, MarketImpact::AmplifyVolatility);
        assert!(result.confidence >= 0.9);
    }

    #[test]
    fn gradual_spot_usdc_reads_as_capital() {
        let classifier = FlowClassifier::new();
        let event = FlowEvent::new(FlowType::Usdc, 2e8, 1, 0.1, 0.8, 0.0, 0.0001, 0.0).unwrap();
        let result = classifier.classify(&event);
        assert_eq!(result.classification, FlowClassification::GenuineCapital);
        assert_eq!(result.market_impact, MarketImpact::ConfirmTrend);
    }

    #[test]
    fn small_balanced_flow_reads_as_inventory() {
        let classifier = FlowClassifier::new();
        let event = FlowEvent::new(FlowType::Usdt, 5e7, 4, 0.5, 0.5, 0.0, 0.0, 0.0).unwrap();
        let result = classifier.classify(&event);
        assert_eq!(result.classification, FlowClassification::InventoryRebalancing);
        assert_eq!(result.market_impact, MarketImpact::Neutral);
    }
}
