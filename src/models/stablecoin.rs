// Stablecoin Flow Data Models
// USDT/USDC flow state consumed by the covariance manager and classifiers

use serde::{Deserialize, Serialize};

/// Stablecoin type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowType {
    Usdt,
    Usdc,
}

/// Classification of a stablecoin flow event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowClassification {
    /// Neutral market-making activity
    InventoryRebalancing,
    /// Fuel for derivatives positions
    LeverageEnablement,
    /// Real investment inflow
    GenuineCapital,
}

/// Price direction context for flow analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceDirection {
    Up,
    Down,
    Neutral,
}

/// USDC-derived regime signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegimeSignal {
    Trend,
    Manipulation,
    Uncertain,
}

/// USDT/USDC flow ratio with regime indicators.
///
/// Interpretation:
///   > 2.0: USDT-dominant (high leverage risk, manipulation likely)
///   1.0-2.0: mixed, moderate leverage
///   < 0.5: USDC-dominant (genuine capital, trend likely)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRatio {
    pub ratio: f64,
    pub usdt_dominant: bool,
    pub usdc_dominant: bool,
    pub manipulation_probability: f64,
}

impl FlowRatio {
    /// Compute the flow ratio from aggregate USDT and USDC flows.
    pub fn from_flows(usdt_flow: f64, usdc_flow: f64) -> Self {
        let ratio = usdt_flow / (usdc_flow + 1e-10);
        // Logistic: P = 1 / (1 + exp(-1.5 * (ratio - 2)))
        let manipulation_probability = 1.0 / (1.0 + (-1.5 * (ratio - 2.0)).exp());
        Self {
            ratio,
            usdt_dominant: ratio > 2.0,
            usdc_dominant: ratio < 0.5,
            manipulation_probability,
        }
    }
}

/// Impact of USDT flows on the true-price model.
///
/// USDT flows do not move the estimate directly; they widen expected
/// volatility, reduce trust in spot inputs, and raise the manipulation
/// probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct USDTImpact {
    pub volatility_multiplier: f64,
    pub trust_reduction: f64,
    pub manipulation_prob_adjustment: f64,
}

/// Impact of USDC flows on the true-price model.
///
/// USDC flows marginally raise confidence in slow drift and help separate
/// trend from manipulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct USDCImpact {
    pub drift_confidence_adjustment: f64,
    pub regime_signal: RegimeSignal,
    pub confidence: f64,
}

/// Complete stablecoin flow state for one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StablecoinState {
    pub usdt_impact: USDTImpact,
    pub usdc_impact: USDCImpact,
    pub flow_ratio: FlowRatio,
}

impl StablecoinState {
    /// Combined volatility multiplier from stablecoin context.
    pub fn volatility_multiplier(&self) -> f64 {
        self.usdt_impact.volatility_multiplier
    }
}
