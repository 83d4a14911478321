// Leverage and Cascade Data Models
// Derivatives-market state, composite stress, and cascade detection results

use serde::{Deserialize, Serialize};

use crate::errors::{validate_finite, validate_non_negative, OracleResult};

/// Current leverage state from derivatives markets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeverageState {
    /// Total open interest in USD
    pub open_interest: f64,
    /// Current funding rate per 8h (positive = longs pay shorts)
    pub funding_rate: f64,
    /// Long liquidation volume in the past hour
    pub long_liquidations_1h: f64,
    /// Short liquidation volume in the past hour
    pub short_liquidations_1h: f64,
    /// Estimated average leverage (notional / margin)
    pub leverage_ratio: f64,
    /// OI change in the past 5 minutes (fractional)
    pub oi_change_5m: f64,
}

impl LeverageState {
    pub fn new(
        open_interest: f64,
        funding_rate: f64,
        long_liquidations_1h: f64,
        short_liquidations_1h: f64,
        leverage_ratio: f64,
        oi_change_5m: f64,
    ) -> OracleResult<Self> {
        Ok(Self {
            open_interest: validate_non_negative(open_interest, "leverage.open_interest")?,
            funding_rate: validate_finite(funding_rate, "leverage.funding_rate")?,
            long_liquidations_1h: validate_non_negative(
                long_liquidations_1h,
                "leverage.long_liquidations_1h",
            )?,
            short_liquidations_1h: validate_non_negative(
                short_liquidations_1h,
                "leverage.short_liquidations_1h",
            )?,
            leverage_ratio: validate_non_negative(leverage_ratio, "leverage.leverage_ratio")?,
            oi_change_5m: validate_finite(oi_change_5m, "leverage.oi_change_5m")?,
        })
    }

    /// Total liquidations in the past hour.
    pub fn total_liquidations_1h(&self) -> f64 {
        self.long_liquidations_1h + self.short_liquidations_1h
    }

    /// Liquidation imbalance: positive = more longs liquidated. Zero when
    /// there were no liquidations.
    pub fn liquidation_imbalance(&self) -> f64 {
        let total = self.total_liquidations_1h();
        if total == 0.0 {
            return 0.0;
        }
        (self.long_liquidations_1h - self.short_liquidations_1h) / total
    }

    /// True if the funding rate is extreme (>0.1% per 8h).
    pub fn is_funding_extreme(&self) -> bool {
        self.funding_rate.abs() > 0.001
    }
}

/// Composite leverage stress score in [0, 1] with component breakdown.
/// High stress means spot prices are less reliable for estimation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeverageStress {
    pub score: f64,
    pub oi_component: f64,
    pub funding_component: f64,
    pub liquidation_component: f64,
    pub divergence_component: f64,
    pub usdt_component: f64,
}

impl LeverageStress {
    /// Weighted composite from the five components, clipped to [0, 1].
    pub fn from_components(
        oi_stress: f64,
        funding_stress: f64,
        liq_stress: f64,
        divergence_stress: f64,
        usdt_stress: f64,
    ) -> Self {
        let score = 0.20 * oi_stress
            + 0.20 * funding_stress
            + 0.25 * liq_stress
            + 0.10 * divergence_stress
            + 0.25 * usdt_stress;
        Self {
            score: score.clamp(0.0, 1.0),
            oi_component: oi_stress,
            funding_component: funding_stress,
            liquidation_component: liq_stress,
            divergence_component: divergence_stress,
            usdt_component: usdt_stress,
        }
    }

    pub fn is_high_stress(&self) -> bool {
        self.score > 0.7
    }
}

impl Default for LeverageStress {
    fn default() -> Self {
        Self::from_components(0.0, 0.0, 0.0, 0.0, 0.0)
    }
}

/// Direction of a liquidation cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeDirection {
    LongSqueeze,
    ShortSqueeze,
}

/// Liquidation cascade detection result. A detected cascade always carries
/// a direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeDetection {
    pub is_cascade: bool,
    pub confidence: f64,
    pub direction: Option<CascadeDirection>,
}

impl CascadeDetection {
    pub fn no_cascade(confidence: f64) -> Self {
        Self {
            is_cascade: false,
            confidence,
            direction: None,
        }
    }

    pub fn detected(confidence: f64, direction: CascadeDirection) -> Self {
        Self {
            is_cascade: true,
            confidence,
            direction: Some(direction),
        }
    }
}
