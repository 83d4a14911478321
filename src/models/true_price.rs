// True Price Estimate
// Filter output: latent equilibrium price with an explicit uncertainty band

use serde::{Deserialize, Serialize};

use super::regime::Regime;
use crate::errors::OracleResult;

/// Output of one oracle tick: the true-price estimate with uncertainty,
/// the observed spot median, and the regime classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TruePriceEstimate {
    pub price: f64,
    pub std: f64,
    /// 95% confidence bounds (lower, upper)
    pub confidence_interval: (f64, f64),
    /// Spot median deviation from the estimate, in standard deviations
    pub deviation_zscore: f64,
    pub spot_median: f64,
    pub regime: Regime,
    /// Unix timestamp in seconds
    pub timestamp: i64,
    /// SHA-256 over the deterministic input encoding
    pub data_hash: [u8; 32],
}

impl TruePriceEstimate {
    /// Deviation of the spot median from the estimate, in percent.
    pub fn deviation_percent(&self) -> f64 {
        if self.price == 0.0 {
            return 0.0;
        }
        (self.spot_median - self.price) / self.price * 100.0
    }

    pub fn is_spot_above_true(&self) -> bool {
        self.spot_median > self.price
    }

    /// Canonical JSON form: floats as doubles, the hash as 32 bytes, enum
    /// fields as their textual tags. Parsing it back reproduces every
    /// field bit-exact.
    pub fn to_json(&self) -> OracleResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> OracleResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn estimate(price: f64, spot: f64) -> TruePriceEstimate {
        TruePriceEstimate {
            price,
            std: 2.0,
            confidence_interval: (price - 3.92, price + 3.92),
            deviation_zscore: (spot - price) / 2.0,
            spot_median: spot,
            regime: Regime::normal(0.8),
            timestamp: 1_700_000_000,
            data_hash: [0u8; 32],
        }
    }

    #[test]
    fn deviation_percent() {
        let e = estimate(30000.0, 30300.0);
        assert_relative_eq!(e.deviation_percent(), 1.0, epsilon = 1e-12);
        assert!(e.is_spot_above_true());
    }

    #[test]
    fn confidence_interval_brackets_price() {
        let e = estimate(30000.0, 30000.0);
        assert!(e.confidence_interval.0 <= e.price && e.price <= e.confidence_interval.1);
    }
}
