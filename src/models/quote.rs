// Venue Quote
// Immutable per-venue price snapshot consumed as a filter observation

use serde::{Deserialize, Serialize};

use crate::errors::{validate_positive, OracleResult};

/// Per-venue price snapshot. `price` is strictly positive and finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueQuote {
    pub venue: String,
    pub price: f64,
    /// Unix timestamp in seconds
    pub timestamp: i64,
}

impl VenueQuote {
    pub fn new(venue: &str, price: f64, timestamp: i64) -> OracleResult<Self> {
        let price = validate_positive(price, "quote.price")?;
        Ok(Self {
            venue: venue.to_string(),
            price,
            timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_price() {
        assert!(VenueQuote::new("binance", 0.0, 0).is_err());
        assert!(VenueQuote::new("binance", -30000.0, 0).is_err());
        assert!(VenueQuote::new("binance", f64::NAN, 0).is_err());
        assert!(VenueQuote::new("binance", 30000.0, 0).is_ok());
    }
}
