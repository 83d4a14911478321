// True Price Oracle Orchestrator
// Wires the analyzers, the filter, and the classifiers into one
// synchronous tick: inputs in, one estimate out. A tick either completes
// and publishes an estimate or fails with the filter state untouched.

use std::collections::HashMap;

use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::config::OracleConfig;
use crate::errors::{
    validate_finite, validate_non_negative, validate_positive, validate_unit_interval, OracleError,
    OracleResult,
};
use crate::kalman::TruePriceKalmanFilter;
use crate::models::leverage::{LeverageState, LeverageStress};
use crate::models::signal::Signal;
use crate::models::stablecoin::StablecoinState;
use crate::models::true_price::TruePriceEstimate;
use crate::regime::{CascadeDetector, LeverageStressCalculator, RegimeClassifier};
use crate::signals::TruePriceSignalGenerator;
use crate::stablecoins::{StablecoinFlowAnalyzer, StablecoinFlowData};

/// Complete input for one oracle tick.
#[derive(Debug, Clone)]
pub struct OracleInput {
    /// Venue name -> last price. Venues absent from the map are omitted
    /// from the observation vector.
    pub venue_prices: HashMap<String, f64>,
    pub leverage_state: LeverageState,
    pub stablecoin_flow_data: StablecoinFlowData,
    /// Optional on-chain realized price (a more stable observation)
    pub realized_price: Option<f64>,
    /// Optional venue name -> order-book quality in [0, 1]
    pub orderbook_qualities: Option<HashMap<String, f64>>,
    pub price_return_5m: f64,
    pub spot_volume_5m: f64,
    pub volatility_annualized: f64,
}

/// Debug/monitoring snapshot of the oracle state.
#[derive(Debug, Clone, Serialize)]
pub struct OracleState {
    pub is_initialized: bool,
    pub true_price: Option<f64>,
    pub drift: Option<f64>,
    pub std: Option<f64>,
    pub last_estimate: Option<TruePriceEstimate>,
}

/// Main oracle orchestrator. Owns the filter state and the stress
/// histories exclusively; ticks are strictly serialized by `&mut self`.
pub struct TruePriceOracle {
    config: OracleConfig,
    filter: TruePriceKalmanFilter,
    stablecoin_analyzer: StablecoinFlowAnalyzer,
    regime_classifier: RegimeClassifier,
    cascade_detector: CascadeDetector,
    stress_calculator: LeverageStressCalculator,
    signal_generator: TruePriceSignalGenerator,

    last_estimate: Option<TruePriceEstimate>,
    last_stablecoin_state: Option<StablecoinState>,
    last_leverage_stress: Option<LeverageStress>,
    is_initialized: bool,
}

impl TruePriceOracle {
    /// Build an oracle from a configuration. Any configuration violation
    /// aborts initialization.
    pub fn new(config: OracleConfig) -> OracleResult<Self> {
        let config = config.validated()?;
        Ok(Self {
            filter: TruePriceKalmanFilter::new(&config.kalman),
            stablecoin_analyzer: StablecoinFlowAnalyzer::new(&config.stablecoin),
            regime_classifier: RegimeClassifier::new(&config.regime),
            cascade_detector: CascadeDetector::new(&config.cascade),
            stress_calculator: LeverageStressCalculator::new(&config.stress),
            signal_generator: TruePriceSignalGenerator::new(&config.signal),
            last_estimate: None,
            last_stablecoin_state: None,
            last_leverage_stress: None,
            is_initialized: false,
            config,
        })
    }

    /// Seed the filter at a known price. Also used to re-seed after a
    /// numerical failure.
    pub fn initialize(&mut self, initial_price: f64) -> OracleResult<()> {
        validate_positive(initial_price, "initial_price")?;
        self.filter.reset(initial_price, 0.0);
        self.is_initialized = true;
        info!(initial_price, "oracle initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.is_initialized
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    /// Run one oracle tick. Fixed internal order: flows, cascade, stress,
    /// predict, observation build, update, regime, estimate.
    pub fn update(&mut self, input: &OracleInput) -> OracleResult<TruePriceEstimate> {
        self.validate_input(input)?;

        if !self.is_initialized {
            let median = Self::median_price(&input.venue_prices);
            self.initialize(median)?;
        }

        // 1. Stablecoin flow analysis
        let stablecoin_state = self
            .stablecoin_analyzer
            .analyze(&input.stablecoin_flow_data, Some(&input.leverage_state));

        // 2. Cascade detection
        let cascade_detection = self.cascade_detector.detect(
            &input.leverage_state,
            input.price_return_5m,
            input.spot_volume_5m,
            Some(&stablecoin_state),
        );

        // 3. Leverage stress, with the 5-minute return scaled to a 1h proxy
        let leverage_stress = self.stress_calculator.calculate(
            &input.leverage_state,
            input.price_return_5m * 12.0,
            Some(&stablecoin_state),
        );

        // 4. Predict with stablecoin-driven process noise
        self.filter.predict(Some(&stablecoin_state));

        // 5. Observation vector in fixed venue order, plus realized price
        let (observations, variances) = self.prepare_observations(
            input,
            &leverage_stress,
            &stablecoin_state,
            cascade_detection.is_cascade,
        )?;

        // 6. Filter update
        let (true_price, true_price_std) = self.filter.update(&observations, &variances)?;

        // 7. Deviation of the spot median
        let spot_median = Self::median_price(&input.venue_prices);
        let deviation_zscore = self.filter.deviation_zscore(spot_median);

        // 8. Regime classification
        let regime = self.regime_classifier.classify(
            &leverage_stress,
            &cascade_detection,
            &stablecoin_state,
            input.volatility_annualized,
        );

        // 9. Assemble the estimate
        let estimate = TruePriceEstimate {
            price: true_price,
            std: true_price_std,
            confidence_interval: self.filter.confidence_interval(),
            deviation_zscore,
            spot_median,
            regime: regime.clone(),
            timestamp: self.next_timestamp(),
            data_hash: Self::data_hash(
                &input.venue_prices,
                &input.leverage_state,
                &input.stablecoin_flow_data,
            ),
        };

        info!(
            true_price,
            spot_median,
            zscore = deviation_zscore,
            regime = regime.regime_type.name(),
            "oracle tick complete"
        );

        self.last_estimate = Some(estimate.clone());
        self.last_stablecoin_state = Some(stablecoin_state);
        self.last_leverage_stress = Some(leverage_stress);
        Ok(estimate)
    }

    /// Generate a trading signal from the cached last estimate and
    /// stablecoin state. Neutral before the first completed tick.
    pub fn generate_signal(&self) -> Signal {
        match (
            &self.last_estimate,
            &self.last_stablecoin_state,
            &self.last_leverage_stress,
        ) {
            (Some(estimate), Some(stablecoins), Some(stress)) => {
                self.signal_generator.generate(estimate, stress, stablecoins)
            }
            _ => Signal::neutral(),
        }
    }

    /// Current oracle state for debugging and monitoring.
    pub fn state(&self) -> OracleState {
        OracleState {
            is_initialized: self.is_initialized,
            true_price: self.is_initialized.then(|| self.filter.true_price()),
            drift: self.is_initialized.then(|| self.filter.drift()),
            std: self.is_initialized.then(|| self.filter.true_price_std()),
            last_estimate: self.last_estimate.clone(),
        }
    }

    fn validate_input(&self, input: &OracleInput) -> OracleResult<()> {
        if input.venue_prices.is_empty() {
            return Err(OracleError::InsufficientObservations { got: 0, min: 1 });
        }
        if !self
            .config
            .enabled_venues()
            .any(|v| input.venue_prices.contains_key(&v.name))
        {
            warn!("no configured venue matched the supplied prices");
            return Err(OracleError::InsufficientObservations { got: 0, min: 1 });
        }
        for (venue, price) in &input.venue_prices {
            validate_positive(*price, &format!("venue_prices[{}]", venue))?;
        }
        if let Some(price) = input.realized_price {
            validate_positive(price, "realized_price")?;
        }
        if let Some(qualities) = &input.orderbook_qualities {
            for (venue, quality) in qualities {
                validate_unit_interval(*quality, &format!("orderbook_qualities[{}]", venue))?;
            }
        }
        validate_finite(input.price_return_5m, "price_return_5m")?;
        validate_non_negative(input.spot_volume_5m, "spot_volume_5m")?;
        validate_non_negative(input.volatility_annualized, "volatility_annualized")?;
        Ok(())
    }

    /// Observation vector and per-observation variances, in the fixed
    /// venue order of the configuration.
    fn prepare_observations(
        &self,
        input: &OracleInput,
        leverage_stress: &LeverageStress,
        stablecoin_state: &StablecoinState,
        is_cascade: bool,
    ) -> OracleResult<(Vec<f64>, Vec<f64>)> {
        let adjustments = self.stablecoin_analyzer.kalman_adjustments(stablecoin_state);
        let cov_manager = self.filter.covariance_manager();

        let mut observations = Vec::with_capacity(self.config.venues.len() + 1);
        let mut variances = Vec::with_capacity(self.config.venues.len() + 1);

        for venue in self.config.enabled_venues() {
            let Some(&price) = input.venue_prices.get(&venue.name) else {
                continue;
            };

            let quality = input
                .orderbook_qualities
                .as_ref()
                .and_then(|q| q.get(&venue.name).copied())
                .unwrap_or(1.0);

            let variance = cov_manager.observation_variance(
                venue,
                Some(leverage_stress),
                quality,
                Some(stablecoin_state),
                is_cascade,
                adjustments.venue_weight(venue),
            )?;

            observations.push(price);
            variances.push(variance);
        }

        if observations.is_empty() {
            warn!("no configured venue matched the supplied prices");
            return Err(OracleError::InsufficientObservations { got: 0, min: 1 });
        }

        if let Some(realized) = input.realized_price {
            observations.push(realized);
            variances.push(self.config.kalman.base_observation_var * 0.5);
        }

        Ok((observations, variances))
    }

    fn median_price(venue_prices: &HashMap<String, f64>) -> f64 {
        let prices: Vec<f64> = venue_prices.values().copied().collect();
        statistical::median(&prices)
    }

    /// Estimate timestamps are monotonically non-decreasing even if the
    /// wall clock steps backwards.
    fn next_timestamp(&self) -> i64 {
        let now = Utc::now().timestamp();
        match &self.last_estimate {
            Some(estimate) => now.max(estimate.timestamp),
            None => now,
        }
    }

    /// SHA-256 over a deterministic encoding of the tick inputs: sorted
    /// venue prices at 8-decimal precision, then OI and the two mint
    /// volumes at 2-decimal precision.
    fn data_hash(
        venue_prices: &HashMap<String, f64>,
        leverage_state: &LeverageState,
        flow_data: &StablecoinFlowData,
    ) -> [u8; 32] {
        let mut venues: Vec<&String> = venue_prices.keys().collect();
        venues.sort();

        let mut data = String::new();
        for venue in venues {
            data.push_str(&format!("{}:{:.8},", venue, venue_prices[venue]));
        }
        data.push_str(&format!("oi:{:.2},", leverage_state.open_interest));
        data.push_str(&format!("usdt:{:.2},", flow_data.usdt_mint_volume_24h));
        data.push_str(&format!("usdc:{:.2}", flow_data.usdc_mint_volume_24h));

        let digest = Sha256::digest(data.as_bytes());
        digest.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::stablecoin::PriceDirection;

    fn calm_input(prices: &[(&str, f64)]) -> OracleInput {
        OracleInput {
            venue_prices: prices.iter().map(|(v, p)| (v.to_string(), *p)).collect(),
            leverage_state: LeverageState::new(5e9, 1e-4, 1e6, 1e6, 10.0, 0.0).unwrap(),
            stablecoin_flow_data: StablecoinFlowData::builder()
                .usdt(1e8, 5e7, 5e7, vec![2e7; 24])
                .usdc(2e8, 1.5e8, 3e7, 2e7, 0.0)
                .price_context(0.0, PriceDirection::Neutral)
                .build()
                .unwrap(),
            realized_price: None,
            orderbook_qualities: None,
            price_return_5m: 0.0,
            spot_volume_5m: 5e8,
            volatility_annualized: 0.3,
        }
    }

    #[test]
    fn empty_venue_prices_fail_without_state_change() {
        let mut oracle = TruePriceOracle::new(OracleConfig::default()).unwrap();
        let input = calm_input(&[]);
        let err = oracle.update(&input).unwrap_err();
        assert!(matches!(err, OracleError::InsufficientObservations { .. }));
        assert!(!oracle.is_initialized());
    }

    #[test]
    fn unknown_venues_alone_are_insufficient() {
        let mut oracle = TruePriceOracle::new(OracleConfig::default()).unwrap();
        let input = calm_input(&[("unknown_venue", 30000.0)]);
        let err = oracle.update(&input).unwrap_err();
        assert!(matches!(err, OracleError::InsufficientObservations { .. }));
    }

    #[test]
    fn nan_price_fails_fast() {
        let mut oracle = TruePriceOracle::new(OracleConfig::default()).unwrap();
        let input = calm_input(&[("binance", f64::NAN)]);
        assert!(matches!(oracle.update(&input), Err(OracleError::InvalidInput(_))));
    }

    #[test]
    fn out_of_range_orderbook_quality_rejected() {
        let mut oracle = TruePriceOracle::new(OracleConfig::default()).unwrap();
        let mut input = calm_input(&[("binance", 30000.0)]);
        input.orderbook_qualities =
            Some([("binance".to_string(), 1.5)].into_iter().collect());
        assert!(matches!(oracle.update(&input), Err(OracleError::InvalidInput(_))));
    }

    #[test]
    fn auto_initializes_to_venue_median() {
        let mut oracle = TruePriceOracle::new(OracleConfig::default()).unwrap();
        let input = calm_input(&[("binance", 30000.0), ("coinbase", 30010.0), ("okx", 30005.0)]);
        let estimate = oracle.update(&input).unwrap();
        assert!(oracle.is_initialized());
        assert!((estimate.price - 30005.0).abs() < 50.0);
        assert!(estimate.confidence_interval.0 <= estimate.price);
        assert!(estimate.price <= estimate.confidence_interval.1);
    }

    #[test]
    fn signal_is_neutral_before_first_tick() {
        let oracle = TruePriceOracle::new(OracleConfig::default()).unwrap();
        assert_eq!(oracle.generate_signal(), Signal::neutral());
    }

    #[test]
    fn timestamps_are_non_decreasing() {
        let mut oracle = TruePriceOracle::new(OracleConfig::default()).unwrap();
        let input = calm_input(&[("binance", 30000.0), ("kraken", 30002.0)]);
        let first = oracle.update(&input).unwrap();
        let second = oracle.update(&input).unwrap();
        assert!(second.timestamp >= first.timestamp);
    }

    #[test]
    fn data_hash_is_deterministic_and_input_sensitive() {
        let input_a = calm_input(&[("binance", 30000.0), ("kraken", 30002.0)]);
        let hash_a = TruePriceOracle::data_hash(
            &input_a.venue_prices,
            &input_a.leverage_state,
            &input_a.stablecoin_flow_data,
        );
        let hash_b = TruePriceOracle::data_hash(
            &input_a.venue_prices,
            &input_a.leverage_state,
            &input_a.stablecoin_flow_data,
        );
        assert_eq!(hash_a, hash_b);

        let input_c = calm_input(&[("binance", 30001.0), ("kraken", 30002.0)]);
        let hash_c = TruePriceOracle::data_hash(
            &input_c.venue_prices,
            &input_c.leverage_state,
            &input_c.stablecoin_flow_data,
        );
        assert_ne!(hash_a, hash_c);
    }

    #[test]
    fn realized_price_extends_observation_vector() {
        let mut oracle = TruePriceOracle::new(OracleConfig::default()).unwrap();
        let mut input = calm_input(&[("binance", 30000.0)]);
        input.realized_price = Some(30003.0);
        let estimate = oracle.update(&input).unwrap();
        assert!(estimate.price > 0.0);
    }
}
