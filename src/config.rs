// Oracle Configuration
// Immutable configuration tree, built and validated once at startup

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::{OracleError, OracleResult};

/// Kalman filter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KalmanConfig {
    /// Initial state
    pub initial_price: f64,
    pub initial_drift: f64,

    /// Initial covariance
    pub initial_price_var: f64,
    pub initial_drift_var: f64,

    /// Process noise (base values, adjusted dynamically)
    pub process_noise_price: f64,
    pub process_noise_drift: f64,

    /// Drift persistence (mean-reversion speed)
    pub drift_persistence: f64,

    /// Observation noise (base, adjusted for leverage/stablecoins)
    pub base_observation_var: f64,
}

impl Default for KalmanConfig {
    fn default() -> Self {
        Self {
            initial_price: 0.0,
            initial_drift: 0.0,
            initial_price_var: 100.0,
            initial_drift_var: 1.0,
            process_noise_price: 1.0,
            process_noise_drift: 0.01,
            drift_persistence: 0.99,
            base_observation_var: 10.0,
        }
    }
}

impl KalmanConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !(self.drift_persistence > 0.0 && self.drift_persistence < 1.0) {
            errors.push(format!(
                "kalman.drift_persistence must be in (0, 1), got {}",
                self.drift_persistence
            ));
        }
        for (name, value) in [
            ("kalman.initial_price_var", self.initial_price_var),
            ("kalman.initial_drift_var", self.initial_drift_var),
            ("kalman.process_noise_price", self.process_noise_price),
            ("kalman.process_noise_drift", self.process_noise_drift),
            ("kalman.base_observation_var", self.base_observation_var),
        ] {
            if !(value > 0.0 && value.is_finite()) {
                errors.push(format!("{} must be positive, got {}", name, value));
            }
        }
        errors
    }
}

/// Stablecoin analyzer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StablecoinConfig {
    /// USDT impact parameters
    pub usdt_volatility_mult_base: f64,
    pub usdt_volatility_mult_max: f64,
    pub usdt_typical_mint_volume: f64,
    pub usdt_typical_derivatives_flow: f64,

    /// USDC impact parameters
    pub usdc_drift_confidence_max: f64,
    pub usdc_typical_spot_flow: f64,
    pub usdc_typical_custody_flow: f64,
    pub usdc_typical_defi_flow: f64,

    /// Flow ratio thresholds: USDT/USDC > manipulation threshold is
    /// leverage-enabling, < trend threshold is capital-confirming
    pub manipulation_ratio_threshold: f64,
    pub trend_ratio_threshold: f64,
}

impl Default for StablecoinConfig {
    fn default() -> Self {
        Self {
            usdt_volatility_mult_base: 1.0,
            usdt_volatility_mult_max: 3.0,
            usdt_typical_mint_volume: 500_000_000.0,
            usdt_typical_derivatives_flow: 300_000_000.0,
            usdc_drift_confidence_max: 0.1,
            usdc_typical_spot_flow: 200_000_000.0,
            usdc_typical_custody_flow: 100_000_000.0,
            usdc_typical_defi_flow: 100_000_000.0,
            manipulation_ratio_threshold: 2.0,
            trend_ratio_threshold: 0.5,
        }
    }
}

impl StablecoinConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.usdt_volatility_mult_max < self.usdt_volatility_mult_base {
            errors.push(format!(
                "stablecoin.usdt_volatility_mult_max ({}) must be >= base ({})",
                self.usdt_volatility_mult_max, self.usdt_volatility_mult_base
            ));
        }
        if self.usdt_volatility_mult_base < 1.0 {
            errors.push(format!(
                "stablecoin.usdt_volatility_mult_base must be >= 1, got {}",
                self.usdt_volatility_mult_base
            ));
        }
        if self.manipulation_ratio_threshold <= self.trend_ratio_threshold {
            errors.push(format!(
                "stablecoin.manipulation_ratio_threshold ({}) must exceed trend_ratio_threshold ({})",
                self.manipulation_ratio_threshold, self.trend_ratio_threshold
            ));
        }
        for (name, value) in [
            ("stablecoin.usdt_typical_mint_volume", self.usdt_typical_mint_volume),
            ("stablecoin.usdt_typical_derivatives_flow", self.usdt_typical_derivatives_flow),
            ("stablecoin.usdc_typical_spot_flow", self.usdc_typical_spot_flow),
            ("stablecoin.usdc_typical_custody_flow", self.usdc_typical_custody_flow),
            ("stablecoin.usdc_typical_defi_flow", self.usdc_typical_defi_flow),
        ] {
            if !(value > 0.0 && value.is_finite()) {
                errors.push(format!("{} must be positive, got {}", name, value));
            }
        }
        if !(self.usdc_drift_confidence_max > 0.0 && self.usdc_drift_confidence_max <= 1.0) {
            errors.push(format!(
                "stablecoin.usdc_drift_confidence_max must be in (0, 1], got {}",
                self.usdc_drift_confidence_max
            ));
        }
        errors
    }
}

/// Regime classifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeConfig {
    pub leverage_stress_high: f64,
    pub volatility_low_threshold: f64,
    pub manipulation_prob_threshold: f64,
    pub cascade_confidence_threshold: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            leverage_stress_high: 0.7,
            volatility_low_threshold: 0.2,
            manipulation_prob_threshold: 0.7,
            cascade_confidence_threshold: 0.7,
        }
    }
}

impl RegimeConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for (name, value) in [
            ("regime.leverage_stress_high", self.leverage_stress_high),
            ("regime.manipulation_prob_threshold", self.manipulation_prob_threshold),
            ("regime.cascade_confidence_threshold", self.cascade_confidence_threshold),
        ] {
            if !(value > 0.0 && value < 1.0) {
                errors.push(format!("{} must be in (0, 1), got {}", name, value));
            }
        }
        if !(self.volatility_low_threshold > 0.0 && self.volatility_low_threshold.is_finite()) {
            errors.push(format!(
                "regime.volatility_low_threshold must be positive, got {}",
                self.volatility_low_threshold
            ));
        }
        errors
    }
}

/// Signal generator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Minimum |z-score| to generate a directional signal
    pub min_zscore_threshold: f64,

    /// Confidence scaling
    pub base_confidence: f64,
    pub zscore_confidence_scale: f64,

    /// Timeframe estimation
    pub base_reversion_hours: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            min_zscore_threshold: 1.5,
            base_confidence: 0.5,
            zscore_confidence_scale: 0.1,
            base_reversion_hours: 4.0,
        }
    }
}

impl SignalConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !(self.min_zscore_threshold > 0.0 && self.min_zscore_threshold.is_finite()) {
            errors.push(format!(
                "signal.min_zscore_threshold must be positive, got {}",
                self.min_zscore_threshold
            ));
        }
        if !(self.base_confidence > 0.0 && self.base_confidence < 1.0) {
            errors.push(format!(
                "signal.base_confidence must be in (0, 1), got {}",
                self.base_confidence
            ));
        }
        if !(self.base_reversion_hours > 0.0 && self.base_reversion_hours.is_finite()) {
            errors.push(format!(
                "signal.base_reversion_hours must be positive, got {}",
                self.base_reversion_hours
            ));
        }
        errors
    }
}

/// Leverage stress calculator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressConfig {
    /// Typical open interest for cold-start normalization
    pub typical_oi: f64,
    /// Typical hourly liquidation volume
    pub typical_liquidation_volume: f64,
    /// Ring buffer capacity (90 days of hourly samples)
    pub history_capacity: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            typical_oi: 10_000_000_000.0,
            typical_liquidation_volume: 50_000_000.0,
            history_capacity: 2160,
        }
    }
}

impl StressConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !(self.typical_oi > 0.0 && self.typical_oi.is_finite()) {
            errors.push(format!("stress.typical_oi must be positive, got {}", self.typical_oi));
        }
        if !(self.typical_liquidation_volume > 0.0 && self.typical_liquidation_volume.is_finite()) {
            errors.push(format!(
                "stress.typical_liquidation_volume must be positive, got {}",
                self.typical_liquidation_volume
            ));
        }
        if self.history_capacity < 10 {
            errors.push(format!(
                "stress.history_capacity must be at least 10, got {}",
                self.history_capacity
            ));
        }
        errors
    }
}

/// Cascade detector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeConfig {
    /// Combined-signal confidence above which a cascade is declared
    pub confidence_threshold: f64,
    /// Typical hourly liquidation volume for spike normalization
    pub typical_liquidation_volume: f64,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            typical_liquidation_volume: 50_000_000.0,
        }
    }
}

impl CascadeConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !(self.confidence_threshold > 0.0 && self.confidence_threshold < 1.0) {
            errors.push(format!(
                "cascade.confidence_threshold must be in (0, 1), got {}",
                self.confidence_threshold
            ));
        }
        if !(self.typical_liquidation_volume > 0.0 && self.typical_liquidation_volume.is_finite()) {
            errors.push(format!(
                "cascade.typical_liquidation_volume must be positive, got {}",
                self.typical_liquidation_volume
            ));
        }
        errors
    }
}

/// Static per-venue descriptor. Immutable within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    pub name: String,
    pub base_reliability: f64,
    #[serde(default)]
    pub has_derivatives: bool,
    #[serde(default)]
    pub derivatives_ratio: f64,
    #[serde(default)]
    pub is_decentralized: bool,
    #[serde(default)]
    pub usdc_primary: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl VenueConfig {
    pub fn new(name: &str, base_reliability: f64) -> Self {
        Self {
            name: name.to_string(),
            base_reliability,
            has_derivatives: false,
            derivatives_ratio: 0.0,
            is_decentralized: false,
            usdc_primary: false,
            enabled: true,
        }
    }

    pub fn with_derivatives(mut self, ratio: f64) -> Self {
        self.has_derivatives = true;
        self.derivatives_ratio = ratio;
        self
    }

    pub fn decentralized(mut self) -> Self {
        self.is_decentralized = true;
        self
    }

    pub fn usdc_primary(mut self) -> Self {
        self.usdc_primary = true;
        self
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.name.is_empty() {
            errors.push("venue.name must not be empty".to_string());
        }
        if !(0.0..=1.0).contains(&self.base_reliability) {
            errors.push(format!(
                "venue.{}.base_reliability must be in [0, 1], got {}",
                self.name, self.base_reliability
            ));
        }
        if !(0.0..=1.0).contains(&self.derivatives_ratio) {
            errors.push(format!(
                "venue.{}.derivatives_ratio must be in [0, 1], got {}",
                self.name, self.derivatives_ratio
            ));
        }
        errors
    }
}

/// Target chain descriptor for downstream publication tooling. The core
/// validates the bounds but never speaks to a chain itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,
    pub confirmations_required: u32,
    pub max_gas_price_gwei: f64,
}

impl ChainConfig {
    pub fn new(chain_id: u64, name: &str) -> Self {
        Self {
            chain_id,
            name: name.to_string(),
            confirmations_required: 1,
            max_gas_price_gwei: 100.0,
        }
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.chain_id == 0 {
            errors.push(format!("chain.{}.chain_id must be non-zero", self.name));
        }
        if self.name.is_empty() {
            errors.push("chain.name must not be empty".to_string());
        }
        if self.confirmations_required == 0 {
            errors.push(format!("chain.{}.confirmations_required must be at least 1", self.name));
        }
        if !(self.max_gas_price_gwei > 0.0 && self.max_gas_price_gwei.is_finite()) {
            errors.push(format!(
                "chain.{}.max_gas_price_gwei must be positive, got {}",
                self.name, self.max_gas_price_gwei
            ));
        }
        errors
    }
}

/// Main oracle configuration. Built at startup, immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default)]
    pub kalman: KalmanConfig,
    #[serde(default)]
    pub stablecoin: StablecoinConfig,
    #[serde(default)]
    pub regime: RegimeConfig,
    #[serde(default)]
    pub signal: SignalConfig,
    #[serde(default)]
    pub stress: StressConfig,
    #[serde(default)]
    pub cascade: CascadeConfig,

    #[serde(default = "default_venues")]
    pub venues: Vec<VenueConfig>,
    #[serde(default = "default_chains")]
    pub chains: Vec<ChainConfig>,
    #[serde(default = "default_active_chain")]
    pub active_chain: String,

    #[serde(default = "default_update_interval")]
    pub update_interval_seconds: u64,
    #[serde(default = "default_stablecoin_interval")]
    pub stablecoin_update_interval_seconds: u64,
}

fn default_venues() -> Vec<VenueConfig> {
    vec![
        VenueConfig::new("binance", 0.5).with_derivatives(0.7),
        VenueConfig::new("coinbase", 0.8).usdc_primary(),
        VenueConfig::new("okx", 0.5).with_derivatives(0.6),
        VenueConfig::new("kraken", 0.8),
        VenueConfig::new("uniswap", 0.6).decentralized(),
    ]
}

fn default_chains() -> Vec<ChainConfig> {
    vec![
        ChainConfig::new(1, "ethereum"),
        ChainConfig::new(42161, "arbitrum"),
        ChainConfig::new(10, "optimism"),
        ChainConfig::new(8453, "base"),
        ChainConfig::new(137, "polygon"),
    ]
}

fn default_active_chain() -> String {
    "ethereum".to_string()
}

fn default_update_interval() -> u64 {
    30
}

fn default_stablecoin_interval() -> u64 {
    300
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            kalman: KalmanConfig::default(),
            stablecoin: StablecoinConfig::default(),
            regime: RegimeConfig::default(),
            signal: SignalConfig::default(),
            stress: StressConfig::default(),
            cascade: CascadeConfig::default(),
            venues: default_venues(),
            chains: default_chains(),
            active_chain: default_active_chain(),
            update_interval_seconds: default_update_interval(),
            stablecoin_update_interval_seconds: default_stablecoin_interval(),
        }
    }
}

impl OracleConfig {
    /// Collect every validation failure across the configuration tree.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.kalman.validate());
        errors.extend(self.stablecoin.validate());
        errors.extend(self.regime.validate());
        errors.extend(self.signal.validate());
        errors.extend(self.stress.validate());
        errors.extend(self.cascade.validate());

        if self.venues.is_empty() {
            errors.push("at least one venue must be configured".to_string());
        }
        for venue in &self.venues {
            errors.extend(venue.validate());
        }
        for chain in &self.chains {
            errors.extend(chain.validate());
        }
        if !self.chains.iter().any(|c| c.name == self.active_chain) {
            errors.push(format!("active_chain '{}' is not in the chain list", self.active_chain));
        }
        if self.update_interval_seconds == 0 {
            errors.push("update_interval_seconds must be non-zero".to_string());
        }
        errors
    }

    /// Strict form: a non-empty violation list aborts initialization.
    pub fn validated(self) -> OracleResult<Self> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(OracleError::Config(errors.join("; ")))
        }
    }

    /// Load and validate a configuration file (TOML or JSON).
    pub fn from_file(path: &Path) -> OracleResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .map_err(|e| OracleError::Config(e.to_string()))?;
        let parsed: OracleConfig = settings
            .try_deserialize()
            .map_err(|e| OracleError::Config(e.to_string()))?;
        parsed.validated()
    }

    pub fn active_chain(&self) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.name == self.active_chain)
    }

    pub fn venue(&self, name: &str) -> Option<&VenueConfig> {
        self.venues.iter().find(|v| v.name == name)
    }

    pub fn enabled_venues(&self) -> impl Iterator<Item = &VenueConfig> {
        self.venues.iter().filter(|v| v.enabled)
    }
}
