// True Price Oracle Library
// Latent equilibrium price estimation with asymmetric stablecoin-flow
// treatment, leverage-stress-aware covariances, and regime-aware signals

pub mod config;
pub mod errors;
pub mod feeds;
pub mod kalman;
pub mod models;
pub mod oracle;
pub mod regime;
pub mod signals;
pub mod stablecoins;

// Re-export key types
pub use crate::config::{OracleConfig, VenueConfig};
pub use crate::errors::{OracleError, OracleResult};
pub use crate::models::{
    CascadeDetection, CascadeDirection, LeverageState, LeverageStress, Regime, RegimeType, Signal,
    SignalType, StablecoinState, TruePriceEstimate, VenueQuote,
};
pub use crate::oracle::{OracleInput, TruePriceOracle};
pub use crate::stablecoins::StablecoinFlowData;

/// Default update cadence in seconds.
pub const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 30;

/// Signals are only generated beyond this deviation, in standard
/// deviations of the estimate.
pub const DEFAULT_MIN_ZSCORE: f64 = 1.5;
