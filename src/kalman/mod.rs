// Kalman Filter Module
// Two-state filter over (true_price, drift) with time-varying covariances

pub mod covariance;
pub mod filter;

pub use covariance::{weighted_trimmed_median, CovarianceManager};
pub use filter::TruePriceKalmanFilter;
