// True Price Kalman Filter
// State vector: [true_price, drift]. Observation and process noise are
// time-varying functions of venue identity, leverage stress, and
// stablecoin flow context.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::config::KalmanConfig;
use crate::errors::{OracleError, OracleResult};
use crate::kalman::covariance::CovarianceManager;
use crate::models::stablecoin::StablecoinState;

/// Two-sided 95% normal quantile.
const CI95_Z: f64 = 1.96;

/// Kalman filter for true-price estimation with stablecoin dynamics.
///
/// The drift state is mean-reverting: `F = [[1, 1], [0, rho]]` with
/// persistence `rho` in (0, 1). Every observation measures the price
/// state, so `H` is a run-time-sized column of ones.
pub struct TruePriceKalmanFilter {
    config: KalmanConfig,
    /// State vector [true_price, drift]
    x: DVector<f64>,
    /// State covariance
    p: DMatrix<f64>,
    /// State transition
    f: DMatrix<f64>,
    /// Base process noise, scaled dynamically each predict
    q_base: DMatrix<f64>,
    /// Pending prediction, consumed by the next update
    prediction: Option<(DVector<f64>, DMatrix<f64>)>,
    cov_manager: CovarianceManager,
}

impl TruePriceKalmanFilter {
    pub fn new(config: &KalmanConfig) -> Self {
        let x = DVector::from_vec(vec![config.initial_price, config.initial_drift]);
        let p = DMatrix::from_diagonal(&DVector::from_vec(vec![
            config.initial_price_var,
            config.initial_drift_var,
        ]));
        let f = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 0.0, config.drift_persistence]);
        let q_base = DMatrix::from_diagonal(&DVector::from_vec(vec![
            config.process_noise_price,
            config.process_noise_drift,
        ]));

        Self {
            config: config.clone(),
            x,
            p,
            f,
            q_base,
            prediction: None,
            cov_manager: CovarianceManager::new(config),
        }
    }

    /// Current true-price estimate.
    pub fn true_price(&self) -> f64 {
        self.x[0]
    }

    /// Current drift estimate.
    pub fn drift(&self) -> f64 {
        self.x[1]
    }

    /// Standard deviation of the true-price estimate.
    pub fn true_price_std(&self) -> f64 {
        self.p[(0, 0)].sqrt()
    }

    /// State covariance (2x2, symmetric positive semi-definite).
    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.p
    }

    pub fn covariance_manager(&self) -> &CovarianceManager {
        &self.cov_manager
    }

    /// Prediction step: propagate state forward, scaling process noise by
    /// the stablecoin context (USDC-confirmed trends allow faster drift).
    /// Returns the predicted true price.
    pub fn predict(&mut self, stablecoin_state: Option<&StablecoinState>) -> f64 {
        let q = self.cov_manager.process_noise(&self.q_base, stablecoin_state);

        let x_pred = &self.f * &self.x;
        let p_pred = &self.f * &self.p * self.f.transpose() + q;

        let predicted = x_pred[0];
        self.prediction = Some((x_pred, p_pred));
        predicted
    }

    /// Update step: incorporate venue observations with per-observation
    /// variances (diagonal R). Fails without mutating state when called
    /// before `predict` or when the innovation covariance is singular.
    ///
    /// Returns (true_price, true_price_std).
    pub fn update(
        &mut self,
        observations: &[f64],
        observation_variances: &[f64],
    ) -> OracleResult<(f64, f64)> {
        let n_obs = observations.len();
        if n_obs == 0 {
            return Err(OracleError::InsufficientObservations { got: 0, min: 1 });
        }
        if observation_variances.len() != n_obs {
            return Err(OracleError::InvalidInput(format!(
                "observation/variance length mismatch: {} vs {}",
                n_obs,
                observation_variances.len()
            )));
        }
        let (x_pred, p_pred) = self
            .prediction
            .as_ref()
            .ok_or_else(|| OracleError::InvalidInput("update() called before predict()".to_string()))?;

        // Observation matrix: every observation measures the price state
        let mut h = DMatrix::zeros(n_obs, 2);
        for i in 0..n_obs {
            h[(i, 0)] = 1.0;
        }

        let z = DVector::from_row_slice(observations);
        let r = DMatrix::from_diagonal(&DVector::from_row_slice(observation_variances));

        // Innovation covariance
        let s = &h * p_pred * h.transpose() + &r;
        let s_inv = s
            .try_inverse()
            .ok_or_else(|| OracleError::NumericalInstability("innovation covariance inversion".to_string()))?;

        // Kalman gain
        let k = p_pred * h.transpose() * s_inv;

        let innovation = z - &h * x_pred;
        let x_new = x_pred + &k * innovation;

        // Joseph form for numerical stability
        let i2 = DMatrix::<f64>::identity(2, 2);
        let ikh = &i2 - &k * &h;
        let p_new = &ikh * p_pred * ikh.transpose() + &k * &r * k.transpose();

        self.x = x_new;
        self.p = p_new;
        self.prediction = None;

        debug!(
            true_price = self.x[0],
            drift = self.x[1],
            std = self.true_price_std(),
            n_obs,
            "filter updated"
        );

        Ok((self.x[0], self.true_price_std()))
    }

    /// 95% confidence interval for the true price.
    pub fn confidence_interval(&self) -> (f64, f64) {
        let std = self.true_price_std();
        (self.x[0] - CI95_Z * std, self.x[0] + CI95_Z * std)
    }

    /// Z-score of a spot price against the estimate. Zero when the
    /// estimate has no uncertainty.
    pub fn deviation_zscore(&self, spot_price: f64) -> f64 {
        let std = self.true_price_std();
        if std == 0.0 {
            return 0.0;
        }
        (spot_price - self.x[0]) / std
    }

    /// Reset filter state to a fresh price, discarding any pending
    /// prediction.
    pub fn reset(&mut self, initial_price: f64, initial_drift: f64) {
        self.x = DVector::from_vec(vec![initial_price, initial_drift]);
        self.p = DMatrix::from_diagonal(&DVector::from_vec(vec![
            self.config.initial_price_var,
            self.config.initial_drift_var,
        ]));
        self.prediction = None;
    }
}
