// Error Handling Module
// Standardized error types and fail-fast numeric validation

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient observations: got {got} venue prices, need at least {min}")]
    InsufficientObservations { got: usize, min: usize },

    #[error("Numerical instability in {0}")]
    NumericalInstability(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Feed error: {source_name} - {reason}")]
    FeedUnavailable { source_name: String, reason: String },
}

pub type OracleResult<T> = Result<T, OracleError>;

// Validation helpers

pub fn validate_finite(value: f64, name: &str) -> OracleResult<f64> {
    if value.is_nan() || value.is_infinite() {
        return Err(OracleError::InvalidInput(format!("{} must be finite, got {}", name, value)));
    }
    Ok(value)
}

pub fn validate_positive(value: f64, name: &str) -> OracleResult<f64> {
    validate_finite(value, name)?;
    if value <= 0.0 {
        return Err(OracleError::InvalidInput(format!("{} must be positive, got {}", name, value)));
    }
    Ok(value)
}

pub fn validate_non_negative(value: f64, name: &str) -> OracleResult<f64> {
    validate_finite(value, name)?;
    if value < 0.0 {
        return Err(OracleError::InvalidInput(format!("{} must be non-negative, got {}", name, value)));
    }
    Ok(value)
}

pub fn validate_bounds(value: f64, min: f64, max: f64, name: &str) -> OracleResult<f64> {
    validate_finite(value, name)?;
    if value < min || value > max {
        return Err(OracleError::InvalidInput(
            format!("{} must be between {} and {}, got {}", name, min, max, value)
        ));
    }
    Ok(value)
}

pub fn validate_unit_interval(value: f64, name: &str) -> OracleResult<f64> {
    validate_bounds(value, 0.0, 1.0, name)
}
