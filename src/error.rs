//! Error types for halfweight.

use thiserror::Error;

/// Weight storage error types.
#[derive(Error, Debug)]
pub enum ModelError {
    /// Weight or covariance magnitude too large for half-precision storage
    #[error("magnitude {value} exceeds the acceptable maximum {max}")]
    MagnitudeOverflow { value: f32, max: f32 },
}

/// Result type alias for weight storage operations.
pub type Result<T> = std::result::Result<T, ModelError>;
