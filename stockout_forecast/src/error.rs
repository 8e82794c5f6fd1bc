//! Error types for the stockout_forecast crate

use stock_math::MathError;
use thiserror::Error;

/// Custom error types for the stockout_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Malformed observation data (non-finite or negative stock levels,
    /// unparsable numbers). The only data-driven hard failure.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Error from invalid configuration or call parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error related to loading or shaping data
    #[error("Data error: {0}")]
    DataError(String),

    /// Error from the numerical layer
    #[error("Math error: {0}")]
    Math(#[from] MathError),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from CSV parsing
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error from JSON (de)serialization
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl ForecastError {
    /// Whether the error was caused by the caller's data or parameters
    /// rather than by the environment.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ForecastError::InvalidInput(_) | ForecastError::InvalidParameter(_)
        )
    }
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;
