//! # Stock Math
//!
//! Numerical building blocks for stock-level trend fitting.
//! This crate provides a small dense linear algebra kernel, a weighted
//! ridge least-squares solver with parameter covariance, and robust
//! (median based) estimators.

use thiserror::Error;

pub mod linalg;
pub mod regression;
pub mod robust;

pub use linalg::Matrix;
pub use regression::{LeastSquares, LeastSquaresFit};
pub use robust::{median, percentile, theil_sen, theil_sen_slope, TheilSenFit};

/// Errors that can occur in numerical calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Matrix is singular or too ill-conditioned to invert")]
    SingularMatrix,
}

/// Result type for numerical operations
pub type Result<T> = std::result::Result<T, MathError>;
