//! Validation errors shared by every stage of a permutation test.

use thiserror::Error;

/// Configuration and range failures.
///
/// `InvalidRange` and `InvalidParameter` are caller misconfiguration and abort
/// a test. `InsufficientData` raised inside a single Monte Carlo trial only
/// excludes that trial from the distribution.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("invalid range: [{start}, {end}) does not fit a series of {len} bars")]
    InvalidRange { start: usize, end: usize, len: usize },

    #[error("insufficient data: need {needed} bars, have {available}")]
    InsufficientData { needed: usize, available: usize },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}
