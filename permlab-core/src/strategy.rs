//! Strategy capability — the opaque function under test.
//!
//! The validation engine never inspects a strategy. It only calls
//! `run(series, params)` and receives a scalar metric plus a trade log.
//! Implementations must be pure: identical inputs give identical outputs,
//! with no state carried between calls.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Series, TradeRecord};
use crate::metrics::MetricKind;

/// Errors a strategy may report for a (series, parameters) pair.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrategyError {
    #[error("insufficient data: need {needed} bars, have {available}")]
    InsufficientData { needed: usize, available: usize },

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("strategy produced a non-finite metric")]
    NonFiniteMetric,
}

/// Named parameter values for one strategy configuration.
///
/// Keys are kept sorted so the same set always serializes and displays the
/// same way.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSet(BTreeMap<String, f64>);

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.0.insert(name.to_string(), value);
        self
    }

    pub fn insert(&mut self, name: &str, value: f64) {
        self.0.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    /// Fetch a parameter as a whole non-negative number (periods, lookbacks).
    pub fn get_usize(&self, name: &str) -> Result<usize, StrategyError> {
        let value = self
            .get(name)
            .ok_or_else(|| StrategyError::InvalidParameters(format!("missing '{name}'")))?;
        if value < 0.0 || value.fract() != 0.0 || !value.is_finite() {
            return Err(StrategyError::InvalidParameters(format!(
                "'{name}' must be a non-negative integer, got {value}"
            )));
        }
        Ok(value as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ParamSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{k}={v}")?;
        }
        write!(f, "}}")
    }
}

/// Output of one strategy run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyRun {
    pub metric: f64,
    pub trades: Vec<TradeRecord>,
}

/// A strategy evaluated by the permutation tests.
pub trait Strategy: Send + Sync {
    /// Human-readable name for logs and reports.
    fn name(&self) -> &str;

    /// Metric used to score trade logs, including stitched walk-forward logs.
    fn metric(&self) -> MetricKind {
        MetricKind::TotalReturn
    }

    /// Run against `series` with `params`.
    ///
    /// Must fail with `StrategyError::InsufficientData` when the series is
    /// too short to produce a single evaluable period.
    fn run(&self, series: &Series, params: &ParamSet) -> Result<StrategyRun, StrategyError>;

    /// Score an arbitrary trade log with this strategy's metric.
    fn score_trades(&self, trades: &[TradeRecord]) -> Result<f64, StrategyError> {
        let value = self.metric().evaluate(trades);
        if value.is_finite() {
            Ok(value)
        } else {
            Err(StrategyError::NonFiniteMetric)
        }
    }
}
