//! Series — an ordered, validated, immutable sequence of bars.

use std::ops::Range;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Bar;
use crate::error::ValidationError;

/// Errors raised when a bar sequence violates series invariants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("bar {index} violates OHLC ordering or has a non-positive price")]
    InvalidBar { index: usize },

    #[error("timestamp at bar {index} ({timestamp}) does not strictly increase")]
    NonIncreasingTimestamp {
        index: usize,
        timestamp: DateTime<Utc>,
    },
}

/// Ordered bars with strictly increasing timestamps.
///
/// A `Series` is never mutated once built. Slicing and permutation return new
/// series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Bar>", into = "Vec<Bar>")]
pub struct Series {
    bars: Vec<Bar>,
}

impl Series {
    /// Build a series, validating every bar and the timestamp ordering.
    pub fn new(bars: Vec<Bar>) -> Result<Self, SeriesError> {
        for (index, bar) in bars.iter().enumerate() {
            if !bar.is_sane() {
                return Err(SeriesError::InvalidBar { index });
            }
        }
        for (index, pair) in bars.windows(2).enumerate() {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(SeriesError::NonIncreasingTimestamp {
                    index: index + 1,
                    timestamp: pair[1].timestamp,
                });
            }
        }
        Ok(Self { bars })
    }

    /// Wrap bars produced by reconstruction, which preserves the invariants
    /// by construction.
    pub(crate) fn from_reconstructed(bars: Vec<Bar>) -> Self {
        debug_assert!(bars.iter().all(|b| !b.is_void()));
        Self { bars }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> Option<&Bar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Closing prices in bar order.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Copy the bars in `range` into a new series.
    pub fn slice(&self, range: Range<usize>) -> Result<Series, ValidationError> {
        if range.start >= range.end || range.end > self.bars.len() {
            return Err(ValidationError::InvalidRange {
                start: range.start,
                end: range.end,
                len: self.bars.len(),
            });
        }
        Ok(Self {
            bars: self.bars[range].to_vec(),
        })
    }

    /// Calendar span from the first to the last bar, in years (365.25 days).
    pub fn span_years(&self) -> f64 {
        match (self.bars.first(), self.bars.last()) {
            (Some(first), Some(last)) => {
                let secs = (last.timestamp - first.timestamp).num_seconds() as f64;
                secs / (365.25 * 86_400.0)
            }
            _ => 0.0,
        }
    }

    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }
}

impl TryFrom<Vec<Bar>> for Series {
    type Error = SeriesError;

    fn try_from(bars: Vec<Bar>) -> Result<Self, Self::Error> {
        Series::new(bars)
    }
}

impl From<Series> for Vec<Bar> {
    fn from(series: Series) -> Self {
        series.bars
    }
}
