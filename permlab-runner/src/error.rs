//! Errors raised by the permutation test drivers.

use permlab_core::{StrategyError, ValidationError};
use thiserror::Error;

/// Failures that abort a whole test.
///
/// Per-trial failures never surface here; they are counted as excluded trials.
#[derive(Debug, Error)]
pub enum TestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("strategy failed on the unpermuted series: {0}")]
    Strategy(#[from] StrategyError),

    #[error("walk-forward window {index} failed: {source}")]
    Window {
        index: usize,
        #[source]
        source: Box<TestError>,
    },

    #[error("test cancelled after {completed} of {requested} trials")]
    Cancelled { completed: usize, requested: usize },
}
