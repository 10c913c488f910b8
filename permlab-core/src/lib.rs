//! PermLab Core — domain types, bar permutation, and the strategy capability.
//!
//! This crate contains the permutation machinery of the validation engine:
//! - Domain types (bars, validated series, trade records)
//! - Log-price brick decomposition and sequential reconstruction
//! - Seeded bar permutation generator (gaps and bar bodies shuffled independently)
//! - BLAKE3 seed hierarchy for replayable, order-independent trials
//! - Strategy trait, parameter sets, and trade-log metrics

pub mod bricks;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod permutation;
pub mod rng;
pub mod strategies;
pub mod strategy;

pub use bricks::{decompose, decompose_range, reconstruct, BrickSet};
pub use domain::{Bar, Series, SeriesError, TradeRecord, TradeSide};
pub use error::ValidationError;
pub use metrics::MetricKind;
pub use permutation::{permute_segment, permute_series, segment_permutations, Permutation};
pub use rng::{RngHierarchy, Stage};
pub use strategy::{ParamSet, Strategy, StrategyError, StrategyRun};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything shared across Monte Carlo workers is
    /// Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<Bar>();
        require_sync::<Bar>();
        require_send::<Series>();
        require_sync::<Series>();
        require_send::<BrickSet>();
        require_sync::<BrickSet>();
        require_send::<Permutation>();
        require_sync::<Permutation>();
        require_send::<ParamSet>();
        require_sync::<ParamSet>();
        require_send::<RngHierarchy>();
        require_sync::<RngHierarchy>();
        require_send::<strategies::MaCrossover>();
        require_sync::<strategies::MaCrossover>();
    }

    /// Architecture contract: strategies are used only through the trait object.
    #[test]
    fn strategy_is_object_safe() {
        fn _check(strategy: &dyn Strategy, series: &Series, params: &ParamSet) {
            let _ = strategy.run(series, params);
        }
    }
}
