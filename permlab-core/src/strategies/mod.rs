//! Reference strategy implementations.
//!
//! The validation engine is strategy-agnostic; these exist so the CLI and the
//! tests have a concrete, parameterised strategy to optimise.

pub mod ma_crossover;

pub use ma_crossover::MaCrossover;
