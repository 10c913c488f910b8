//! PermLab Runner — optimisation, permutation tests, walk-forward, reports.
//!
//! This crate builds on `permlab-core` to provide:
//! - Strategy runner adapter and exhaustive parameter optimiser
//! - In-sample Monte Carlo permutation test
//! - Walk-forward scheduling, evaluation and permutation test
//! - The four-stage protocol tying them together
//! - TOML configuration, CSV data loading, JSON/CSV/Markdown export

pub mod cancel;
pub mod config;
pub mod data_loader;
pub mod error;
pub mod monte_carlo;
pub mod optimizer;
pub mod protocol;
pub mod report;
pub mod runner;
pub mod walk_forward;

pub use cancel::CancelToken;
pub use config::{ConfigError, ProtocolConfig, RunId, StrategyConfig, TestConfig};
pub use data_loader::{load_series_csv, synthetic_series, write_series_csv, LoadError};
pub use error::TestError;
pub use monte_carlo::{in_sample_test, permutation_p_value, McTestResult};
pub use optimizer::{optimize, Optimum, ParamSpace};
pub use protocol::{run_protocol, ProtocolReport, SCHEMA_VERSION};
pub use runner::run_strategy;
pub use walk_forward::{
    default_walk_forward_threshold, run_walk_forward, schedule, walk_forward_mc_test,
    WalkForwardMcResult, WalkForwardResult, Window, WindowResult,
};
