//! Four-stage validation protocol.
//!
//! 1. In-sample optimisation
//! 2. In-sample permutation test
//! 3. Walk-forward test
//! 4. Walk-forward permutation test
//!
//! Stages 3 and 4 run only when stage 2 passes, unless `stop_on_failure` is
//! off.

use permlab_core::{Series, Strategy};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::config::TestConfig;
use crate::error::TestError;
use crate::monte_carlo::{in_sample_test, McTestResult};
use crate::optimizer::ParamSpace;
use crate::walk_forward::{walk_forward_mc_test, WalkForwardMcResult};

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

/// Outcome of a full protocol run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolReport {
    pub schema_version: u32,
    pub strategy: String,
    pub metric: String,
    pub series_len: usize,
    pub config: TestConfig,
    pub in_sample: McTestResult,
    /// Absent when the protocol stopped after the in-sample stage.
    pub walk_forward: Option<WalkForwardMcResult>,
    /// True only if every stage that ran passed and none were skipped.
    pub passed: bool,
}

/// Run all four stages on one series.
pub fn run_protocol(
    strategy: &dyn Strategy,
    series: &Series,
    space: &ParamSpace,
    config: &TestConfig,
    cancel: &CancelToken,
) -> Result<ProtocolReport, TestError> {
    let in_sample = in_sample_test(strategy, series, space, config, cancel)?;

    let walk_forward = if in_sample.passed || !config.stop_on_failure {
        Some(walk_forward_mc_test(strategy, series, space, config, cancel)?)
    } else {
        warn!(
            p_value = in_sample.p_value,
            threshold = in_sample.threshold,
            "in-sample stage failed, walk-forward skipped"
        );
        None
    };

    let passed = in_sample.passed && walk_forward.as_ref().is_some_and(|wf| wf.passed);
    info!(strategy = strategy.name(), passed, "protocol finished");

    Ok(ProtocolReport {
        schema_version: SCHEMA_VERSION,
        strategy: strategy.name().to_string(),
        metric: strategy.metric().name().to_string(),
        series_len: series.len(),
        config: config.clone(),
        in_sample,
        walk_forward,
        passed,
    })
}
