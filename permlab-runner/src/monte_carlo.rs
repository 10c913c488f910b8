//! In-sample Monte Carlo permutation test.
//!
//! Compares the optimiser's best metric on the real series against the best
//! metric the same search finds on permuted copies. If the real series is
//! not clearly better than its permutations, the apparent edge is explained
//! by the search itself (data-mining bias) rather than by structure in the
//! prices.
//!
//! Trials are independent: each derives its own seed from the master seed
//! and trial index, so the trial metrics are identical for any worker count.

use permlab_core::{permute_series, RngHierarchy, Series, Stage, Strategy, ValidationError};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::config::TestConfig;
use crate::error::TestError;
use crate::optimizer::{optimize, Optimum, ParamSpace};

/// Result of the in-sample permutation test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McTestResult {
    /// Optimum on the unpermuted series.
    pub real: Optimum,
    pub p_value: f64,
    /// Best metric per completed trial, in trial order. Excluded trials are absent.
    pub trial_metrics: Vec<f64>,
    pub trial_count: usize,
    pub excluded_trials: usize,
    pub threshold: f64,
    pub passed: bool,
}

/// Outcome of one trial before reduction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum TrialOutcome {
    Metric(f64),
    Excluded,
    Skipped,
}

/// Permutation p-value with the +1/+1 correction.
///
/// `(1 + #{trial ≥ real}) / (1 + trials)`. Always in `(0, 1]`.
pub fn permutation_p_value(real: f64, trial_metrics: &[f64]) -> f64 {
    let at_least = trial_metrics.iter().filter(|&&m| m >= real).count();
    (1 + at_least) as f64 / (1 + trial_metrics.len()) as f64
}

/// Run `trial` for every index in `0..trial_count`, honouring cancellation.
///
/// Results come back in trial order regardless of `parallel`.
pub(crate) fn run_trials<F>(
    trial_count: usize,
    parallel: bool,
    cancel: &CancelToken,
    trial: F,
) -> Result<Vec<TrialOutcome>, TestError>
where
    F: Fn(u64) -> TrialOutcome + Send + Sync,
{
    let guarded = |t: usize| {
        if cancel.is_cancelled() {
            TrialOutcome::Skipped
        } else {
            trial(t as u64)
        }
    };
    let outcomes: Vec<TrialOutcome> = if parallel {
        (0..trial_count).into_par_iter().map(guarded).collect()
    } else {
        (0..trial_count).map(guarded).collect()
    };

    let skipped = outcomes
        .iter()
        .filter(|o| matches!(o, TrialOutcome::Skipped))
        .count();
    if skipped > 0 {
        return Err(TestError::Cancelled {
            completed: trial_count - skipped,
            requested: trial_count,
        });
    }
    Ok(outcomes)
}

/// Split outcomes into ordered metrics and the excluded count.
pub(crate) fn collect_metrics(outcomes: &[TrialOutcome]) -> (Vec<f64>, usize) {
    let metrics: Vec<f64> = outcomes
        .iter()
        .filter_map(|o| match o {
            TrialOutcome::Metric(m) => Some(*m),
            _ => None,
        })
        .collect();
    let excluded = outcomes.len() - metrics.len();
    (metrics, excluded)
}

/// In-sample optimisation plus permutation test.
///
/// 1. Optimise on the real series.
/// 2. For each trial, permute bars from `config.start_index` on and re-run
///    the same optimisation.
/// 3. p-value over the trials that produced a metric.
pub fn in_sample_test(
    strategy: &dyn Strategy,
    series: &Series,
    space: &ParamSpace,
    config: &TestConfig,
    cancel: &CancelToken,
) -> Result<McTestResult, TestError> {
    config.validate()?;
    if config.start_index >= series.len() {
        return Err(ValidationError::InvalidRange {
            start: config.start_index,
            end: series.len(),
            len: series.len(),
        }
        .into());
    }

    info!(
        strategy = strategy.name(),
        bars = series.len(),
        params = space.len(),
        trials = config.trial_count,
        "in-sample test started"
    );

    let real = optimize(strategy, series, space, config.parallel)?;
    info!(params = %real.params, metric = real.metric, "in-sample optimum");

    let hierarchy = RngHierarchy::new(config.rng_seed);
    let outcomes = run_trials(config.trial_count, config.parallel, cancel, |t| {
        let seed = hierarchy.sub_seed(Stage::InSample, 0, t);
        let result = permute_series(series, config.start_index, seed)
            .and_then(|permuted| optimize(strategy, &permuted, space, config.parallel));
        match result {
            Ok(best) => TrialOutcome::Metric(best.metric),
            Err(err) => {
                debug!(trial = t, error = %err, "trial excluded");
                TrialOutcome::Excluded
            }
        }
    })?;

    let (trial_metrics, excluded_trials) = collect_metrics(&outcomes);
    if trial_metrics.is_empty() {
        return Err(ValidationError::InsufficientData {
            needed: 1,
            available: 0,
        }
        .into());
    }

    let p_value = permutation_p_value(real.metric, &trial_metrics);
    let threshold = config.p_value_threshold;
    let passed = p_value < threshold;
    info!(
        p_value,
        threshold,
        excluded = excluded_trials,
        passed,
        "in-sample test finished"
    );

    Ok(McTestResult {
        real,
        p_value,
        trial_metrics,
        trial_count: config.trial_count,
        excluded_trials,
        threshold,
        passed,
    })
}
