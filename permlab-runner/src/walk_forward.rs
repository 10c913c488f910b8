//! Walk-forward validation — rolling train/test windows and OOS evaluation.
//!
//! Each window optimises on its train range, then evaluates the frozen best
//! parameters on the test range that immediately follows. The train bars are
//! passed along as look-back context, and every trade still open inside the
//! test range counts. A position carried over from the train range is
//! re-entered at the close of the last train bar, so only its test-range P&L
//! is scored. All out-of-sample trades are stitched into one trade log and
//! scored as a single synthetic equity curve.
//!
//! The Monte Carlo variant permutes only the test segment of each window
//! (the train segment stays real) and re-evaluates the frozen parameters.

use std::ops::Range;

use permlab_core::{
    permute_series, ParamSet, RngHierarchy, Series, Stage, Strategy, TradeRecord,
    ValidationError,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::config::TestConfig;
use crate::error::TestError;
use crate::monte_carlo::{collect_metrics, permutation_p_value, run_trials, TrialOutcome};
use crate::optimizer::{optimize, ParamSpace};
use crate::runner::run_strategy;

// ─── Windows ─────────────────────────────────────────────────────────

/// One train/test pair (bar index ranges, end-exclusive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub index: usize,
    pub train: Range<usize>,
    pub test: Range<usize>,
}

impl Window {
    /// Bars covered by the window, train then test.
    pub fn span(&self) -> Range<usize> {
        self.train.start..self.test.end
    }

    pub fn train_len(&self) -> usize {
        self.train.end - self.train.start
    }
}

/// Slide a fixed-size train/test pair across the series by `step`.
///
/// Stops once the test range would run past the end; a trailing window with a
/// short test range is dropped, never truncated.
pub fn schedule(
    series_len: usize,
    train_span: usize,
    test_span: usize,
    step: usize,
) -> Result<Vec<Window>, ValidationError> {
    if train_span == 0 || test_span == 0 || step == 0 {
        return Err(ValidationError::InvalidParameter(
            "train_span, test_span and step must be positive".into(),
        ));
    }
    if step < test_span {
        return Err(ValidationError::InvalidParameter(format!(
            "step ({step}) smaller than test_span ({test_span}) would overlap test ranges"
        )));
    }
    if train_span + test_span > series_len {
        return Err(ValidationError::InvalidRange {
            start: 0,
            end: train_span + test_span,
            len: series_len,
        });
    }

    let windows = (0..)
        .map(|k| k * step)
        .take_while(|start| start + train_span + test_span <= series_len)
        .enumerate()
        .map(|(index, start)| {
            let train = start..start + train_span;
            let test = train.end..train.end + test_span;
            Window { index, train, test }
        })
        .collect();
    Ok(windows)
}

// ─── Result types ────────────────────────────────────────────────────

/// Out-of-sample outcome of a single window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowResult {
    pub window: Window,
    /// Parameters optimised on the train range, frozen for the test range.
    pub params: ParamSet,
    pub train_metric: f64,
    pub test_metric: f64,
    /// Out-of-sample trades, indexed against the full series.
    pub trades: Vec<TradeRecord>,
}

/// Complete walk-forward run on the real series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardResult {
    pub windows: Vec<WindowResult>,
    /// Metric of all out-of-sample trades stitched together.
    pub aggregate_metric: f64,
    pub trade_count: usize,
}

/// Walk-forward run plus permutation test on the test segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardMcResult {
    pub walk_forward: WalkForwardResult,
    pub p_value: f64,
    pub trial_metrics: Vec<f64>,
    pub trial_count: usize,
    pub excluded_trials: usize,
    pub threshold: f64,
    pub passed: bool,
}

// ─── Evaluation ──────────────────────────────────────────────────────

/// Run frozen `params` over a window slice and keep trades that exit at or
/// after `test_offset`, re-indexed by `base`.
///
/// Trades entered before `test_offset` are carried from the close of bar
/// `test_offset - 1`.
fn out_of_sample_trades(
    strategy: &dyn Strategy,
    slice: &Series,
    params: &ParamSet,
    test_offset: usize,
    base: usize,
) -> Result<Vec<TradeRecord>, TestError> {
    let run = run_strategy(strategy, slice, params)?;
    let carry = test_offset
        .checked_sub(1)
        .and_then(|i| slice.bars().get(i).map(|bar| (i, bar)));
    Ok(run
        .trades
        .into_iter()
        .filter(|t| t.exit_index >= test_offset)
        .map(|t| match carry {
            Some((index, bar)) if t.entry_index < test_offset => t.carried_from(index, bar),
            _ => t,
        })
        .map(|t| t.offset_by(base))
        .collect())
}

/// Optimise on each train range and evaluate the frozen parameters on the
/// following test range.
pub fn run_walk_forward(
    strategy: &dyn Strategy,
    series: &Series,
    space: &ParamSpace,
    config: &TestConfig,
) -> Result<WalkForwardResult, TestError> {
    config.validate()?;
    let windows = schedule(series.len(), config.train_span, config.test_span, config.step)?;
    info!(
        strategy = strategy.name(),
        windows = windows.len(),
        train_span = config.train_span,
        test_span = config.test_span,
        "walk-forward started"
    );

    let mut results = Vec::with_capacity(windows.len());
    for window in windows {
        let wrap = |source: TestError| TestError::Window {
            index: window.index,
            source: Box::new(source),
        };

        let train = series.slice(window.train.clone()).map_err(|e| wrap(e.into()))?;
        let best = optimize(strategy, &train, space, config.parallel)
            .map_err(|e| wrap(e.into()))?;

        let slice = series.slice(window.span()).map_err(|e| wrap(e.into()))?;
        let trades = out_of_sample_trades(
            strategy,
            &slice,
            &best.params,
            window.train_len(),
            window.train.start,
        )
        .map_err(wrap)?;
        let test_metric = strategy
            .score_trades(&trades)
            .map_err(|e| wrap(e.into()))?;

        debug!(
            window = window.index,
            params = %best.params,
            train_metric = best.metric,
            test_metric,
            trades = trades.len(),
            "window evaluated"
        );

        results.push(WindowResult {
            window,
            params: best.params,
            train_metric: best.metric,
            test_metric,
            trades,
        });
    }

    let all_trades: Vec<TradeRecord> = results
        .iter()
        .flat_map(|r| r.trades.iter().cloned())
        .collect();
    let aggregate_metric = strategy.score_trades(&all_trades)?;
    info!(
        aggregate_metric,
        trades = all_trades.len(),
        "walk-forward finished"
    );

    Ok(WalkForwardResult {
        windows: results,
        aggregate_metric,
        trade_count: all_trades.len(),
    })
}

/// Aggregate metric of one permuted walk-forward trial.
fn permuted_walk_forward_metric(
    strategy: &dyn Strategy,
    series: &Series,
    windows: &[WindowResult],
    hierarchy: &RngHierarchy,
    trial: u64,
) -> Result<f64, TestError> {
    let mut trades = Vec::new();
    for result in windows {
        let window = &result.window;
        let slice = series.slice(window.span())?;
        let seed = hierarchy.sub_seed(Stage::WalkForward, window.index as u64, trial);
        let permuted = permute_series(&slice, window.train_len(), seed)?;
        trades.extend(out_of_sample_trades(
            strategy,
            &permuted,
            &result.params,
            window.train_len(),
            window.train.start,
        )?);
    }
    Ok(strategy.score_trades(&trades)?)
}

/// Walk-forward test with a permutation test on the out-of-sample segments.
pub fn walk_forward_mc_test(
    strategy: &dyn Strategy,
    series: &Series,
    space: &ParamSpace,
    config: &TestConfig,
    cancel: &CancelToken,
) -> Result<WalkForwardMcResult, TestError> {
    let walk_forward = run_walk_forward(strategy, series, space, config)?;
    let threshold = config
        .walk_forward_threshold
        .unwrap_or_else(|| default_walk_forward_threshold(series.span_years()));

    let hierarchy = RngHierarchy::new(config.rng_seed);
    let windows = &walk_forward.windows;
    let outcomes = run_trials(config.trial_count, config.parallel, cancel, |t| {
        match permuted_walk_forward_metric(strategy, series, windows, &hierarchy, t) {
            Ok(metric) => TrialOutcome::Metric(metric),
            Err(err) => {
                debug!(trial = t, error = %err, "walk-forward trial excluded");
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

    let p_value = permutation_p_value(walk_forward.aggregate_metric, &trial_metrics);
    let passed = p_value < threshold;
    info!(
        p_value,
        threshold,
        excluded = excluded_trials,
        passed,
        "walk-forward permutation test finished"
    );

    Ok(WalkForwardMcResult {
        walk_forward,
        p_value,
        trial_metrics,
        trial_count: config.trial_count,
        excluded_trials,
        threshold,
        passed,
    })
}

/// Significance level for the walk-forward stage given the data span.
///
/// 5% for under two years of data, 1% for two years or more.
pub fn default_walk_forward_threshold(years: f64) -> f64 {
    if years < 2.0 {
        0.05
    } else {
        0.01
    }
}
