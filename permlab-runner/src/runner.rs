//! Strategy runner — the boundary between the engine and an opaque strategy.

use permlab_core::{ParamSet, Series, Strategy, StrategyError, StrategyRun};
use tracing::trace;

/// Run `strategy` once and enforce the metric contract.
///
/// An empty series is always `InsufficientData`. A NaN or infinite metric is
/// rejected so that every accepted metric is totally ordered.
pub fn run_strategy(
    strategy: &dyn Strategy,
    series: &Series,
    params: &ParamSet,
) -> Result<StrategyRun, StrategyError> {
    if series.is_empty() {
        return Err(StrategyError::InsufficientData {
            needed: 1,
            available: 0,
        });
    }
    let run = strategy.run(series, params)?;
    if !run.metric.is_finite() {
        return Err(StrategyError::NonFiniteMetric);
    }
    trace!(
        strategy = strategy.name(),
        %params,
        bars = series.len(),
        metric = run.metric,
        trades = run.trades.len(),
        "strategy run"
    );
    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use permlab_core::Bar;

    struct Constant(f64);

    impl Strategy for Constant {
        fn name(&self) -> &str {
            "constant"
        }

        fn run(&self, _series: &Series, _params: &ParamSet) -> Result<StrategyRun, StrategyError> {
            Ok(StrategyRun {
                metric: self.0,
                trades: Vec::new(),
            })
        }
    }

    fn one_bar() -> Series {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Series::new(vec![Bar::new(t, 10.0, 11.0, 9.0, 10.5, 1.0)]).unwrap()
    }

    #[test]
    fn finite_metric_passes_through() {
        let run = run_strategy(&Constant(1.25), &one_bar(), &ParamSet::new()).unwrap();
        assert_eq!(run.metric, 1.25);
    }

    #[test]
    fn nan_metric_rejected() {
        let err = run_strategy(&Constant(f64::NAN), &one_bar(), &ParamSet::new()).unwrap_err();
        assert_eq!(err, StrategyError::NonFiniteMetric);
    }

    #[test]
    fn empty_series_is_insufficient() {
        let empty = Series::new(Vec::new()).unwrap();
        let err = run_strategy(&Constant(1.0), &empty, &ParamSet::new()).unwrap_err();
        assert!(matches!(err, StrategyError::InsufficientData { .. }));
    }
}
