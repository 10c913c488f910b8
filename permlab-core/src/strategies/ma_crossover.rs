//! Moving Average Crossover strategy
//!
//! Classic trend-following rule evaluated at each bar close:
//! - Long while the fast SMA of closes is above the slow SMA
//! - Short (if enabled) or flat while it is below
//!
//! Positions change at the close of the bar that flips the signal. Any position
//! still open on the last bar is closed at that bar's close.

use crate::domain::{Series, TradeRecord, TradeSide};
use crate::metrics::MetricKind;
use crate::strategy::{ParamSet, Strategy, StrategyError, StrategyRun};

/// Moving Average Crossover
///
/// # Parameters
/// - `fast`: short SMA period (e.g., 10)
/// - `slow`: long SMA period (e.g., 50), must exceed `fast`
#[derive(Debug, Clone)]
pub struct MaCrossover {
    allow_short: bool,
    metric: MetricKind,
}

impl MaCrossover {
    pub fn new(allow_short: bool, metric: MetricKind) -> Self {
        Self {
            allow_short,
            metric,
        }
    }

    pub fn long_only(metric: MetricKind) -> Self {
        Self::new(false, metric)
    }

    fn periods(params: &ParamSet) -> Result<(usize, usize), StrategyError> {
        let fast = params.get_usize("fast")?;
        let slow = params.get_usize("slow")?;
        if fast == 0 {
            return Err(StrategyError::InvalidParameters("fast must be > 0".into()));
        }
        if slow <= fast {
            return Err(StrategyError::InvalidParameters(format!(
                "slow ({slow}) must be > fast ({fast})"
            )));
        }
        Ok((fast, slow))
    }

    fn desired_side(&self, fast: f64, slow: f64) -> Option<TradeSide> {
        if fast > slow {
            Some(TradeSide::Long)
        } else if fast < slow && self.allow_short {
            Some(TradeSide::Short)
        } else {
            None
        }
    }
}

/// Rolling simple moving average; `None` until `period` values are available.
fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for (i, v) in values.iter().enumerate() {
        sum += v;
        if i >= period {
            sum -= values[i - period];
        }
        out.push((i + 1 >= period).then(|| sum / period as f64));
    }
    out
}

impl Strategy for MaCrossover {
    fn name(&self) -> &str {
        "ma_crossover"
    }

    fn metric(&self) -> MetricKind {
        self.metric
    }

    fn run(&self, series: &Series, params: &ParamSet) -> Result<StrategyRun, StrategyError> {
        let (fast_period, slow_period) = Self::periods(params)?;
        let needed = slow_period + 1;
        if series.len() < needed {
            return Err(StrategyError::InsufficientData {
                needed,
                available: series.len(),
            });
        }

        let bars = series.bars();
        let closes = series.closes();
        let fast = sma(&closes, fast_period);
        let slow = sma(&closes, slow_period);

        let mut trades = Vec::new();
        let mut open: Option<(TradeSide, usize)> = None;

        for i in 0..bars.len() {
            let (Some(f), Some(s)) = (fast[i], slow[i]) else {
                continue;
            };
            let target = self.desired_side(f, s);
            let current = open.map(|(side, _)| side);
            if target == current {
                continue;
            }
            if let Some((side, entry)) = open.take() {
                trades.push(close_trade(series, side, entry, i));
            }
            if let Some(side) = target {
                open = Some((side, i));
            }
        }

        let last = bars.len() - 1;
        if let Some((side, entry)) = open {
            if entry < last {
                trades.push(close_trade(series, side, entry, last));
            }
        }

        let metric = self.score_trades(&trades)?;
        Ok(StrategyRun { metric, trades })
    }
}

fn close_trade(series: &Series, side: TradeSide, entry: usize, exit: usize) -> TradeRecord {
    let bars = series.bars();
    TradeRecord {
        side,
        entry_index: entry,
        entry_time: bars[entry].timestamp,
        entry_price: bars[entry].close,
        exit_index: exit,
        exit_time: bars[exit].timestamp,
        exit_price: bars[exit].close,
    }
}
