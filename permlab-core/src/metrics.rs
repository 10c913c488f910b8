//! Performance metrics — pure functions over a trade log.
//!
//! Every metric is a pure function: trade list in, scalar out. A trade log is
//! treated as one synthetic equity curve by compounding trade returns in
//! order, which is how walk-forward segments are stitched together.

use serde::{Deserialize, Serialize};

use crate::domain::TradeRecord;

/// Which metric a strategy is scored by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    #[default]
    TotalReturn,
    Cagr,
    Sharpe,
    ProfitFactor,
    WinRate,
}

impl MetricKind {
    /// Compute this metric over a trade log.
    pub fn evaluate(&self, trades: &[TradeRecord]) -> f64 {
        match self {
            Self::TotalReturn => total_return(trades),
            Self::Cagr => cagr(trades),
            Self::Sharpe => trade_sharpe(trades),
            Self::ProfitFactor => profit_factor(trades),
            Self::WinRate => win_rate(trades),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::TotalReturn => "total_return",
            Self::Cagr => "cagr",
            Self::Sharpe => "sharpe",
            Self::ProfitFactor => "profit_factor",
            Self::WinRate => "win_rate",
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Synthetic equity curve starting at 1.0, one point per closed trade.
pub fn equity_curve(trades: &[TradeRecord]) -> Vec<f64> {
    let mut curve = Vec::with_capacity(trades.len() + 1);
    curve.push(1.0);
    let mut equity = 1.0;
    for t in trades {
        equity *= 1.0 + t.return_pct();
        curve.push(equity);
    }
    curve
}

/// Compounded return of all trades as a fraction.
pub fn total_return(trades: &[TradeRecord]) -> f64 {
    trades.iter().map(|t| 1.0 + t.return_pct()).product::<f64>() - 1.0
}

/// Compound annual growth rate over the span from first entry to last exit.
///
/// Returns 0.0 when the span is empty or the equity is wiped out.
pub fn cagr(trades: &[TradeRecord]) -> f64 {
    let (Some(first), Some(last)) = (trades.first(), trades.last()) else {
        return 0.0;
    };
    let secs = (last.exit_time - first.entry_time).num_seconds() as f64;
    let years = secs / (365.25 * 86_400.0);
    let growth = 1.0 + total_return(trades);
    if years <= 0.0 || growth <= 0.0 {
        return 0.0;
    }
    growth.powf(1.0 / years) - 1.0
}

/// Per-trade Sharpe ratio: mean trade return / std of trade returns.
///
/// Not annualized. Returns 0.0 with fewer than 2 trades or zero variance.
pub fn trade_sharpe(trades: &[TradeRecord]) -> f64 {
    let returns: Vec<f64> = trades.iter().map(|t| t.return_pct()).collect();
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(&returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(&returns) / std
}

/// Profit factor: gross gains / gross losses, in return terms.
///
/// Capped at 100.0 for edge cases (all winners, zero losses).
pub fn profit_factor(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let (gains, losses) = trades.iter().map(|t| t.return_pct()).fold(
        (0.0_f64, 0.0_f64),
        |(g, l), r| {
            if r > 0.0 {
                (g + r, l)
            } else {
                (g, l - r)
            }
        },
    );
    if losses < 1e-10 {
        return if gains > 0.0 { 100.0 } else { 0.0 };
    }
    (gains / losses).min(100.0)
}

/// Win rate: fraction of trades that were winners.
pub fn win_rate(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| t.is_winner()).count() as f64 / trades.len() as f64
}

// ─── Helpers ────────────────────────────────────────────────────────

pub fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TradeSide;
    use chrono::{Duration, TimeZone, Utc};

    fn make_trade(day: i64, entry: f64, exit: f64) -> TradeRecord {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        TradeRecord {
            side: TradeSide::Long,
            entry_index: day as usize,
            entry_time: t0 + Duration::days(day),
            entry_price: entry,
            exit_index: day as usize + 10,
            exit_time: t0 + Duration::days(day + 10),
            exit_price: exit,
        }
    }

    #[test]
    fn total_return_compounds() {
        let trades = vec![make_trade(0, 100.0, 110.0), make_trade(20, 100.0, 110.0)];
        assert!((total_return(&trades) - 0.21).abs() < 1e-12);
    }

    #[test]
    fn empty_log_scores_zero() {
        for kind in [
            MetricKind::TotalReturn,
            MetricKind::Cagr,
            MetricKind::Sharpe,
            MetricKind::ProfitFactor,
            MetricKind::WinRate,
        ] {
            assert_eq!(kind.evaluate(&[]), 0.0, "{}", kind.name());
        }
    }

    #[test]
    fn equity_curve_tracks_compounding() {
        let trades = vec![make_trade(0, 100.0, 120.0), make_trade(20, 100.0, 50.0)];
        let curve = equity_curve(&trades);
        assert_eq!(curve.len(), 3);
        assert!((curve[1] - 1.2).abs() < 1e-12);
        assert!((curve[2] - 0.6).abs() < 1e-12);
    }

    #[test]
    fn profit_factor_ratio_and_cap() {
        let trades = vec![make_trade(0, 100.0, 130.0), make_trade(20, 100.0, 90.0)];
        assert!((profit_factor(&trades) - 3.0).abs() < 1e-9);
        let winners = vec![make_trade(0, 100.0, 130.0)];
        assert_eq!(profit_factor(&winners), 100.0);
    }

    #[test]
    fn win_rate_counts_winners() {
        let trades = vec![
            make_trade(0, 100.0, 101.0),
            make_trade(20, 100.0, 99.0),
            make_trade(40, 100.0, 102.0),
            make_trade(60, 100.0, 100.0),
        ];
        assert!((win_rate(&trades) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn sharpe_needs_dispersion() {
        let same = vec![make_trade(0, 100.0, 110.0), make_trade(20, 100.0, 110.0)];
        assert_eq!(trade_sharpe(&same), 0.0);
        let mixed = vec![make_trade(0, 100.0, 120.0), make_trade(20, 100.0, 100.0)];
        assert!(trade_sharpe(&mixed) > 0.0);
    }

    #[test]
    fn cagr_over_one_year() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let trade = TradeRecord {
            side: TradeSide::Long,
            entry_index: 0,
            entry_time: t0,
            entry_price: 100.0,
            exit_index: 252,
            exit_time: t0 + Duration::seconds((365.25 * 86_400.0) as i64),
            exit_price: 110.0,
        };
        assert!((cagr(&[trade]) - 0.10).abs() < 1e-9);
    }

    #[test]
    fn metric_kind_serializes_snake_case() {
        let json = serde_json::to_string(&MetricKind::ProfitFactor).unwrap();
        assert_eq!(json, "\"profit_factor\"");
    }
}
