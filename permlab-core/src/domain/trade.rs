//! TradeRecord — a completed round-trip trade in a strategy's trade log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Long,
    Short,
}

/// A complete round-trip trade record: entry → exit.
///
/// Bar indices are relative to the series the strategy was run on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub side: TradeSide,

    // ── Entry ──
    pub entry_index: usize,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,

    // ── Exit ──
    pub exit_index: usize,
    pub exit_time: DateTime<Utc>,
    pub exit_price: f64,
}

impl TradeRecord {
    /// Return on the trade as a fraction of entry price.
    pub fn return_pct(&self) -> f64 {
        if self.entry_price <= 0.0 || self.exit_price <= 0.0 {
            return 0.0;
        }
        match self.side {
            TradeSide::Long => self.exit_price / self.entry_price - 1.0,
            TradeSide::Short => self.entry_price / self.exit_price - 1.0,
        }
    }

    pub fn is_winner(&self) -> bool {
        self.return_pct() > 0.0
    }

    pub fn bars_held(&self) -> usize {
        self.exit_index.saturating_sub(self.entry_index)
    }

    /// Shift bar indices, e.g. from a window-relative to a series-absolute frame.
    pub fn offset_by(mut self, offset: usize) -> Self {
        self.entry_index += offset;
        self.exit_index += offset;
        self
    }

    /// Re-open the position at the close of `bar` (at `index`), keeping the
    /// exit. Earlier P&L is dropped.
    pub fn carried_from(mut self, index: usize, bar: &Bar) -> Self {
        self.entry_index = index;
        self.entry_time = bar.timestamp;
        self.entry_price = bar.close;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn trade(side: TradeSide, entry: f64, exit: f64) -> TradeRecord {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        TradeRecord {
            side,
            entry_index: 5,
            entry_time: t,
            entry_price: entry,
            exit_index: 9,
            exit_time: t,
            exit_price: exit,
        }
    }

    #[test]
    fn long_return() {
        let t = trade(TradeSide::Long, 100.0, 110.0);
        assert!((t.return_pct() - 0.10).abs() < 1e-12);
        assert!(t.is_winner());
    }

    #[test]
    fn short_return() {
        let t = trade(TradeSide::Short, 100.0, 80.0);
        assert!((t.return_pct() - 0.25).abs() < 1e-12);
        let losing = trade(TradeSide::Short, 100.0, 125.0);
        assert!(!losing.is_winner());
    }

    #[test]
    fn offset_shifts_both_indices() {
        let t = trade(TradeSide::Long, 100.0, 101.0).offset_by(100);
        assert_eq!(t.entry_index, 105);
        assert_eq!(t.exit_index, 109);
        assert_eq!(t.bars_held(), 4);
    }

    #[test]
    fn carried_position_counts_from_new_entry() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        let bar = Bar::new(t0, 118.0, 121.0, 117.0, 120.0, 10.0);
        let t = trade(TradeSide::Long, 100.0, 132.0).carried_from(7, &bar);
        assert_eq!(t.entry_index, 7);
        assert_eq!(t.entry_time, t0);
        assert_eq!(t.entry_price, 120.0);
        assert_eq!(t.exit_index, 9);
        assert!((t.return_pct() - 0.10).abs() < 1e-12);
    }
}
