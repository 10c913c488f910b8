//! Property tests for the permutation invariants.
//!
//! Uses proptest to verify:
//! 1. Round-trip — identity permutation reproduces the series for any start index
//! 2. Distribution invariance — brick multisets survive any permutation
//! 3. Bar coherence — every reconstructed bar keeps high ≥ max(open, close) and
//!    low ≤ min(open, close)
//! 4. Prefix anchoring — bars before the start index are never touched

use chrono::{Duration, TimeZone, Utc};
use permlab_core::{decompose, permute_series, reconstruct, Bar, Permutation, Series};
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

/// One bar as (gap, close_move, extra_up, extra_down) log moves.
fn arb_moves() -> impl Strategy<Value = (f64, f64, f64, f64)> {
    (
        -0.05..0.05_f64,
        -0.04..0.04_f64,
        0.0..0.03_f64,
        0.0..0.03_f64,
    )
}

fn arb_series() -> impl Strategy<Value = Series> {
    (10.0..500.0_f64, prop::collection::vec(arb_moves(), 2..120)).prop_map(|(start, moves)| {
        let t0 = Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap();
        let mut prev_close = start;
        let bars = moves
            .iter()
            .enumerate()
            .map(|(i, &(gap, cm, up, down))| {
                let open = prev_close * gap.exp();
                let close = open * cm.exp();
                let high = open.max(close) * up.exp();
                let low = open.min(close) * (-down).exp();
                prev_close = close;
                Bar::new(t0 + Duration::hours(i as i64), open, high, low, close, i as f64)
            })
            .collect();
        Series::new(bars).expect("generated bars are valid")
    })
}

fn arb_series_and_start() -> impl Strategy<Value = (Series, usize)> {
    arb_series().prop_flat_map(|s| {
        let len = s.len();
        (Just(s), 0..len)
    })
}

fn sorted(mut v: Vec<f64>) -> Vec<f64> {
    v.sort_by(f64::total_cmp);
    v
}

fn rel_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

// ── 1. Round-trip ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn identity_round_trip((series, start) in arb_series_and_start()) {
        let bricks = decompose(&series, start).unwrap();
        let perm = Permutation::identity(bricks.len());
        let rebuilt = reconstruct(&series.bars()[..start], &bricks, &perm).unwrap();

        prop_assert_eq!(rebuilt.len(), series.len());
        for (a, b) in rebuilt.bars().iter().zip(series.bars()) {
            prop_assert_eq!(a.timestamp, b.timestamp);
            prop_assert!(rel_eq(a.open, b.open));
            prop_assert!(rel_eq(a.high, b.high));
            prop_assert!(rel_eq(a.low, b.low));
            prop_assert!(rel_eq(a.close, b.close));
        }
    }
}

// ── 2. Distribution invariance ───────────────────────────────────────

proptest! {
    #[test]
    fn brick_multisets_unchanged(
        (series, start) in arb_series_and_start(),
        seed in any::<u64>(),
    ) {
        let permuted = permute_series(&series, start, seed).unwrap();
        let before = decompose(&series, start).unwrap();
        let after = decompose(&permuted, start).unwrap();

        let pairs = [
            (before.gap, after.gap),
            (before.up, after.up),
            (before.down, after.down),
            (before.close_move, after.close_move),
        ];
        for (b, a) in pairs {
            for (x, y) in sorted(b).iter().zip(sorted(a).iter()) {
                prop_assert!((x - y).abs() < 1e-9);
            }
        }
    }
}

// ── 3. Bar coherence ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn reconstructed_bars_are_coherent(
        (series, start) in arb_series_and_start(),
        seed in any::<u64>(),
    ) {
        let permuted = permute_series(&series, start, seed).unwrap();
        for bar in permuted.bars() {
            let tol = 1e-12 * bar.high;
            prop_assert!(bar.high + tol >= bar.open.max(bar.close));
            prop_assert!(bar.low - tol <= bar.open.min(bar.close));
            prop_assert!(bar.low > 0.0);
        }
    }
}

// ── 4. Prefix anchoring ──────────────────────────────────────────────

proptest! {
    #[test]
    fn prefix_is_untouched(
        (series, start) in arb_series_and_start(),
        seed in any::<u64>(),
    ) {
        let permuted = permute_series(&series, start, seed).unwrap();
        prop_assert_eq!(&permuted.bars()[..start], &series.bars()[..start]);
        let stamps: Vec<_> = permuted.bars().iter().map(|b| b.timestamp).collect();
        let original: Vec<_> = series.bars().iter().map(|b| b.timestamp).collect();
        prop_assert_eq!(stamps, original);
    }
}
