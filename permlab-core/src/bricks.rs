//! Bar decomposition into log-price bricks and reconstruction back into bars.
//!
//! Each bar after the start index is split into four log moves:
//! - `gap`: previous close → open
//! - `up`: open → high
//! - `down`: open → low
//! - `close_move`: open → close
//!
//! Reconstruction walks the bricks left to right, carrying the previous close
//! as the only accumulator. The chain makes reconstruction inherently
//! sequential within one series.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Bar, Series};
use crate::error::ValidationError;
use crate::permutation::Permutation;

/// Decomposed log-price representation of a contiguous run of bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrickSet {
    /// Index of the first decomposed bar in the source series.
    pub start_index: usize,
    /// Log price the first gap is measured from: the previous bar's close, or
    /// the first bar's own open when decomposition starts at bar 0.
    pub anchor: f64,
    /// Leading gaps that must stay in place (1 when starting at bar 0).
    pub pinned_gaps: usize,
    pub gap: Vec<f64>,
    pub up: Vec<f64>,
    pub down: Vec<f64>,
    pub close_move: Vec<f64>,
    pub timestamps: Vec<DateTime<Utc>>,
    pub volumes: Vec<f64>,
}

impl BrickSet {
    pub fn len(&self) -> usize {
        self.gap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gap.is_empty()
    }

    /// Index one past the last decomposed bar in the source series.
    pub fn end_index(&self) -> usize {
        self.start_index + self.len()
    }
}

/// Decompose every bar from `start_index` to the end of the series.
pub fn decompose(series: &Series, start_index: usize) -> Result<BrickSet, ValidationError> {
    decompose_range(series, start_index, series.len())
}

/// Decompose bars in `[start, end)`. Bars outside the range are not represented.
pub fn decompose_range(
    series: &Series,
    start: usize,
    end: usize,
) -> Result<BrickSet, ValidationError> {
    let len = series.len();
    if start >= end || end > len {
        return Err(ValidationError::InvalidRange { start, end, len });
    }
    let bars = series.bars();

    let (anchor, pinned_gaps) = if start == 0 {
        (bars[0].open.ln(), 1)
    } else {
        (bars[start - 1].close.ln(), 0)
    };

    let count = end - start;
    let mut set = BrickSet {
        start_index: start,
        anchor,
        pinned_gaps,
        gap: Vec::with_capacity(count),
        up: Vec::with_capacity(count),
        down: Vec::with_capacity(count),
        close_move: Vec::with_capacity(count),
        timestamps: Vec::with_capacity(count),
        volumes: Vec::with_capacity(count),
    };

    let mut prev_close = anchor;
    for bar in &bars[start..end] {
        let open = bar.open.ln();
        set.gap.push(open - prev_close);
        set.up.push(bar.high.ln() - open);
        set.down.push(bar.low.ln() - open);
        set.close_move.push(bar.close.ln() - open);
        set.timestamps.push(bar.timestamp);
        set.volumes.push(bar.volume);
        prev_close = bar.close.ln();
    }

    Ok(set)
}

/// Rebuild bars from `bricks` reordered by `permutation`, appended to `prefix`.
///
/// `prefix` must be exactly the bars before `bricks.start_index`. The first
/// reconstructed open is chained from the prefix's last close, or from the
/// brick set's anchor when the prefix is empty. Volume travels with the bar
/// body; timestamps stay in place.
pub fn reconstruct(
    prefix: &[Bar],
    bricks: &BrickSet,
    permutation: &Permutation,
) -> Result<Series, ValidationError> {
    let bars = reconstruct_bars(prefix, bricks, permutation)?;
    Ok(Series::from_reconstructed(bars))
}

pub(crate) fn reconstruct_bars(
    prefix: &[Bar],
    bricks: &BrickSet,
    permutation: &Permutation,
) -> Result<Vec<Bar>, ValidationError> {
    let count = bricks.len();
    if permutation.len() != count {
        return Err(ValidationError::InvalidParameter(format!(
            "permutation covers {} bricks, brick set has {count}",
            permutation.len()
        )));
    }
    if prefix.len() != bricks.start_index {
        return Err(ValidationError::InvalidRange {
            start: prefix.len(),
            end: bricks.end_index(),
            len: bricks.start_index + count,
        });
    }

    let anchor = prefix.last().map_or(bricks.anchor, |b| b.close.ln());

    let mut out = Vec::with_capacity(prefix.len() + count);
    out.extend_from_slice(prefix);

    permutation
        .gap
        .iter()
        .zip(&permutation.body)
        .zip(&bricks.timestamps)
        .fold(anchor, |prev_close, ((&g, &b), &timestamp)| {
            let open = prev_close + bricks.gap[g];
            let close = open + bricks.close_move[b];
            out.push(Bar {
                timestamp,
                open: open.exp(),
                high: (open + bricks.up[b]).exp(),
                low: (open + bricks.down[b]).exp(),
                close: close.exp(),
                volume: bricks.volumes[b],
            });
            close
        });

    Ok(out)
}
