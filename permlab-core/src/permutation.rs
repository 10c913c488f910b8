//! Bar permutation generator.
//!
//! A permutation is a pair of independent orderings over brick indices: one
//! for gaps, one for the `(up, down, close_move)` bar bodies. Bodies are moved
//! as whole triplets so every reconstructed bar stays internally coherent,
//! while temporal structure (autocorrelation, volatility clustering) is
//! destroyed. Because values are reordered rather than resampled, every brick
//! distribution keeps its exact multiset of values.

use std::ops::Range;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::bricks::{decompose_range, reconstruct_bars, BrickSet};
use crate::domain::Series;
use crate::error::ValidationError;
use crate::rng::{RngHierarchy, Stage};

/// Index mappings applied to a brick set during reconstruction.
///
/// Reconstructed bar `k` takes `gap[self.gap[k]]` and the body at
/// `self.body[k]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permutation {
    pub gap: Vec<usize>,
    pub body: Vec<usize>,
}

impl Permutation {
    /// The ordering that reproduces the source bars.
    pub fn identity(brick_count: usize) -> Self {
        Self {
            gap: (0..brick_count).collect(),
            body: (0..brick_count).collect(),
        }
    }

    /// Two independent uniform permutations of `[0, brick_count)`.
    pub fn generate(brick_count: usize, seed: u64) -> Self {
        Self::generate_with_pinned(brick_count, 0, seed)
    }

    /// Permutation for a specific brick set, keeping its pinned gaps in place.
    pub fn for_bricks(bricks: &BrickSet, seed: u64) -> Self {
        Self::generate_with_pinned(bricks.len(), bricks.pinned_gaps, seed)
    }

    fn generate_with_pinned(brick_count: usize, pinned_gaps: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut perm = Self::identity(brick_count);
        perm.body.shuffle(&mut rng);
        let pinned = pinned_gaps.min(brick_count);
        perm.gap[pinned..].shuffle(&mut rng);
        perm
    }

    pub fn len(&self) -> usize {
        self.gap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gap.is_empty()
    }

    pub fn is_identity(&self) -> bool {
        let ordered = |v: &[usize]| v.iter().enumerate().all(|(i, &x)| i == x);
        ordered(&self.gap) && ordered(&self.body)
    }
}

/// Permute every bar from `start_index` on; earlier bars are kept as the
/// real historical prefix.
pub fn permute_series(
    series: &Series,
    start_index: usize,
    seed: u64,
) -> Result<Series, ValidationError> {
    permute_segment(series, start_index..series.len(), seed)
}

/// Permute only the bars inside `range`.
///
/// Bars before the range anchor the reconstruction chain; bars after it are
/// copied unchanged.
pub fn permute_segment(
    series: &Series,
    range: Range<usize>,
    seed: u64,
) -> Result<Series, ValidationError> {
    let bricks = decompose_range(series, range.start, range.end)?;
    let perm = Permutation::for_bricks(&bricks, seed);
    let bars = series.bars();
    let mut out = reconstruct_bars(&bars[..range.start], &bricks, &perm)?;
    out.extend_from_slice(&bars[range.end..]);
    Ok(Series::from_reconstructed(out))
}

/// Generate `count` independent permutations of a segment.
///
/// Per-permutation seeds are derived from `master_seed`, so permutation `i` is
/// replayable on its own with `permute_segment(series, range, sub_seed)`.
pub fn segment_permutations(
    series: &Series,
    range: Range<usize>,
    count: usize,
    master_seed: u64,
) -> Result<Vec<Series>, ValidationError> {
    RngHierarchy::new(master_seed)
        .trial_seeds(Stage::Segment, range.start as u64, count)
        .map(|seed| permute_segment(series, range.clone(), seed))
        .collect()
}
