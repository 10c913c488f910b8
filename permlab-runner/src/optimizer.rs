//! Exhaustive parameter search over an explicitly enumerated space.

use std::collections::BTreeMap;

use permlab_core::{ParamSet, Series, Strategy, StrategyError, ValidationError};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::runner::run_strategy;

/// Ordered list of parameter sets to search.
///
/// The enumeration order is fixed at construction and decides ties: the first
/// set reaching the maximum metric wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamSpace {
    sets: Vec<ParamSet>,
}

impl ParamSpace {
    pub fn from_sets(sets: Vec<ParamSet>) -> Self {
        Self { sets }
    }

    /// Cartesian product of a parameter grid.
    ///
    /// Keys are enumerated in sorted order with the last key varying fastest.
    /// A grid with no keys yields a single empty set; a key with no values
    /// yields an empty space.
    pub fn from_grid(grid: &BTreeMap<String, Vec<f64>>) -> Self {
        let mut sets = vec![ParamSet::new()];
        for (name, values) in grid {
            sets = sets
                .iter()
                .flat_map(|base| values.iter().map(move |&v| base.clone().with(name, v)))
                .collect();
        }
        Self { sets }
    }

    pub fn sets(&self) -> &[ParamSet] {
        &self.sets
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

/// Best configuration found by a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Optimum {
    pub params: ParamSet,
    pub metric: f64,
    /// Parameter sets that produced a metric.
    pub evaluated: usize,
    /// Parameter sets skipped for insufficient data or invalid values.
    pub skipped: usize,
}

/// Search `space` for the parameter set maximising the strategy's metric.
///
/// Evaluations may run in parallel, but results are reduced in enumeration
/// order so the tie-break does not depend on completion order.
pub fn optimize(
    strategy: &dyn Strategy,
    series: &Series,
    space: &ParamSpace,
    parallel: bool,
) -> Result<Optimum, ValidationError> {
    if space.is_empty() {
        return Err(ValidationError::InvalidParameter(
            "parameter space is empty".into(),
        ));
    }

    let evaluate = |params: &ParamSet| run_strategy(strategy, series, params).map(|r| r.metric);
    let results: Vec<Result<f64, StrategyError>> = if parallel {
        space.sets().par_iter().map(evaluate).collect()
    } else {
        space.sets().iter().map(evaluate).collect()
    };

    let mut best: Option<(usize, f64)> = None;
    let mut skipped = 0;
    let mut shortfall: Option<(usize, usize)> = None;

    for (i, result) in results.iter().enumerate() {
        match result {
            Ok(metric) => {
                if best.map_or(true, |(_, b)| *metric > b) {
                    best = Some((i, *metric));
                }
            }
            Err(err) => {
                skipped += 1;
                debug!(params = %space.sets()[i], error = %err, "parameter set skipped");
                if let StrategyError::InsufficientData { needed, available } = err {
                    let min_needed = shortfall.map_or(*needed, |(n, _)| n.min(*needed));
                    shortfall = Some((min_needed, *available));
                }
            }
        }
    }

    match best {
        Some((index, metric)) => Ok(Optimum {
            params: space.sets()[index].clone(),
            metric,
            evaluated: results.len() - skipped,
            skipped,
        }),
        None => Err(match shortfall {
            Some((needed, available)) => ValidationError::InsufficientData { needed, available },
            None => ValidationError::InvalidParameter(format!(
                "no parameter set in the space is valid for '{}'",
                strategy.name()
            )),
        }),
    }
}
