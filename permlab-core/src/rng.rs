//! Deterministic seed hierarchy.
//!
//! Every permutation consumed by a test gets its own seed, derived from the
//! master seed and its `(stage, window, trial)` coordinates with BLAKE3. Seeds
//! never depend on which worker derives them or in what order, so a test's
//! trial metrics are identical for any thread count.

use serde::{Deserialize, Serialize};

/// BLAKE3 key-derivation context; changing it changes every derived seed.
const SEED_CONTEXT: &str = "permlab 2024 permutation seed hierarchy v1";

/// Which consumer a seed belongs to. Distinct stages never share seeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    InSample,
    WalkForward,
    /// Stand-alone segment batches (no test attached).
    Segment,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InSample => "in_sample",
            Self::WalkForward => "walk_forward",
            Self::Segment => "segment",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RngHierarchy {
    master_seed: u64,
}

impl RngHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Seed for one trial. `window` is 0 for stages without windows.
    pub fn sub_seed(&self, stage: Stage, window: u64, trial: u64) -> u64 {
        let mut hasher = blake3::Hasher::new_derive_key(SEED_CONTEXT);
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(stage.as_str().as_bytes());
        hasher.update(&window.to_le_bytes());
        hasher.update(&trial.to_le_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hasher.finalize().as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    /// Seeds for trials `0..count` of one `(stage, window)`.
    pub fn trial_seeds(
        &self,
        stage: Stage,
        window: u64,
        count: usize,
    ) -> impl Iterator<Item = u64> + '_ {
        (0..count as u64).map(move |t| self.sub_seed(stage, window, t))
    }
}
