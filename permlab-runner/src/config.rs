//! Serializable test and protocol configuration.
//!
//! A protocol file is TOML with three tables:
//!
//! ```toml
//! [test]
//! trial_count = 200
//! train_span = 600
//! test_span = 100
//! step = 100
//!
//! [strategy]
//! type = "MA_CROSSOVER"
//! allow_short = true
//!
//! [params]
//! fast = [5, 10, 20]
//! slow = [50, 100]
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use permlab_core::strategies::MaCrossover;
use permlab_core::{MetricKind, Strategy, ValidationError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::optimizer::ParamSpace;

/// Unique identifier for a protocol run (content-addressable hash).
pub type RunId = String;

/// Errors from loading a protocol configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

// ─── Test configuration ─────────────────────────────────────────────

/// Parameters shared by all four stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestConfig {
    /// First bar of the in-sample permutation. Earlier bars stay real.
    pub start_index: usize,
    /// Permutation trials per Monte Carlo stage.
    pub trial_count: usize,
    pub train_span: usize,
    pub test_span: usize,
    pub step: usize,
    /// Significance level for the in-sample stage.
    pub p_value_threshold: f64,
    /// Significance level for the walk-forward stage; derived from the data
    /// span when absent.
    pub walk_forward_threshold: Option<f64>,
    pub rng_seed: u64,
    pub parallel: bool,
    /// Skip the walk-forward stages when the in-sample stage fails.
    pub stop_on_failure: bool,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            start_index: 0,
            trial_count: 200,
            train_span: 600,
            test_span: 100,
            step: 100,
            p_value_threshold: 0.01,
            walk_forward_threshold: None,
            rng_seed: 42,
            parallel: true,
            stop_on_failure: true,
        }
    }
}

impl TestConfig {
    /// Reject values that would make any stage meaningless.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.trial_count == 0 {
            return Err(ValidationError::InvalidParameter(
                "trial_count must be at least 1".into(),
            ));
        }
        if self.train_span == 0 || self.test_span == 0 || self.step == 0 {
            return Err(ValidationError::InvalidParameter(
                "train_span, test_span and step must be positive".into(),
            ));
        }
        check_threshold("p_value_threshold", self.p_value_threshold)?;
        if let Some(t) = self.walk_forward_threshold {
            check_threshold("walk_forward_threshold", t)?;
        }
        Ok(())
    }
}

fn check_threshold(name: &str, value: f64) -> Result<(), ValidationError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ValidationError::InvalidParameter(format!(
            "{name} must be in (0, 1], got {value}"
        )))
    }
}

// ─── Strategy selection ─────────────────────────────────────────────

/// Strategy to validate (serializable enum).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyConfig {
    /// Moving average crossover over closes, params `fast` and `slow`.
    MaCrossover {
        #[serde(default)]
        allow_short: bool,
        #[serde(default)]
        metric: MetricKind,
    },
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self::MaCrossover {
            allow_short: false,
            metric: MetricKind::default(),
        }
    }
}

impl StrategyConfig {
    pub fn build(&self) -> Box<dyn Strategy> {
        match self {
            Self::MaCrossover {
                allow_short,
                metric,
            } => Box::new(MaCrossover::new(*allow_short, *metric)),
        }
    }
}

// ─── Protocol file ──────────────────────────────────────────────────

/// Everything needed to reproduce a validation run, minus the data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    #[serde(default)]
    pub test: TestConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    /// Parameter grid, expanded as a cartesian product.
    #[serde(default)]
    pub params: BTreeMap<String, Vec<f64>>,
}

impl ProtocolConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.test.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn param_space(&self) -> ParamSpace {
        ParamSpace::from_grid(&self.params)
    }

    /// Deterministic hash of the configuration.
    ///
    /// Two runs with identical configs share a RunId.
    pub fn run_id(&self) -> RunId {
        // BTreeMap keys and struct field order make the JSON canonical.
        let json = serde_json::to_string(self).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[test]
trial_count = 50
train_span = 300
test_span = 50
step = 50
rng_seed = 7

[strategy]
type = "MA_CROSSOVER"
allow_short = true
metric = "profit_factor"

[params]
fast = [5, 10]
slow = [30, 60]
"#;

    #[test]
    fn parses_sample_protocol() {
        let config = ProtocolConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.test.trial_count, 50);
        assert_eq!(config.test.rng_seed, 7);
        // Unset fields keep their defaults.
        assert_eq!(config.test.p_value_threshold, 0.01);
        assert!(config.test.parallel);
        assert_eq!(
            config.strategy,
            StrategyConfig::MaCrossover {
                allow_short: true,
                metric: MetricKind::ProfitFactor
            }
        );
        assert_eq!(config.param_space().len(), 4);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = ProtocolConfig::from_toml("").unwrap();
        assert_eq!(config.test, TestConfig::default());
        assert_eq!(config.strategy, StrategyConfig::default());
    }

    #[test]
    fn zero_trials_rejected() {
        let err = ProtocolConfig::from_toml("[test]\ntrial_count = 0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid(ValidationError::InvalidParameter(_))
        ));
    }

    #[test]
    fn threshold_bounds() {
        let mut config = TestConfig::default();
        config.p_value_threshold = 0.0;
        assert!(config.validate().is_err());
        config.p_value_threshold = 1.0;
        assert!(config.validate().is_ok());
        config.walk_forward_threshold = Some(1.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_step_rejected() {
        let config = TestConfig {
            step: 0,
            ..TestConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_strategy_type_is_parse_error() {
        let err = ProtocolConfig::from_toml("[strategy]\ntype = \"RSI\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn run_id_deterministic_and_param_sensitive() {
        let a = ProtocolConfig::from_toml(SAMPLE).unwrap();
        let mut b = a.clone();
        assert_eq!(a.run_id(), b.run_id());
        b.test.rng_seed += 1;
        assert_ne!(a.run_id(), b.run_id());
    }

    #[test]
    fn build_returns_named_strategy() {
        let strategy = StrategyConfig::default().build();
        assert_eq!(strategy.name(), "ma_crossover");
    }
}
