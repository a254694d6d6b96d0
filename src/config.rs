//! Search configuration for mixture nodes
//!
//! All construction-time knobs are explicit parameters validated once;
//! nothing is read from ambient/global state.

use serde::{Deserialize, Serialize};

use crate::error::{MixNasError, Result};

/// How architecture weights are trained during search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchTrainerKind {
    /// Bilevel gradient descent on learnable mixture weights
    Bilevel,
    /// Joint gradient descent on learnable mixture weights
    Darts,
    /// No mixture weights; sub-operation outputs are summed unweighted
    NoAlpha,
}

impl ArchTrainerKind {
    /// Whether this trainer mode uses learnable mixture weights
    pub fn uses_alphas(&self) -> bool {
        !matches!(self, Self::NoAlpha)
    }
}

/// How a discrete operation is chosen once search completes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizerKind {
    /// Pick the top-weighted operation from the learned mixture weights
    Default,
    /// Pick a diverse subset from collected activations
    Diversity,
    /// Pick uniformly at random among eligible operations
    Random,
}

/// Configuration for mixture-node construction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Trainer mode for architecture weights
    pub trainer: ArchTrainerKind,
    /// Finalization strategy
    pub finalizer: FinalizerKind,
    /// Primitive catalog override, by canonical name (None = default catalog)
    pub catalog: Option<Vec<String>>,
    /// Primitives excluded from diversity-facing outputs, by canonical name
    pub excluded: Vec<String>,
    /// Random seed for weight initialization
    pub random_state: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            trainer: ArchTrainerKind::Darts,
            finalizer: FinalizerKind::Diversity,
            catalog: None,
            excluded: vec!["none".to_string()],
            random_state: Some(42),
        }
    }
}

impl SearchConfig {
    /// Create a new configuration
    pub fn new(trainer: ArchTrainerKind, finalizer: FinalizerKind) -> Self {
        Self {
            trainer,
            finalizer,
            ..Self::default()
        }
    }

    /// Set the primitive catalog by name
    pub fn with_catalog(mut self, names: Vec<String>) -> Self {
        self.catalog = Some(names);
        self
    }

    /// Set the excluded-from-diversity set by name
    pub fn with_excluded(mut self, names: Vec<String>) -> Self {
        self.excluded = names;
        self
    }

    /// Set the random seed
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Validate the configuration
    ///
    /// Without learned weights there is no way to pick a top-weighted
    /// operation, so `NoAlpha` + `Default` must fail at construction.
    pub fn validate(&self) -> Result<()> {
        if self.trainer == ArchTrainerKind::NoAlpha && self.finalizer == FinalizerKind::Default {
            return Err(MixNasError::ConfigError(
                "trainer 'no_alpha' cannot be combined with finalizer 'default'".to_string(),
            ));
        }
        if let Some(names) = &self.catalog {
            if names.is_empty() {
                return Err(MixNasError::ConfigError(
                    "primitive catalog must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}
