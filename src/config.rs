//! Engine configuration
//!
//! All knobs are fixed at construction time; the engine never mutates its
//! configuration after `MiceImputer::new`.

use crate::error::{MiceError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Order in which columns are visited each round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisitSequence {
    /// Ascending column index
    Roman,
    /// Descending column index
    Arabic,
    /// Descending per-column missing count
    Monotone,
    /// Ascending per-column missing count
    RevMonotone,
}

impl FromStr for VisitSequence {
    type Err = MiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "roman" => Ok(VisitSequence::Roman),
            "arabic" => Ok(VisitSequence::Arabic),
            "monotone" => Ok(VisitSequence::Monotone),
            "revmonotone" => Ok(VisitSequence::RevMonotone),
            other => Err(MiceError::ConfigError(format!(
                "unknown visit sequence: {}",
                other
            ))),
        }
    }
}

/// How missing values are sampled each round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImputeMode {
    /// Draw from the model's posterior predictive distribution
    ColumnPosterior,
    /// Predictive mean matching: copy the observed value of a row with a
    /// nearby model prediction
    PredictiveMeanMatching,
}

impl FromStr for ImputeMode {
    type Err = MiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "col" => Ok(ImputeMode::ColumnPosterior),
            "pmm" => Ok(ImputeMode::PredictiveMeanMatching),
            other => Err(MiceError::ConfigError(format!(
                "unknown impute type: {}",
                other
            ))),
        }
    }
}

/// Strategy for the initial fill of missing cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillMethod {
    /// Observed mean of the column
    Mean,
    /// Observed median of the column
    Median,
    /// Random draws from the observed values of the column
    Random,
}

impl FromStr for FillMethod {
    type Err = MiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mean" => Ok(FillMethod::Mean),
            "median" => Ok(FillMethod::Median),
            "random" => Ok(FillMethod::Random),
            other => Err(MiceError::ConfigError(format!(
                "unknown fill method: {}",
                other
            ))),
        }
    }
}

/// Configuration for [`MiceImputer`](crate::engine::MiceImputer)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiceConfig {
    /// Column visit order strategy
    pub visit_sequence: VisitSequence,
    /// Number of post-burn-in sampling rounds kept for averaging
    pub n_imputations: usize,
    /// Number of initial rounds discarded while the chain stabilizes
    pub n_burn_in: usize,
    /// Sampling algorithm
    pub impute_type: ImputeMode,
    /// Nearest neighbors considered by predictive mean matching
    pub n_pmm_neighbors: usize,
    /// Cap on predictor columns per target; `None` uses all other columns
    pub n_nearest_columns: Option<usize>,
    /// Initial fill strategy for missing cells
    pub init_fill_method: FillMethod,
    /// Lower clip bound for imputed values
    pub min_value: Option<f64>,
    /// Upper clip bound for imputed values
    pub max_value: Option<f64>,
    /// Random seed; unset means nondeterministic runs
    pub seed: Option<u64>,
    /// Emit per-round progress at info level
    pub verbose: bool,
    /// Capture fitted models per (round, column) for later row completion
    pub persist_models: bool,
}

impl Default for MiceConfig {
    fn default() -> Self {
        Self {
            visit_sequence: VisitSequence::Monotone,
            n_imputations: 100,
            n_burn_in: 10,
            impute_type: ImputeMode::ColumnPosterior,
            n_pmm_neighbors: 5,
            n_nearest_columns: None,
            init_fill_method: FillMethod::Mean,
            min_value: None,
            max_value: None,
            seed: None,
            verbose: false,
            persist_models: false,
        }
    }
}

impl MiceConfig {
    /// Create a configuration with the default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the column visit order strategy
    pub fn with_visit_sequence(mut self, seq: VisitSequence) -> Self {
        self.visit_sequence = seq;
        self
    }

    /// Set the number of sampling rounds
    pub fn with_n_imputations(mut self, n: usize) -> Self {
        self.n_imputations = n;
        self
    }

    /// Set the number of burn-in rounds
    pub fn with_n_burn_in(mut self, n: usize) -> Self {
        self.n_burn_in = n;
        self
    }

    /// Set the sampling algorithm
    pub fn with_impute_type(mut self, mode: ImputeMode) -> Self {
        self.impute_type = mode;
        self
    }

    /// Set the PMM neighbor count
    pub fn with_n_pmm_neighbors(mut self, n: usize) -> Self {
        self.n_pmm_neighbors = n;
        self
    }

    /// Cap the number of predictor columns per target column
    pub fn with_n_nearest_columns(mut self, n: usize) -> Self {
        self.n_nearest_columns = Some(n);
        self
    }

    /// Set the initial fill strategy
    pub fn with_init_fill_method(mut self, method: FillMethod) -> Self {
        self.init_fill_method = method;
        self
    }

    /// Clip imputed values to `[min, max]`
    pub fn with_value_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_value = min;
        self.max_value = max;
        self
    }

    /// Set the random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Toggle per-round progress reporting
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Capture fitted models for later out-of-sample row completion
    pub fn with_persist_models(mut self, persist: bool) -> Self {
        self.persist_models = persist;
        self
    }

    /// Check parameter consistency. Run once at engine construction.
    pub fn validate(&self) -> Result<()> {
        if self.n_imputations == 0 {
            return Err(MiceError::ConfigError(
                "n_imputations must be at least 1".to_string(),
            ));
        }
        if self.n_pmm_neighbors == 0 {
            return Err(MiceError::ConfigError(
                "n_pmm_neighbors must be at least 1".to_string(),
            ));
        }
        if self.n_nearest_columns == Some(0) {
            return Err(MiceError::ConfigError(
                "n_nearest_columns must be at least 1".to_string(),
            ));
        }
        if let (Some(min), Some(max)) = (self.min_value, self.max_value) {
            if min > max {
                return Err(MiceError::ConfigError(format!(
                    "min_value {} exceeds max_value {}",
                    min, max
                )));
            }
        }
        Ok(())
    }
}
