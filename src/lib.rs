//! chainfill - chained-equation multiple imputation for numeric matrices
//!
//! Fills missing entries (NaN) of a 2-d float matrix with Multivariate
//! Imputation by Chained Equations (MICE): each column with missing data is
//! repeatedly regressed on the other columns, plausible values are sampled
//! from the fitted conditional model, and several sampled completions are
//! averaged into the final matrix.
//!
//! # Modules
//!
//! ## Engine
//! - [`engine`] - the round-robin driver, visit scheduling, predictor
//!   selection, stochastic sampling, and sample averaging
//! - [`model`] - the conditional-model contract and the default Bayesian
//!   ridge regressor
//! - [`store`] - persisted fitted models and out-of-sample row completion
//!
//! ## Support
//! - [`config`] - construction-time engine configuration
//! - [`fill`] - missingness predicates, validation, initial fill, clipping
//! - [`metrics`] - masked evaluation metrics
//! - [`error`] - crate error type
//!
//! # Example
//!
//! ```
//! use chainfill::config::MiceConfig;
//! use chainfill::engine::MiceImputer;
//! use ndarray::arr2;
//!
//! let x = arr2(&[
//!     [1.0, 10.0],
//!     [2.0, f64::NAN],
//!     [3.0, 30.0],
//!     [4.0, 40.0],
//! ]);
//!
//! let config = MiceConfig::new()
//!     .with_n_burn_in(2)
//!     .with_n_imputations(10)
//!     .with_seed(42);
//! let mut imputer = MiceImputer::new(config).unwrap();
//! let completed = imputer.complete(&x).unwrap();
//! assert!(!completed.iter().any(|v| v.is_nan()));
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod fill;
pub mod metrics;
pub mod model;
pub mod store;

pub use error::{MiceError, Result};

/// Re-export of the commonly used types
pub mod prelude {
    pub use crate::config::{FillMethod, ImputeMode, MiceConfig, VisitSequence};
    pub use crate::engine::{FittedSlot, MiceImputer, ModelEnsemble};
    pub use crate::error::{MiceError, Result};
    pub use crate::fill::{is_missing, missing_mask};
    pub use crate::metrics::{masked_mae, masked_mse};
    pub use crate::model::{BayesianRidge, ConditionalModel};
    pub use crate::store::{ModelStore, RowCompleter};
}
