//! Round-robin imputation engine
//!
//! - [`visit`] - per-run column visit scheduling
//! - [`neighbors`] - predictor column selection
//! - [`sampler`] - posterior-predictive and PMM sampling
//! - [`aggregate`] - multi-imputation averaging
//! - [`mice`] - the round-robin driver

pub mod aggregate;
pub mod mice;
pub mod neighbors;
pub mod sampler;
pub mod visit;

pub use mice::{FittedSlot, MiceImputer, ModelEnsemble};
pub use visit::visit_order;
