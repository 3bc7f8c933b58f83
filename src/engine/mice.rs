//! Round-robin chained-equation driver
//!
//! One engine run is a strict sequence: validate, mask, schedule, initial
//! fill, then `n_burn_in + n_imputations` rounds. Within a round columns are
//! processed in visit order, and each column's model is fitted against the
//! working matrix as it stands at that moment, so columns visited earlier in
//! the same round have already been resampled. That chained dependency is
//! the algorithm; neither rounds nor columns can be parallelized.

use crate::config::{ImputeMode, MiceConfig};
use crate::engine::{aggregate, neighbors, sampler, visit};
use crate::error::{MiceError, Result};
use crate::fill;
use crate::model::{BayesianRidge, ConditionalModel};
use crate::store::ModelStore;
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// A fitted model together with the predictor columns it was trained on.
///
/// Replay gathers exactly these columns from the row being completed, so a
/// capped predictor subset round-trips correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedSlot<M> {
    pub model: M,
    pub predictors: Vec<usize>,
}

/// One slot per (round, column); `None` marks a column that was never
/// fitted that round (it had no missing data).
pub type ModelEnsemble<M> = Vec<Vec<Option<FittedSlot<M>>>>;

/// Chained-equation multiple imputation engine.
///
/// ```
/// use chainfill::config::MiceConfig;
/// use chainfill::engine::MiceImputer;
/// use ndarray::arr2;
///
/// let x = arr2(&[
///     [1.0, 2.0],
///     [2.0, f64::NAN],
///     [3.0, 6.0],
///     [4.0, 8.0],
/// ]);
/// let config = MiceConfig::new()
///     .with_n_burn_in(2)
///     .with_n_imputations(5)
///     .with_seed(42);
/// let mut imputer = MiceImputer::new(config).unwrap();
/// let completed = imputer.complete(&x).unwrap();
/// assert!(!completed[[1, 1]].is_nan());
/// ```
pub struct MiceImputer<M = BayesianRidge> {
    config: MiceConfig,
    prototype: M,
    rng: ChaCha8Rng,
    visit_order: Option<Vec<usize>>,
    column_init_values: Option<Vec<f64>>,
    ensemble: Option<ModelEnsemble<M>>,
}

impl MiceImputer<BayesianRidge> {
    /// Create an engine with the default Bayesian ridge model
    pub fn new(config: MiceConfig) -> Result<Self> {
        Self::with_model(config, BayesianRidge::default())
    }
}

impl<M: ConditionalModel + Clone> MiceImputer<M> {
    /// Create an engine driven by a caller-supplied model prototype.
    ///
    /// The prototype is cloned before every per-column fit, so each
    /// ensemble slot holds an independent fitted instance.
    pub fn with_model(config: MiceConfig, model: M) -> Result<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Ok(Self {
            config,
            prototype: model,
            rng,
            visit_order: None,
            column_init_values: None,
            ensemble: None,
        })
    }

    /// Engine configuration
    pub fn config(&self) -> &MiceConfig {
        &self.config
    }

    /// Column visit order of the last run
    pub fn visit_order(&self) -> Option<&[usize]> {
        self.visit_order.as_deref()
    }

    /// Per-column initial fill values of the last run
    pub fn column_init_values(&self) -> Option<&[f64]> {
        self.column_init_values.as_deref()
    }

    /// Run the full burn-in + sampling schedule and return the collected
    /// post-burn-in samples along with the missingness mask.
    ///
    /// Each returned sample holds the values of the missing cells (row-major
    /// order) at the end of one post-burn-in round.
    pub fn multiple_imputations(
        &mut self,
        x: &Array2<f64>,
    ) -> Result<(Vec<Vec<f64>>, Array2<bool>)> {
        fill::validate_matrix(x)?;
        let start = Instant::now();

        let mask = fill::missing_mask(x);
        let order = visit::visit_order(&mask, self.config.visit_sequence);
        self.visit_order = Some(order.clone());

        let n_cols = x.ncols();
        let total_rounds = self.config.n_burn_in + self.config.n_imputations;

        if self.config.persist_models {
            self.ensemble = Some(
                (0..total_rounds)
                    .map(|_| (0..n_cols).map(|_| None).collect())
                    .collect(),
            );
        }

        let cells = fill::missing_cells(&mask);
        if cells.is_empty() {
            debug!("input has no missing values, nothing to impute");
            self.column_init_values = Some(vec![0.0; n_cols]);
            return Ok((vec![Vec::new(); self.config.n_imputations], mask));
        }

        let (mut filled, init_values) = fill::initial_fill(
            x,
            &mask,
            &order,
            self.config.init_fill_method,
            &mut self.rng,
        );
        self.column_init_values = Some(init_values);

        let mut samples = Vec::with_capacity(self.config.n_imputations);
        for round in 0..total_rounds {
            if self.config.verbose {
                info!(
                    round = round + 1,
                    total = total_rounds,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "imputation round"
                );
            }
            self.perform_round(&mut filled, &mask, &order, round)?;
            if round >= self.config.n_burn_in {
                samples.push(cells.iter().map(|&(r, c)| filled[[r, c]]).collect());
            }
        }

        Ok((samples, mask))
    }

    /// Complete the matrix: run the schedule and average the samples.
    ///
    /// A matrix without missing values is returned as-is; otherwise the
    /// output equals the input at observed cells and the mean of the
    /// post-burn-in samples at missing cells.
    pub fn complete(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.config.verbose {
            info!(rows = x.nrows(), cols = x.ncols(), "completing matrix");
        }

        let (samples, mask) = self.multiple_imputations(x)?;
        let cells = fill::missing_cells(&mask);
        if cells.is_empty() {
            return Ok(x.clone());
        }
        aggregate::aggregate(x, &cells, &samples)
    }

    /// Hand the captured run state to a [`ModelStore`] for later
    /// out-of-sample row completion.
    ///
    /// Requires a completed run with `persist_models` enabled.
    pub fn store(&self) -> Result<ModelStore<M>> {
        let ensemble = self.ensemble.clone().ok_or_else(|| {
            MiceError::StateError(
                "no fitted models: run complete() with persist_models enabled".to_string(),
            )
        })?;
        let visit_order = self.visit_order.clone().ok_or_else(|| {
            MiceError::StateError("no saved visit order".to_string())
        })?;
        let column_init_values = self.column_init_values.clone().ok_or_else(|| {
            MiceError::StateError("no saved column init values".to_string())
        })?;
        Ok(ModelStore::new(
            self.config.clone(),
            ensemble,
            visit_order,
            column_init_values,
        ))
    }

    /// One round-robin pass over every column in visit order
    fn perform_round(
        &mut self,
        filled: &mut Array2<f64>,
        mask: &Array2<bool>,
        order: &[usize],
        round: usize,
    ) -> Result<()> {
        let (n_rows, n_cols) = filled.dim();

        let subset_cap = match self.config.n_nearest_columns {
            Some(cap) if n_cols > cap => Some(cap),
            _ => None,
        };
        let abs_corr = subset_cap.map(|_| neighbors::abs_correlation_matrix(filled));

        for &col in order {
            let missing_rows: Vec<usize> =
                (0..n_rows).filter(|&r| mask[[r, col]]).collect();
            if missing_rows.is_empty() {
                continue;
            }
            let observed_rows: Vec<usize> =
                (0..n_rows).filter(|&r| !mask[[r, col]]).collect();

            let predictors = match (subset_cap, abs_corr.as_ref()) {
                (Some(cap), Some(corr)) => {
                    neighbors::select_predictors(col, corr, cap, &mut self.rng)
                }
                _ => neighbors::all_other_columns(col, n_cols),
            };

            let x_observed = gather(filled, &observed_rows, &predictors);
            let y_observed = Array1::from_iter(
                observed_rows.iter().map(|&r| filled[[r, col]]),
            );
            let x_missing = gather(filled, &missing_rows, &predictors);

            let mut model = self.prototype.clone();
            model.fit(&x_observed, &y_observed)?;

            if let Some(ensemble) = self.ensemble.as_mut() {
                ensemble[round][col] = Some(FittedSlot {
                    model: model.clone(),
                    predictors: predictors.clone(),
                });
            }

            let values = match self.config.impute_type {
                ImputeMode::ColumnPosterior => sampler::posterior_draws(
                    &model,
                    &x_missing,
                    self.config.min_value,
                    self.config.max_value,
                    &mut self.rng,
                )?,
                ImputeMode::PredictiveMeanMatching => sampler::pmm_draws(
                    &model,
                    &x_missing,
                    &x_observed,
                    &y_observed,
                    self.config.n_pmm_neighbors,
                    self.config.min_value,
                    self.config.max_value,
                    &mut self.rng,
                )?,
            };

            for (&r, &v) in missing_rows.iter().zip(values.iter()) {
                filled[[r, col]] = v;
            }
        }
        Ok(())
    }
}

/// Gather a row/column submatrix of the working matrix
fn gather(x: &Array2<f64>, rows: &[usize], cols: &[usize]) -> Array2<f64> {
    let mut out = Array2::zeros((rows.len(), cols.len()));
    for (i, &r) in rows.iter().enumerate() {
        for (j, &c) in cols.iter().enumerate() {
            out[[i, j]] = x[[r, c]];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FillMethod, VisitSequence};
    use ndarray::arr2;

    fn small_config() -> MiceConfig {
        MiceConfig::new()
            .with_n_burn_in(2)
            .with_n_imputations(4)
            .with_seed(42)
    }

    fn matrix_with_two_holes() -> Array2<f64> {
        arr2(&[
            [1.0, 2.0, 3.0],
            [f64::NAN, 5.0, 6.0],
            [7.0, f64::NAN, 9.0],
            [10.0, 11.0, 12.0],
            [13.0, 14.0, 15.0],
        ])
    }

    #[test]
    fn test_complete_fills_all_missing() {
        let x = matrix_with_two_holes();
        let mut imputer = MiceImputer::new(small_config()).unwrap();
        let completed = imputer.complete(&x).unwrap();

        assert_eq!(completed.dim(), x.dim());
        assert!(!completed.iter().any(|v| v.is_nan()));
    }

    #[test]
    fn test_observed_cells_preserved() {
        let x = matrix_with_two_holes();
        let mut imputer = MiceImputer::new(small_config()).unwrap();
        let completed = imputer.complete(&x).unwrap();

        for ((i, j), &v) in x.indexed_iter() {
            if !v.is_nan() {
                assert_eq!(completed[[i, j]], v);
            }
        }
    }

    #[test]
    fn test_no_missing_returns_input() {
        let x = arr2(&[[1.0, 2.0], [3.0, 4.0]]);
        let mut imputer = MiceImputer::new(small_config()).unwrap();
        let completed = imputer.complete(&x).unwrap();
        assert_eq!(completed, x);
    }

    #[test]
    fn test_seeded_runs_are_identical() {
        let x = matrix_with_two_holes();
        let a = MiceImputer::new(small_config())
            .unwrap()
            .complete(&x)
            .unwrap();
        let b = MiceImputer::new(small_config())
            .unwrap()
            .complete(&x)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_multiple_imputations_sample_count() {
        let x = matrix_with_two_holes();
        let mut imputer = MiceImputer::new(small_config()).unwrap();
        let (samples, mask) = imputer.multiple_imputations(&x).unwrap();
        assert_eq!(samples.len(), 4);
        let n_missing = mask.iter().filter(|&&m| m).count();
        for sample in &samples {
            assert_eq!(sample.len(), n_missing);
        }
    }

    #[test]
    fn test_visit_order_recorded_as_permutation() {
        let x = matrix_with_two_holes();
        let config = small_config().with_visit_sequence(VisitSequence::RevMonotone);
        let mut imputer = MiceImputer::new(config).unwrap();
        imputer.complete(&x).unwrap();

        let mut order = imputer.visit_order().unwrap().to_vec();
        order.sort_unstable();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_init_values_follow_fill_method() {
        let x = matrix_with_two_holes();
        let config = small_config().with_init_fill_method(FillMethod::Mean);
        let mut imputer = MiceImputer::new(config).unwrap();
        imputer.complete(&x).unwrap();

        let init = imputer.column_init_values().unwrap();
        // column 0 observed: 1, 7, 10, 13
        assert!((init[0] - 31.0 / 4.0).abs() < 1e-12);
        // column 2 has no missing data
        assert_eq!(init[2], 0.0);
    }

    #[test]
    fn test_capped_predictors_still_complete() {
        let x = matrix_with_two_holes();
        let config = small_config().with_n_nearest_columns(1);
        let mut imputer = MiceImputer::new(config).unwrap();
        let completed = imputer.complete(&x).unwrap();
        assert!(!completed.iter().any(|v| v.is_nan()));
    }

    #[test]
    fn test_store_before_run_is_state_error() {
        let imputer = MiceImputer::new(small_config()).unwrap();
        assert!(matches!(imputer.store(), Err(MiceError::StateError(_))));
    }

    #[test]
    fn test_store_without_persist_flag_is_state_error() {
        let x = matrix_with_two_holes();
        let mut imputer = MiceImputer::new(small_config()).unwrap();
        imputer.complete(&x).unwrap();
        assert!(matches!(imputer.store(), Err(MiceError::StateError(_))));
    }

    #[test]
    fn test_all_missing_column_rejected_before_rounds() {
        let x = arr2(&[[1.0, f64::NAN], [2.0, f64::NAN]]);
        let mut imputer = MiceImputer::new(small_config()).unwrap();
        assert!(matches!(
            imputer.complete(&x),
            Err(MiceError::InputError(_))
        ));
    }
}
