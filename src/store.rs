//! Persisted run state and out-of-sample row completion
//!
//! A [`ModelStore`] captures everything a finished run needs to complete a
//! single new record later without refitting: the per-round per-column
//! fitted models, the visit order, the per-column init values, and the
//! originating configuration. Stores round-trip through bincode (binary)
//! or JSON.

use crate::config::{ImputeMode, MiceConfig};
use crate::engine::{sampler, ModelEnsemble};
use crate::error::{MiceError, Result};
use crate::fill::is_missing;
use crate::model::ConditionalModel;
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::warn;

/// Captured state of a completed run with `persist_models` enabled
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStore<M> {
    config: MiceConfig,
    ensemble: ModelEnsemble<M>,
    visit_order: Vec<usize>,
    column_init_values: Vec<f64>,
    created_at: DateTime<Utc>,
}

impl<M> ModelStore<M> {
    pub(crate) fn new(
        config: MiceConfig,
        ensemble: ModelEnsemble<M>,
        visit_order: Vec<usize>,
        column_init_values: Vec<f64>,
    ) -> Self {
        Self {
            config,
            ensemble,
            visit_order,
            column_init_values,
            created_at: Utc::now(),
        }
    }

    /// Configuration of the originating run
    pub fn config(&self) -> &MiceConfig {
        &self.config
    }

    /// Column visit order of the originating run
    pub fn visit_order(&self) -> &[usize] {
        &self.visit_order
    }

    /// Per-column initial fill values of the originating run
    pub fn column_init_values(&self) -> &[f64] {
        &self.column_init_values
    }

    /// When the store was captured
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Number of columns the store was trained on
    pub fn n_cols(&self) -> usize {
        self.column_init_values.len()
    }

    fn check_replayable(&self) -> Result<()> {
        if self.ensemble.is_empty() {
            return Err(MiceError::StateError(
                "store holds no fitted models".to_string(),
            ));
        }
        let expected_rounds = self.config.n_burn_in + self.config.n_imputations;
        if self.ensemble.len() != expected_rounds {
            return Err(MiceError::StateError(format!(
                "store holds {} rounds, configuration expects {}",
                self.ensemble.len(),
                expected_rounds
            )));
        }
        Ok(())
    }
}

impl<M: Serialize> ModelStore<M> {
    /// Write the store as a bincode blob
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path)?;
        bincode::serialize_into(BufWriter::new(file), self)
            .map_err(|e| MiceError::SerializationError(e.to_string()))
    }

    /// Write the store as human-readable JSON
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .map_err(|e| MiceError::SerializationError(e.to_string()))
    }
}

impl<M: DeserializeOwned> ModelStore<M> {
    /// Read a store from a bincode blob
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        bincode::deserialize_from(BufReader::new(file))
            .map_err(|e| MiceError::SerializationError(e.to_string()))
    }

    /// Read a store from JSON
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| MiceError::SerializationError(e.to_string()))
    }
}

impl<M: ConditionalModel> ModelStore<M> {
    /// Borrow a row completer over this store
    pub fn row_completer(&self) -> RowCompleter<'_, M> {
        RowCompleter { store: self }
    }

    /// Complete a single row; see [`RowCompleter::complete`]
    pub fn complete_row(&self, row: &Array1<f64>, seed: Option<u64>) -> Result<Array1<f64>> {
        self.row_completer().complete(row, seed)
    }
}

/// Replays a store's fitted models over one new record.
///
/// The replay mirrors the training schedule: missing entries are seeded
/// from the stored init values, then every (round, column) slot's model
/// draws from its predictive distribution, and the post-burn-in draws are
/// averaged per entry. No model is refitted.
pub struct RowCompleter<'a, M> {
    store: &'a ModelStore<M>,
}

impl<M: ConditionalModel> RowCompleter<'_, M> {
    /// Complete one record out-of-sample.
    ///
    /// `seed` reseeds the random stream for a reproducible replay; without
    /// it (and without a configured run seed) results vary call to call.
    pub fn complete(&self, row: &Array1<f64>, seed: Option<u64>) -> Result<Array1<f64>> {
        let store = self.store;
        let n_cols = store.n_cols();

        if row.len() != n_cols {
            return Err(MiceError::DimensionError {
                expected: format!("{} columns", n_cols),
                actual: format!("{}", row.len()),
            });
        }
        if store.config.impute_type != ImputeMode::ColumnPosterior {
            return Err(MiceError::ConfigError(
                "row completion requires impute_type col: a lone row has no \
                 observed population for predictive mean matching"
                    .to_string(),
            ));
        }
        store.check_replayable()?;

        let missing: Vec<bool> = row.iter().map(|&v| is_missing(v)).collect();
        let missing_cols: Vec<usize> = (0..n_cols).filter(|&c| missing[c]).collect();
        if missing_cols.is_empty() {
            return Ok(row.clone());
        }

        let mut filled = row.clone();
        for &col in &store.visit_order {
            if missing[col] {
                filled[col] = store.column_init_values[col];
            }
        }

        let mut rng = match seed.or(store.config.seed) {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None => {
                warn!("random seed not set, row completion will not be reproducible");
                ChaCha8Rng::from_entropy()
            }
        };

        let n_burn_in = store.config.n_burn_in;
        let mut draws: Vec<Vec<f64>> = Vec::with_capacity(store.config.n_imputations);

        for (round, slots) in store.ensemble.iter().enumerate() {
            for &col in &store.visit_order {
                if !missing[col] {
                    continue;
                }
                let slot = slots[col].as_ref().ok_or_else(|| {
                    MiceError::StateError(format!(
                        "no fitted model for round {}, column {}",
                        round, col
                    ))
                })?;

                let mut x_other = Array2::zeros((1, slot.predictors.len()));
                for (j, &c) in slot.predictors.iter().enumerate() {
                    x_other[[0, j]] = filled[c];
                }

                let (means, variances) = slot.model.predict_dist(&x_other)?;
                let sampled = sampler::sample_normals(
                    &means,
                    &variances,
                    store.config.min_value,
                    store.config.max_value,
                    &mut rng,
                )?;
                filled[col] = sampled[0];
            }
            if round >= n_burn_in {
                draws.push(missing_cols.iter().map(|&c| filled[c]).collect());
            }
        }

        let mut completed = row.clone();
        let n = draws.len() as f64;
        for (i, &col) in missing_cols.iter().enumerate() {
            completed[col] = draws.iter().map(|d| d[i]).sum::<f64>() / n;
        }
        Ok(completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MiceImputer;
    use ndarray::{arr1, arr2};

    fn trained_store(impute_type: ImputeMode) -> ModelStore<crate::model::BayesianRidge> {
        let x = arr2(&[
            [1.0, 2.0, 3.0],
            [2.0, f64::NAN, 6.0],
            [3.0, 6.0, f64::NAN],
            [4.0, 8.0, 12.0],
            [5.0, 10.0, 15.0],
        ]);
        let config = MiceConfig::new()
            .with_n_burn_in(1)
            .with_n_imputations(3)
            .with_impute_type(impute_type)
            .with_persist_models(true)
            .with_seed(7);
        let mut imputer = MiceImputer::new(config).unwrap();
        imputer.complete(&x).unwrap();
        imputer.store().unwrap()
    }

    #[test]
    fn test_complete_row_fills_missing_entry() {
        let store = trained_store(ImputeMode::ColumnPosterior);
        let row = arr1(&[2.5, f64::NAN, 7.5]);
        let completed = store.complete_row(&row, Some(42)).unwrap();

        assert_eq!(completed.len(), 3);
        assert!(!completed[1].is_nan());
        assert_eq!(completed[0], 2.5);
        assert_eq!(completed[2], 7.5);
    }

    #[test]
    fn test_complete_row_without_missing_returns_unchanged() {
        let store = trained_store(ImputeMode::ColumnPosterior);
        let row = arr1(&[1.0, 2.0, 3.0]);
        let completed = store.complete_row(&row, None).unwrap();
        assert_eq!(completed, row);
    }

    #[test]
    fn test_complete_row_is_reproducible_with_seed() {
        let store = trained_store(ImputeMode::ColumnPosterior);
        let row = arr1(&[2.5, f64::NAN, f64::NAN]);
        let a = store.complete_row(&row, Some(99)).unwrap();
        let b = store.complete_row(&row, Some(99)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_complete_row_wrong_length_is_dimension_error() {
        let store = trained_store(ImputeMode::ColumnPosterior);
        let row = arr1(&[1.0, f64::NAN]);
        assert!(matches!(
            store.complete_row(&row, None),
            Err(MiceError::DimensionError { .. })
        ));
    }

    #[test]
    fn test_complete_row_rejects_pmm_store() {
        let store = trained_store(ImputeMode::PredictiveMeanMatching);
        let row = arr1(&[1.0, f64::NAN, 3.0]);
        assert!(matches!(
            store.complete_row(&row, None),
            Err(MiceError::ConfigError(_))
        ));
    }

    #[test]
    fn test_complete_row_unfitted_column_is_state_error() {
        // column 0 had no missing data during training, so its slots are empty
        let store = trained_store(ImputeMode::ColumnPosterior);
        let row = arr1(&[f64::NAN, 4.0, 6.0]);
        assert!(matches!(
            store.complete_row(&row, Some(1)),
            Err(MiceError::StateError(_))
        ));
    }
}
