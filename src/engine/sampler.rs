//! Per-column stochastic sampling
//!
//! Two algorithms fill the missing rows of a column once its model is
//! fitted. Posterior-predictive sampling draws each value from
//! Normal(mean, sqrt(variance)) of the model's predictive distribution.
//! Predictive mean matching instead copies a real observed value: each
//! missing row's stochastic prediction is matched against the deterministic
//! predictions of the observed rows, and one of the k nearest donors is
//! picked uniformly at random.

use crate::error::{MiceError, Result};
use crate::fill::clip;
use crate::model::ConditionalModel;
use ndarray::{Array1, Array2};
use rand::{Rng, RngCore};
use rand_distr::{Distribution, Normal};

/// Draw one value per missing row from the posterior predictive distribution
pub fn posterior_draws<M: ConditionalModel>(
    model: &M,
    x_missing: &Array2<f64>,
    min_value: Option<f64>,
    max_value: Option<f64>,
    rng: &mut dyn RngCore,
) -> Result<Vec<f64>> {
    let (means, variances) = model.predict_dist(x_missing)?;
    sample_normals(&means, &variances, min_value, max_value, rng)
}

/// Normal draws for precomputed means and variances, clipped to the range
pub fn sample_normals(
    means: &Array1<f64>,
    variances: &Array1<f64>,
    min_value: Option<f64>,
    max_value: Option<f64>,
    rng: &mut dyn RngCore,
) -> Result<Vec<f64>> {
    means
        .iter()
        .zip(variances.iter())
        .map(|(&mu, &var)| {
            let sigma = var.max(0.0).sqrt();
            let dist = Normal::new(mu, sigma)
                .map_err(|e| MiceError::TrainingError(e.to_string()))?;
            Ok(clip(dist.sample(rng), min_value, max_value))
        })
        .collect()
}

/// Predictive mean matching: impute each missing row with the actual
/// observed value of one of its k nearest donors in prediction space.
pub fn pmm_draws<M: ConditionalModel>(
    model: &M,
    x_missing: &Array2<f64>,
    x_observed: &Array2<f64>,
    y_observed: &Array1<f64>,
    n_neighbors: usize,
    min_value: Option<f64>,
    max_value: Option<f64>,
    rng: &mut dyn RngCore,
) -> Result<Vec<f64>> {
    let preds_missing = model.predict(x_missing, true, rng)?;
    let preds_observed = model.predict(x_observed, false, rng)?;

    let n_obs = preds_observed.len();
    if n_obs == 0 {
        return Err(MiceError::StateError(
            "predictive mean matching requires observed rows".to_string(),
        ));
    }
    let k = n_neighbors.min(n_obs.saturating_sub(1)).max(1);

    let mut values = Vec::with_capacity(preds_missing.len());
    let mut distances: Vec<(f64, usize)> = Vec::with_capacity(n_obs);
    for &pred in preds_missing.iter() {
        distances.clear();
        distances.extend(
            preds_observed
                .iter()
                .enumerate()
                .map(|(i, &obs)| ((pred - obs).abs(), i)),
        );
        // partial sort: only the k smallest distances matter
        distances.select_nth_unstable_by(k - 1, |a, b| {
            a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal)
        });
        let donor = distances[rng.gen_range(0..k)].1;
        values.push(clip(y_observed[donor], min_value, max_value));
    }
    Ok(values)
}
