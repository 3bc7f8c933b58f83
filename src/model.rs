//! Conditional regression model contract and the default Bayesian ridge
//!
//! The round loop only ever talks to a model through [`ConditionalModel`]:
//! fit on observed rows, point-predict (optionally with a random coefficient
//! draw), or return a per-row predictive mean and variance. Any regressor
//! implementing the trait can drive the engine; [`BayesianRidge`] is the
//! default.

use crate::error::{MiceError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::RngCore;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Contract between the imputation engine and a per-column regressor
pub trait ConditionalModel {
    /// Fit on the observed rows of the target column
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Point predictions. With `random_draw` the coefficients are sampled
    /// from their posterior instead of using the point estimate.
    fn predict(
        &self,
        x: &Array2<f64>,
        random_draw: bool,
        rng: &mut dyn RngCore,
    ) -> Result<Array1<f64>>;

    /// Per-row predictive mean and variance
    fn predict_dist(&self, x: &Array2<f64>) -> Result<(Array1<f64>, Array1<f64>)>;
}

/// Bayesian ridge regression with a posterior over the coefficients.
///
/// The regularization strength is `lambda_reg` scaled by the Frobenius norm
/// of XᵀX, so it is invariant to the scale of the predictors. An intercept
/// column of ones is appended internally when `add_ones` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BayesianRidge {
    /// Base regularization strength, scaled by ‖XᵀX‖ at fit time
    pub lambda_reg: f64,
    /// Append an intercept column of ones
    pub add_ones: bool,
    beta: Option<Array1<f64>>,
    covariance: Option<Array2<f64>>,
    sigma_squared: f64,
}

impl Default for BayesianRidge {
    fn default() -> Self {
        Self::new(0.001)
    }
}

impl BayesianRidge {
    /// Create a model with the given base regularization strength
    pub fn new(lambda_reg: f64) -> Self {
        Self {
            lambda_reg: lambda_reg.max(0.0),
            add_ones: true,
            beta: None,
            covariance: None,
            sigma_squared: 0.0,
        }
    }

    /// Disable the internal intercept column
    pub fn without_intercept(mut self) -> Self {
        self.add_ones = false;
        self
    }

    fn design_matrix(&self, x: &Array2<f64>) -> Array2<f64> {
        if !self.add_ones {
            return x.clone();
        }
        let (n, p) = x.dim();
        let mut design = Array2::ones((n, p + 1));
        design.slice_mut(ndarray::s![.., ..p]).assign(x);
        design
    }

    fn fitted_beta(&self) -> Result<&Array1<f64>> {
        self.beta
            .as_ref()
            .ok_or_else(|| MiceError::TrainingError("model not fitted".to_string()))
    }

    fn check_width(&self, design: &Array2<f64>, beta: &Array1<f64>) -> Result<()> {
        if design.ncols() != beta.len() {
            return Err(MiceError::DimensionError {
                expected: format!("{} predictor columns", beta.len()),
                actual: format!("{}", design.ncols()),
            });
        }
        Ok(())
    }
}

impl ConditionalModel for BayesianRidge {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n = x.nrows();
        if n == 0 {
            return Err(MiceError::TrainingError("empty training set".to_string()));
        }
        if n != y.len() {
            return Err(MiceError::DimensionError {
                expected: format!("{} targets", n),
                actual: format!("{}", y.len()),
            });
        }

        let design = self.design_matrix(x);
        let p = design.ncols();

        let xtx = design.t().dot(&design);
        let xty = design.t().dot(y);

        let xtx_norm = xtx.iter().map(|v| v * v).sum::<f64>().sqrt();
        let lambda = if xtx_norm > 0.0 {
            self.lambda_reg * xtx_norm
        } else {
            self.lambda_reg
        };

        let mut regularized = xtx;
        for i in 0..p {
            regularized[[i, i]] += lambda;
        }

        let beta = cholesky_solve(&regularized, &xty)
            .or_else(|| matrix_inverse(&regularized).map(|inv| inv.dot(&xty)))
            .ok_or_else(|| {
                MiceError::TrainingError("singular design matrix".to_string())
            })?;

        let residuals = &design.dot(&beta) - y;
        let dof = n.saturating_sub(p).max(1) as f64;
        let sigma_squared = residuals.iter().map(|r| r * r).sum::<f64>() / dof;

        let inverse = matrix_inverse(&regularized).ok_or_else(|| {
            MiceError::TrainingError("singular design matrix".to_string())
        })?;
        let covariance = inverse.mapv(|v| v * sigma_squared);

        self.beta = Some(beta);
        self.covariance = Some(covariance);
        self.sigma_squared = sigma_squared;
        Ok(())
    }

    fn predict(
        &self,
        x: &Array2<f64>,
        random_draw: bool,
        rng: &mut dyn RngCore,
    ) -> Result<Array1<f64>> {
        let beta = self.fitted_beta()?;
        let design = self.design_matrix(x);
        self.check_width(&design, beta)?;

        if !random_draw {
            return Ok(design.dot(beta));
        }

        let covariance = self
            .covariance
            .as_ref()
            .ok_or_else(|| MiceError::TrainingError("model not fitted".to_string()))?;
        let p = beta.len();
        let standard = Normal::new(0.0, 1.0)
            .map_err(|e| MiceError::TrainingError(e.to_string()))?;
        let z = Array1::from_iter((0..p).map(|_| standard.sample(rng)));

        let draw = match cholesky_factor(covariance) {
            Some(l) => beta + &l.dot(&z),
            // Near-singular posterior: per-coefficient draws from the diagonal
            None => {
                let diag = covariance.diag();
                beta + &Array1::from_iter(
                    z.iter()
                        .zip(diag.iter())
                        .map(|(&zi, &var)| zi * var.max(0.0).sqrt()),
                )
            }
        };

        Ok(design.dot(&draw))
    }

    fn predict_dist(&self, x: &Array2<f64>) -> Result<(Array1<f64>, Array1<f64>)> {
        let beta = self.fitted_beta()?;
        let covariance = self
            .covariance
            .as_ref()
            .ok_or_else(|| MiceError::TrainingError("model not fitted".to_string()))?;
        let design = self.design_matrix(x);
        self.check_width(&design, beta)?;

        let means = design.dot(beta);
        let projected = design.dot(covariance);
        let variances = Array1::from_iter(
            projected
                .axis_iter(Axis(0))
                .zip(design.axis_iter(Axis(0)))
                .map(|(pr, dr)| pr.dot(&dr).max(0.0) + self.sigma_squared),
        );

        Ok((means, variances))
    }
}

/// Solve the symmetric positive-definite system `A x = b` via Cholesky.
/// Returns `None` when the matrix is not positive definite.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let l = cholesky_factor(a)?;
    let n = l.nrows();

    // Forward substitution: L * y = b
    let mut y = Array1::zeros(n);
    for i in 0..n {
        let sum: f64 = (0..i).map(|j| l[[i, j]] * y[j]).sum();
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Backward substitution: L^T * x = y
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let sum: f64 = (i + 1..n).map(|j| l[[j, i]] * x[j]).sum();
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Some(x)
}

/// Lower-triangular Cholesky factor of a symmetric matrix. Retries once with
/// a small diagonal jitter before giving up.
fn cholesky_factor(a: &Array2<f64>) -> Option<Array2<f64>> {
    cholesky_factor_inner(a).or_else(|| {
        let n = a.nrows();
        let jitter = 1e-10 * a.diag().iter().map(|v| v.abs()).sum::<f64>() / n.max(1) as f64;
        let mut jittered = a.clone();
        for i in 0..n {
            jittered[[i, i]] += jitter;
        }
        cholesky_factor_inner(&jittered)
    })
}

fn cholesky_factor_inner(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    if n != a.ncols() {
        return None;
    }
    let mut l = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum();
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }
    Some(l)
}

/// Matrix inversion via Gauss-Jordan elimination with partial pivoting
fn matrix_inverse(m: &Array2<f64>) -> Option<Array2<f64>> {
    let n = m.nrows();
    if n != m.ncols() {
        return None;
    }

    // Augmented matrix [M | I]
    let mut aug = Array2::zeros((n, 2 * n));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = m[[i, j]];
        }
        aug[[i, n + i]] = 1.0;
    }

    for col in 0..n {
        let mut max_row = col;
        for row in col + 1..n {
            if aug[[row, col]].abs() > aug[[max_row, col]].abs() {
                max_row = row;
            }
        }
        if max_row != col {
            for j in 0..2 * n {
                let tmp = aug[[col, j]];
                aug[[col, j]] = aug[[max_row, j]];
                aug[[max_row, j]] = tmp;
            }
        }
        if aug[[col, col]].abs() < 1e-12 {
            return None;
        }
        let pivot = aug[[col, col]];
        for j in 0..2 * n {
            aug[[col, j]] /= pivot;
        }
        for row in 0..n {
            if row != col {
                let factor = aug[[row, col]];
                for j in 0..2 * n {
                    aug[[row, j]] -= factor * aug[[col, j]];
                }
            }
        }
    }

    let mut inv = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..n {
            inv[[i, j]] = aug[[i, n + j]];
        }
    }
    Some(inv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn linear_data() -> (Array2<f64>, Array1<f64>) {
        // y = 2x + 1 with a little structure in a second predictor
        let x = Array2::from_shape_vec(
            (6, 2),
            vec![
                0.0, 1.0, 1.0, 0.5, 2.0, 1.5, 3.0, 0.0, 4.0, 2.0, 5.0, 1.0,
            ],
        )
        .unwrap();
        let y = Array1::from_vec(vec![1.0, 3.0, 5.0, 7.0, 9.0, 11.0]);
        (x, y)
    }

    #[test]
    fn test_fit_and_point_predict() {
        let (x, y) = linear_data();
        let mut model = BayesianRidge::new(0.001);
        model.fit(&x, &y).unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let preds = model.predict(&x, false, &mut rng).unwrap();
        for (p, t) in preds.iter().zip(y.iter()) {
            assert!((p - t).abs() < 0.5, "prediction {} far from {}", p, t);
        }
    }

    #[test]
    fn test_predict_unfitted_fails() {
        let model = BayesianRidge::default();
        let x = Array2::zeros((2, 2));
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(matches!(
            model.predict(&x, false, &mut rng),
            Err(MiceError::TrainingError(_))
        ));
    }

    #[test]
    fn test_predict_dist_shapes_and_positive_variance() {
        let (x, y) = linear_data();
        let mut model = BayesianRidge::new(0.001);
        model.fit(&x, &y).unwrap();

        let (means, variances) = model.predict_dist(&x).unwrap();
        assert_eq!(means.len(), x.nrows());
        assert_eq!(variances.len(), x.nrows());
        for &v in variances.iter() {
            assert!(v >= 0.0);
        }
    }

    #[test]
    fn test_random_draw_varies_with_stream() {
        let (x, y) = linear_data();
        let mut model = BayesianRidge::new(0.001);
        model.fit(&x, &y).unwrap();

        let mut rng_a = ChaCha8Rng::seed_from_u64(1);
        let mut rng_b = ChaCha8Rng::seed_from_u64(1);
        let a = model.predict(&x, true, &mut rng_a).unwrap();
        let b = model.predict(&x, true, &mut rng_b).unwrap();
        // identical streams give identical draws
        for (va, vb) in a.iter().zip(b.iter()) {
            assert_eq!(va, vb);
        }

        let mut rng_c = ChaCha8Rng::seed_from_u64(2);
        let c = model.predict(&x, true, &mut rng_c).unwrap();
        assert!(a.iter().zip(c.iter()).any(|(va, vc)| va != vc));
    }

    #[test]
    fn test_width_mismatch_is_dimension_error() {
        let (x, y) = linear_data();
        let mut model = BayesianRidge::new(0.001);
        model.fit(&x, &y).unwrap();

        let narrow = Array2::zeros((2, 1));
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(matches!(
            model.predict(&narrow, false, &mut rng),
            Err(MiceError::DimensionError { .. })
        ));
    }

    #[test]
    fn test_cholesky_solve_matches_direct() {
        let a = Array2::from_shape_vec(
            (3, 3),
            vec![4.0, 2.0, 1.0, 2.0, 5.0, 3.0, 1.0, 3.0, 6.0],
        )
        .unwrap();
        let b = Array1::from_vec(vec![1.0, 2.0, 3.0]);
        let x = cholesky_solve(&a, &b).unwrap();
        let back = a.dot(&x);
        for i in 0..3 {
            assert!((back[i] - b[i]).abs() < 1e-10);
        }
    }

    #[test]
    fn test_matrix_inverse_roundtrip() {
        let m = Array2::from_shape_vec((2, 2), vec![2.0, 1.0, 1.0, 3.0]).unwrap();
        let inv = matrix_inverse(&m).unwrap();
        let eye = m.dot(&inv);
        assert!((eye[[0, 0]] - 1.0).abs() < 1e-12);
        assert!((eye[[1, 1]] - 1.0).abs() < 1e-12);
        assert!(eye[[0, 1]].abs() < 1e-12);
    }

    #[test]
    fn test_model_serde_roundtrip() {
        let (x, y) = linear_data();
        let mut model = BayesianRidge::new(0.01);
        model.fit(&x, &y).unwrap();

        let bytes = bincode::serialize(&model).unwrap();
        let restored: BayesianRidge = bincode::deserialize(&bytes).unwrap();
        let (m1, _) = model.predict_dist(&x).unwrap();
        let (m2, _) = restored.predict_dist(&x).unwrap();
        for (a, b) in m1.iter().zip(m2.iter()) {
            assert_eq!(a, b);
        }
    }
}
