//! Predictor column selection
//!
//! When the table is narrower than the configured cap every other column is
//! a predictor. On wide tables a fixed-size subset is drawn per target
//! column, weighted by absolute Pearson correlation against the current
//! working matrix, so each regression stays low-dimensional while every
//! column keeps a nonzero chance of being chosen.

use ndarray::Array2;
use rand::Rng;
use rayon::prelude::*;

/// Additive weight floor; keeps every candidate column selectable
const WEIGHT_FLOOR: f64 = 1e-7;

/// Columns above which the correlation matrix is built in parallel
const PARALLEL_THRESHOLD: usize = 64;

/// Absolute Pearson correlation between all column pairs of the working
/// matrix. Constant columns correlate as 0 with everything.
///
/// Recomputed once per round, not per column: within a round the matrix
/// mixes already-updated and not-yet-updated columns, and the sampling
/// statistics depend on that exact staleness.
pub fn abs_correlation_matrix(x: &Array2<f64>) -> Array2<f64> {
    let (n_rows, n_cols) = x.dim();
    let n = n_rows as f64;

    let means: Vec<f64> = (0..n_cols)
        .map(|j| x.column(j).iter().sum::<f64>() / n)
        .collect();
    let stds: Vec<f64> = (0..n_cols)
        .map(|j| {
            let m = means[j];
            (x.column(j).iter().map(|&v| (v - m) * (v - m)).sum::<f64>() / n).sqrt()
        })
        .collect();

    let pair = |i: usize, j: usize| -> f64 {
        if stds[i] <= f64::EPSILON || stds[j] <= f64::EPSILON {
            return 0.0;
        }
        let cov = x
            .column(i)
            .iter()
            .zip(x.column(j).iter())
            .map(|(&a, &b)| (a - means[i]) * (b - means[j]))
            .sum::<f64>()
            / n;
        (cov / (stds[i] * stds[j])).abs()
    };

    let mut corr = Array2::zeros((n_cols, n_cols));
    if n_cols > PARALLEL_THRESHOLD {
        let rows: Vec<Vec<(usize, f64)>> = (0..n_cols)
            .into_par_iter()
            .map(|i| (i..n_cols).map(|j| (j, pair(i, j))).collect())
            .collect();
        for (i, row_vals) in rows.into_iter().enumerate() {
            for (j, val) in row_vals {
                corr[[i, j]] = val;
                corr[[j, i]] = val;
            }
        }
    } else {
        for i in 0..n_cols {
            for j in i..n_cols {
                let val = pair(i, j);
                corr[[i, j]] = val;
                corr[[j, i]] = val;
            }
        }
    }
    for i in 0..n_cols {
        corr[[i, i]] = 1.0;
    }
    corr
}

/// All columns except the target, in ascending index order
pub fn all_other_columns(target: usize, n_cols: usize) -> Vec<usize> {
    (0..n_cols).filter(|&c| c != target).collect()
}

/// Draw `n_select` predictor columns for `target` without replacement,
/// with probability proportional to `|corr| + floor` and the target's own
/// weight forced to zero.
pub fn select_predictors<R: Rng + ?Sized>(
    target: usize,
    abs_corr: &Array2<f64>,
    n_select: usize,
    rng: &mut R,
) -> Vec<usize> {
    let n_cols = abs_corr.ncols();
    let mut weights: Vec<f64> = (0..n_cols)
        .map(|j| abs_corr[[target, j]] + WEIGHT_FLOOR)
        .collect();
    weights[target] = 0.0;

    let mut chosen = Vec::with_capacity(n_select);
    for _ in 0..n_select.min(n_cols - 1) {
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            break;
        }
        let mut u = rng.gen::<f64>() * total;
        let mut picked = None;
        for (j, &w) in weights.iter().enumerate() {
            if w <= 0.0 {
                continue;
            }
            // remember the last candidate in case rounding pushes u past the sum
            picked = Some(j);
            if u < w {
                break;
            }
            u -= w;
        }
        let Some(picked) = picked else { break };
        chosen.push(picked);
        weights[picked] = 0.0;
    }
    chosen
}
