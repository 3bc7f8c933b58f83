//! Missingness predicates, input validation, initial fill, and clipping
//!
//! The round loop consumes this module through a narrow contract: check the
//! matrix up front, seed missing cells from per-column observed statistics,
//! clamp sampled values to the configured range.

use crate::config::FillMethod;
use crate::error::{MiceError, Result};
use ndarray::{Array2, ShapeBuilder};
use rand::Rng;

/// Check if a value is missing (NaN)
#[inline]
pub fn is_missing(v: f64) -> bool {
    v.is_nan()
}

/// Boolean mask of missing cells, same shape as the input
pub fn missing_mask(x: &Array2<f64>) -> Array2<bool> {
    x.mapv(is_missing)
}

/// Missing cell coordinates in row-major scan order.
///
/// Both the per-round snapshot and the final aggregation enumerate cells
/// through this function, so the two can never disagree on ordering.
pub fn missing_cells(mask: &Array2<bool>) -> Vec<(usize, usize)> {
    let mut cells = Vec::new();
    for row in 0..mask.nrows() {
        for col in 0..mask.ncols() {
            if mask[[row, col]] {
                cells.push((row, col));
            }
        }
    }
    cells
}

/// Reject input the round loop cannot work with.
///
/// Runs before any round executes: an empty matrix, a row with no observed
/// values, or a column with no observed values all abort the call.
pub fn validate_matrix(x: &Array2<f64>) -> Result<()> {
    let (n_rows, n_cols) = x.dim();
    if n_rows == 0 || n_cols == 0 {
        return Err(MiceError::InputError(format!(
            "input matrix is empty ({} x {})",
            n_rows, n_cols
        )));
    }

    for (i, row) in x.rows().into_iter().enumerate() {
        if row.iter().all(|&v| is_missing(v)) {
            return Err(MiceError::InputError(format!(
                "row {} has no observed values",
                i
            )));
        }
    }

    for (j, col) in x.columns().into_iter().enumerate() {
        if col.iter().all(|&v| is_missing(v)) {
            return Err(MiceError::InputError(format!(
                "column {} has no observed values",
                j
            )));
        }
    }

    Ok(())
}

/// Clamp a sampled value to the configured range. Unset bounds pass through.
#[inline]
pub fn clip(value: f64, min_value: Option<f64>, max_value: Option<f64>) -> f64 {
    let mut v = value;
    if let Some(min) = min_value {
        v = v.max(min);
    }
    if let Some(max) = max_value {
        v = v.min(max);
    }
    v
}

/// Mean of the observed entries of a column
pub fn observed_mean(observed: &[f64]) -> f64 {
    if observed.is_empty() {
        return 0.0;
    }
    observed.iter().sum::<f64>() / observed.len() as f64
}

/// Median of the observed entries of a column (middle pair averaged)
pub fn observed_median(observed: &[f64]) -> f64 {
    if observed.is_empty() {
        return 0.0;
    }
    let mut sorted = observed.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Seed missing cells from per-column observed statistics.
///
/// Returns the filled working matrix in column-major layout (the round loop
/// reads and writes one column at a time) together with the per-column init
/// values that row completion reuses later. For `Random` fill every missing
/// cell gets its own draw from the observed values; the recorded init value
/// is the observed mean, since re-seeding a single row needs one scalar.
pub fn initial_fill<R: Rng + ?Sized>(
    x: &Array2<f64>,
    mask: &Array2<bool>,
    visit_order: &[usize],
    method: FillMethod,
    rng: &mut R,
) -> (Array2<f64>, Vec<f64>) {
    let (n_rows, n_cols) = x.dim();
    let mut filled = Array2::zeros((n_rows, n_cols).f());
    filled.assign(x);

    let mut init_values = vec![0.0; n_cols];

    for &col in visit_order {
        let missing_rows: Vec<usize> = (0..n_rows).filter(|&r| mask[[r, col]]).collect();
        if missing_rows.is_empty() {
            continue;
        }
        let observed: Vec<f64> = (0..n_rows)
            .filter(|&r| !mask[[r, col]])
            .map(|r| x[[r, col]])
            .collect();

        match method {
            FillMethod::Mean => {
                let value = observed_mean(&observed);
                init_values[col] = value;
                for &r in &missing_rows {
                    filled[[r, col]] = value;
                }
            }
            FillMethod::Median => {
                let value = observed_median(&observed);
                init_values[col] = value;
                for &r in &missing_rows {
                    filled[[r, col]] = value;
                }
            }
            FillMethod::Random => {
                init_values[col] = observed_mean(&observed);
                for &r in &missing_rows {
                    filled[[r, col]] = observed[rng.gen_range(0..observed.len())];
                }
            }
        }
    }

    (filled, init_values)
}
