//! Masked evaluation metrics
//!
//! Errors restricted to a cell mask, typically the missingness mask of a
//! completed matrix held out against ground truth.

use ndarray::Array2;

/// Mean absolute error over the masked cells
pub fn masked_mae(x_true: &Array2<f64>, x_pred: &Array2<f64>, mask: &Array2<bool>) -> f64 {
    masked_error(x_true, x_pred, mask, |d| d.abs())
}

/// Mean squared error over the masked cells
pub fn masked_mse(x_true: &Array2<f64>, x_pred: &Array2<f64>, mask: &Array2<bool>) -> f64 {
    masked_error(x_true, x_pred, mask, |d| d * d)
}

fn masked_error(
    x_true: &Array2<f64>,
    x_pred: &Array2<f64>,
    mask: &Array2<bool>,
    f: impl Fn(f64) -> f64,
) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for ((&m, &t), &p) in mask.iter().zip(x_true.iter()).zip(x_pred.iter()) {
        if m {
            sum += f(t - p);
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
