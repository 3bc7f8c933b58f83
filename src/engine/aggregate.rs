//! Multi-imputation averaging
//!
//! Purely deterministic: the completed matrix equals the original input at
//! every observed cell, and the arithmetic mean of the per-round samples at
//! every missing cell.

use crate::error::{MiceError, Result};
use ndarray::Array2;

/// Average the collected post-burn-in samples into the completed matrix.
///
/// `cells` holds the missing-cell coordinates in the same row-major order
/// the engine used when snapshotting; each entry of `samples` is one
/// round's values for those cells.
pub fn aggregate(
    original: &Array2<f64>,
    cells: &[(usize, usize)],
    samples: &[Vec<f64>],
) -> Result<Array2<f64>> {
    if samples.is_empty() {
        return Err(MiceError::StateError(
            "no imputation samples collected".to_string(),
        ));
    }
    for sample in samples {
        if sample.len() != cells.len() {
            return Err(MiceError::DimensionError {
                expected: format!("{} sampled cells", cells.len()),
                actual: format!("{}", sample.len()),
            });
        }
    }

    let mut completed = original.clone();
    let n = samples.len() as f64;
    for (i, &(row, col)) in cells.iter().enumerate() {
        let mean = samples.iter().map(|s| s[i]).sum::<f64>() / n;
        completed[[row, col]] = mean;
    }
    Ok(completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_aggregate_means_missing_cells() {
        let original = arr2(&[[1.0, f64::NAN], [f64::NAN, 4.0]]);
        let cells = vec![(0, 1), (1, 0)];
        let samples = vec![vec![2.0, 10.0], vec![4.0, 20.0]];

        let completed = aggregate(&original, &cells, &samples).unwrap();
        assert_eq!(completed[[0, 1]], 3.0);
        assert_eq!(completed[[1, 0]], 15.0);
        // observed cells untouched
        assert_eq!(completed[[0, 0]], 1.0);
        assert_eq!(completed[[1, 1]], 4.0);
    }

    #[test]
    fn test_aggregate_rejects_ragged_samples() {
        let original = arr2(&[[1.0, f64::NAN]]);
        let cells = vec![(0, 1)];
        let samples = vec![vec![2.0], vec![]];
        assert!(matches!(
            aggregate(&original, &cells, &samples),
            Err(MiceError::DimensionError { .. })
        ));
    }

    #[test]
    fn test_aggregate_rejects_empty_sample_set() {
        let original = arr2(&[[1.0, 2.0]]);
        assert!(matches!(
            aggregate(&original, &[], &[]),
            Err(MiceError::StateError(_))
        ));
    }
}
