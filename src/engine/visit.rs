//! Column visit scheduling
//!
//! The order is computed once per run from the missingness mask and reused
//! every round.

use crate::config::VisitSequence;
use ndarray::Array2;

/// Per-column missing counts
pub(crate) fn missing_counts(mask: &Array2<bool>) -> Vec<usize> {
    (0..mask.ncols())
        .map(|col| mask.column(col).iter().filter(|&&m| m).count())
        .collect()
}

/// Compute the fixed column visit order for a run.
///
/// Monotone sorts by descending missing count, revmonotone by ascending;
/// both break ties by ascending column index (stable sort).
pub fn visit_order(mask: &Array2<bool>, sequence: VisitSequence) -> Vec<usize> {
    let n_cols = mask.ncols();
    match sequence {
        VisitSequence::Roman => (0..n_cols).collect(),
        VisitSequence::Arabic => (0..n_cols).rev().collect(),
        VisitSequence::Monotone => {
            let counts = missing_counts(mask);
            let mut order: Vec<usize> = (0..n_cols).collect();
            order.sort_by(|&a, &b| counts[b].cmp(&counts[a]));
            order
        }
        VisitSequence::RevMonotone => {
            let counts = missing_counts(mask);
            let mut order: Vec<usize> = (0..n_cols).collect();
            order.sort_by(|&a, &b| counts[a].cmp(&counts[b]));
            order
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    fn mask_with_counts() -> Array2<bool> {
        // column missing counts: 1, 3, 0, 2
        arr2(&[
            [true, true, false, true],
            [false, true, false, true],
            [false, true, false, false],
        ])
    }

    #[test]
    fn test_roman_and_arabic() {
        let mask = mask_with_counts();
        assert_eq!(visit_order(&mask, VisitSequence::Roman), vec![0, 1, 2, 3]);
        assert_eq!(visit_order(&mask, VisitSequence::Arabic), vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_monotone_orders_by_descending_count() {
        let mask = mask_with_counts();
        assert_eq!(
            visit_order(&mask, VisitSequence::Monotone),
            vec![1, 3, 0, 2]
        );
    }

    #[test]
    fn test_monotone_reverses_revmonotone_without_ties() {
        let mask = mask_with_counts();
        let mut monotone = visit_order(&mask, VisitSequence::Monotone);
        monotone.reverse();
        assert_eq!(monotone, visit_order(&mask, VisitSequence::RevMonotone));
    }

    #[test]
    fn test_order_is_permutation() {
        let mask = mask_with_counts();
        for seq in [
            VisitSequence::Roman,
            VisitSequence::Arabic,
            VisitSequence::Monotone,
            VisitSequence::RevMonotone,
        ] {
            let mut order = visit_order(&mask, seq);
            order.sort_unstable();
            assert_eq!(order, vec![0, 1, 2, 3]);
        }
    }

    #[test]
    fn test_monotone_tie_break_is_stable() {
        // columns 0 and 2 tie with one missing cell each
        let mask = arr2(&[[true, false, true], [false, false, false]]);
        assert_eq!(
            visit_order(&mask, VisitSequence::Monotone),
            vec![0, 2, 1]
        );
    }
}
