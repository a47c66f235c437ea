//! Ranking gallery images by ascending distance.

use std::cmp::Ordering;

use rayon::prelude::*;

use super::distance::DistanceMatrix;

/// Order distances ascending with NaN after every number.
fn cmp_distance(a: f32, b: f32) -> Ordering {
    a.is_nan().cmp(&b.is_nan()).then(a.total_cmp(&b))
}

/// Gallery indices sorted by ascending distance.
///
/// The sort is stable: equal distances keep gallery order.
pub fn argsort(row: &[f32]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..row.len()).collect();
    indices.sort_by(|&a, &b| cmp_distance(row[a], row[b]));
    indices
}

/// Rank every row of a distance matrix.
pub fn rank(matrix: &DistanceMatrix) -> Vec<Vec<usize>> {
    let (rows, _) = matrix.shape();
    (0..rows)
        .into_par_iter()
        .map(|i| argsort(matrix.row(i)))
        .collect()
}
