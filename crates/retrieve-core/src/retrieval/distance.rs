//! Query x gallery distance matrix.

use rayon::prelude::*;

use crate::error::RetrievalError;

use super::metric::Metric;

/// Dense row-major distance matrix: rows are queries, columns gallery images.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl DistanceMatrix {
    /// `(queries, gallery)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Distances from query `i` to every gallery image.
    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    pub fn get(&self, query: usize, gallery: usize) -> f32 {
        self.data[query * self.cols + gallery]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks(self.cols.max(1)).take(self.rows)
    }
}

/// Check every vector has the dimension of the first gallery vector.
pub(crate) fn check_dimensions<V: AsRef<[f32]>>(
    queries: &[V],
    gallery: &[V],
) -> Result<usize, RetrievalError> {
    let dim = gallery
        .first()
        .map(|g| g.as_ref().len())
        .ok_or(RetrievalError::EmptyGallery)?;
    for v in gallery.iter().chain(queries) {
        let got = v.as_ref().len();
        if got != dim {
            return Err(RetrievalError::DimensionMismatch { expected: dim, got });
        }
    }
    Ok(dim)
}

/// Compute the distance between every query and every gallery vector.
///
/// Rows are computed in parallel.
pub fn pairwise_distances<V: AsRef<[f32]> + Sync>(
    queries: &[V],
    gallery: &[V],
    metric: Metric,
) -> Result<DistanceMatrix, RetrievalError> {
    check_dimensions(queries, gallery)?;

    let data: Vec<f32> = queries
        .par_iter()
        .flat_map_iter(|q| {
            let q = q.as_ref();
            gallery.iter().map(move |g| metric.distance(q, g.as_ref()))
        })
        .collect();

    Ok(DistanceMatrix {
        rows: queries.len(),
        cols: gallery.len(),
        data,
    })
}
