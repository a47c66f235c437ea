//! Brute-force nearest-neighbour search over gallery embeddings.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

use super::metric::Metric;
use super::rank::argsort;

/// A gallery hit returned by [`NearestNeighbors::kneighbors`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    /// Index into the fitted gallery
    pub index: usize,
    pub distance: f32,
}

/// Exact k-NN index: stores the gallery and scans it for every query.
pub struct NearestNeighbors {
    gallery: Vec<Vec<f32>>,
    metric: Metric,
    dim: usize,
}

impl NearestNeighbors {
    /// Fit the index on gallery embeddings.
    pub fn fit(gallery: Vec<Vec<f32>>, metric: Metric) -> Result<Self, RetrievalError> {
        let dim = super::distance::check_dimensions::<Vec<f32>>(&[], &gallery)?;
        Ok(Self {
            gallery,
            metric,
            dim,
        })
    }

    pub fn len(&self) -> usize {
        self.gallery.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gallery.is_empty()
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// The `k` gallery entries closest to `query`, nearest first.
    ///
    /// `k` larger than the gallery returns the whole gallery, with a warning.
    pub fn kneighbors(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, RetrievalError> {
        self.warn_if_clamped(k);
        self.nearest(query, k)
    }

    fn warn_if_clamped(&self, k: usize) {
        if k > self.len() {
            tracing::warn!(
                "Requested {} neighbours but the gallery holds {}; returning the whole gallery",
                k,
                self.len()
            );
        }
    }

    fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, RetrievalError> {
        if k == 0 {
            return Err(RetrievalError::InvalidK(k));
        }
        if query.len() != self.dim {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dim,
                got: query.len(),
            });
        }

        let distances: Vec<f32> = self
            .gallery
            .iter()
            .map(|g| self.metric.distance(query, g))
            .collect();

        Ok(argsort(&distances)
            .into_iter()
            .take(k)
            .map(|index| Neighbor {
                index,
                distance: distances[index],
            })
            .collect())
    }

    /// Run [`kneighbors`](Self::kneighbors) for every query in parallel.
    pub fn kneighbors_batch<V: AsRef<[f32]> + Sync>(
        &self,
        queries: &[V],
        k: usize,
    ) -> Result<Vec<Vec<Neighbor>>, RetrievalError> {
        self.warn_if_clamped(k);
        queries
            .par_iter()
            .map(|q| self.nearest(q.as_ref(), k))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gallery() -> Vec<Vec<f32>> {
        vec![
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 1.0],
            vec![-1.0, 0.0],
        ]
    }

    #[test]
    fn test_fit_empty_gallery() {
        assert!(matches!(
            NearestNeighbors::fit(vec![], Metric::Cosine),
            Err(RetrievalError::EmptyGallery)
        ));
    }

    #[test]
    fn test_fit_ragged_gallery() {
        let result = NearestNeighbors::fit(vec![vec![1.0], vec![1.0, 2.0]], Metric::Cosine);
        assert!(matches!(
            result,
            Err(RetrievalError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_kneighbors_cosine_order() {
        let knn = NearestNeighbors::fit(gallery(), Metric::Cosine).unwrap();
        let hits = knn.kneighbors(&[2.0, 0.1], 3).unwrap();
        let indices: Vec<usize> = hits.iter().map(|n| n.index).collect();
        assert_eq!(indices, vec![0, 2, 1]);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn test_kneighbors_clamps_k() {
        let knn = NearestNeighbors::fit(gallery(), Metric::Euclidean).unwrap();
        let hits = knn.kneighbors(&[0.0, 0.0], 10).unwrap();
        assert_eq!(hits.len(), 4);
    }

    #[derive(Clone, Default)]
    struct LogBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogBuffer {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn logs_of(f: impl FnOnce()) -> String {
        let buffer = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(buffer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = buffer.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_single_query_warns_when_k_is_clamped() {
        let knn = NearestNeighbors::fit(gallery(), Metric::Euclidean).unwrap();

        let clamped = logs_of(|| {
            knn.kneighbors(&[0.0, 0.0], 10).unwrap();
        });
        assert!(clamped.contains("Requested 10 neighbours"), "{clamped}");

        let in_range = logs_of(|| {
            knn.kneighbors(&[0.0, 0.0], 2).unwrap();
        });
        assert!(!in_range.contains("neighbours"), "{in_range}");
    }

    #[test]
    fn test_kneighbors_rejects_zero_k_and_bad_dim() {
        let knn = NearestNeighbors::fit(gallery(), Metric::Euclidean).unwrap();
        assert_eq!(
            knn.kneighbors(&[0.0, 0.0], 0),
            Err(RetrievalError::InvalidK(0))
        );
        assert!(knn.kneighbors(&[0.0], 1).is_err());
    }

    #[test]
    fn test_kneighbors_batch() {
        let knn = NearestNeighbors::fit(gallery(), Metric::Euclidean).unwrap();
        let queries = vec![vec![1.0f32, 0.1], vec![-0.9, 0.0]];
        let hits = knn.kneighbors_batch(&queries, 1).unwrap();
        assert_eq!(hits[0][0].index, 0);
        assert_eq!(hits[1][0].index, 3);
    }
}
