//! Ranking gallery images against queries and scoring the ranking.
//!
//! Two methods are available, both over the same embeddings:
//! - **pairwise**: full query x gallery distance matrix, argsorted per row
//! - **knn**: brute-force nearest-neighbour search returning `k` hits per query

mod accuracy;
mod distance;
mod knn;
mod metric;
mod rank;

pub use accuracy::{topk_accuracy, AccuracyReport, TopK};
pub use distance::{pairwise_distances, DistanceMatrix};
pub use knn::{NearestNeighbors, Neighbor};
pub use metric::Metric;
pub use rank::{argsort, rank};

use serde::{Deserialize, Serialize};

use crate::config::RetrievalConfig;
use crate::error::RetrievalError;
use crate::types::{EmbeddedSet, Match, QueryResult, RetrievalRun};

/// How the gallery is ranked for each query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMethod {
    Pairwise,
    Knn,
}

impl RetrievalMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pairwise => "pairwise",
            Self::Knn => "knn",
        }
    }

    /// Human-readable label used in accuracy lines.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pairwise => "pairwise distance",
            Self::Knn => "knn",
        }
    }
}

impl std::fmt::Display for RetrievalMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ranks gallery embeddings for every query and scores the result.
pub struct Retriever {
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(config: RetrievalConfig) -> Self {
        Self { config }
    }

    /// Metric configured for a method.
    pub fn metric_for(&self, method: RetrievalMethod) -> Result<Metric, RetrievalError> {
        let name = match method {
            RetrievalMethod::Pairwise => &self.config.metric,
            RetrievalMethod::Knn => &self.config.knn_metric,
        };
        Metric::parse(name, self.config.minkowski_p)
    }

    /// Rank `gallery` for every image of `queries`.
    ///
    /// Accuracy is computed on the full ranking (pairwise) or on the `k`
    /// neighbours (knn); stored matches are cut at `top_k`.
    pub fn retrieve(
        &self,
        queries: &EmbeddedSet,
        gallery: &EmbeddedSet,
        method: RetrievalMethod,
    ) -> Result<RetrievalRun, RetrievalError> {
        let metric = self.metric_for(method)?;
        let query_vecs = queries.embeddings();
        let gallery_vecs = gallery.embeddings();

        let rankings: Vec<Vec<(usize, f32)>> = match method {
            RetrievalMethod::Pairwise => {
                let matrix = pairwise_distances(&query_vecs, &gallery_vecs, metric)?;
                tracing::info!("Computed distances, matrix shape {:?}", matrix.shape());
                rank(&matrix)
                    .into_iter()
                    .enumerate()
                    .map(|(q, order)| order.into_iter().map(|g| (g, matrix.get(q, g))).collect())
                    .collect()
            }
            RetrievalMethod::Knn => {
                let gallery_owned: Vec<Vec<f32>> =
                    gallery_vecs.iter().map(|v| v.to_vec()).collect();
                let knn = NearestNeighbors::fit(gallery_owned, metric)?;
                tracing::info!("Fitted {}-NN on {} gallery images", self.config.knn_neighbors, knn.len());
                knn.kneighbors_batch(&query_vecs, self.config.knn_neighbors)?
                    .into_iter()
                    .map(|hits| hits.into_iter().map(|n| (n.index, n.distance)).collect())
                    .collect()
            }
        };

        let accuracy = if queries.is_labelled() {
            let matched: Vec<Vec<Option<&str>>> = rankings
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|&(g, _)| gallery.images[g].class.as_deref())
                        .collect()
                })
                .collect();
            AccuracyReport::compute(&queries.classes(), &matched, &self.config.report_ks)?
        } else {
            None
        };

        let results = queries
            .images
            .iter()
            .zip(rankings)
            .map(|(query, row)| QueryResult {
                query: query.name.clone(),
                class: query.class.clone(),
                matches: row
                    .into_iter()
                    .take(self.config.top_k)
                    .map(|(index, distance)| {
                        let hit = &gallery.images[index];
                        Match {
                            name: hit.name.clone(),
                            index,
                            class: hit.class.clone(),
                            distance,
                        }
                    })
                    .collect(),
            })
            .collect();

        Ok(RetrievalRun {
            method,
            metric: metric.to_string(),
            results,
            accuracy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EmbeddedImage;
    use std::path::PathBuf;

    fn set(items: &[(&str, Option<&str>, [f32; 2])]) -> EmbeddedSet {
        EmbeddedSet {
            root: PathBuf::from("set"),
            images: items
                .iter()
                .map(|(name, class, v)| EmbeddedImage {
                    name: name.to_string(),
                    path: PathBuf::from(name),
                    class: class.map(str::to_string),
                    embedding: v.to_vec(),
                })
                .collect(),
            failed: 0,
        }
    }

    fn fixtures() -> (EmbeddedSet, EmbeddedSet) {
        let queries = set(&[
            ("q_cat.jpg", Some("cat"), [1.0, 0.1]),
            ("q_dog.jpg", Some("dog"), [0.1, 1.0]),
        ]);
        let gallery = set(&[
            ("g_dog1.jpg", Some("dog"), [0.0, 1.0]),
            ("g_cat1.jpg", Some("cat"), [1.0, 0.0]),
            ("g_cat2.jpg", Some("cat"), [0.9, 0.3]),
            ("g_bird.jpg", Some("bird"), [-1.0, -1.0]),
        ]);
        (queries, gallery)
    }

    #[test]
    fn test_pairwise_retrieval_and_accuracy() {
        let (queries, gallery) = fixtures();
        let retriever = Retriever::new(RetrievalConfig::default());
        let run = retriever
            .retrieve(&queries, &gallery, RetrievalMethod::Pairwise)
            .unwrap();

        assert_eq!(run.metric, "minkowski(p=2)");
        assert_eq!(run.results[0].matches[0].name, "g_cat1.jpg");
        assert_eq!(run.results[1].matches[0].name, "g_dog1.jpg");
        assert_eq!(run.results[0].matches.len(), 4);

        let report = run.accuracy.unwrap();
        assert_eq!(report.evaluated, 2);
        assert_eq!(report.at(1), Some(1.0));
        assert_eq!(report.at(10), Some(1.0));
    }

    #[test]
    fn test_knn_retrieval_respects_neighbors_and_top_k() {
        let (queries, gallery) = fixtures();
        let config = RetrievalConfig {
            knn_neighbors: 3,
            top_k: 2,
            ..RetrievalConfig::default()
        };
        let run = Retriever::new(config)
            .retrieve(&queries, &gallery, RetrievalMethod::Knn)
            .unwrap();

        assert_eq!(run.metric, "cosine");
        assert_eq!(run.results[0].matches.len(), 2);
        assert_eq!(run.results[0].matches[0].name, "g_cat1.jpg");
        assert!(run.accuracy.is_some());
    }

    #[test]
    fn test_unlabelled_queries_have_no_accuracy() {
        let queries = set(&[("q.jpg", None, [1.0, 0.0])]);
        let (_, gallery) = fixtures();
        let run = Retriever::new(RetrievalConfig::default())
            .retrieve(&queries, &gallery, RetrievalMethod::Knn)
            .unwrap();
        assert!(run.accuracy.is_none());
        assert_eq!(run.results[0].query, "q.jpg");
    }

    #[test]
    fn test_empty_gallery_is_an_error() {
        let (queries, _) = fixtures();
        let gallery = EmbeddedSet::default();
        let err = Retriever::new(RetrievalConfig::default())
            .retrieve(&queries, &gallery, RetrievalMethod::Pairwise)
            .unwrap_err();
        assert_eq!(err, RetrievalError::EmptyGallery);
    }
}
