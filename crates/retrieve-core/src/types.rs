//! Core data types flowing through the retrieval pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::retrieval::{AccuracyReport, RetrievalMethod};

/// An image paired with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedImage {
    /// File name, the identifier used in submissions
    pub name: String,

    /// Path to the source file
    pub path: PathBuf,

    /// Class label (containing folder), absent in flat layouts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,

    /// Flattened feature vector
    pub embedding: Vec<f32>,
}

/// Embeddings for every usable image of a query or gallery directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbeddedSet {
    /// Directory the images were discovered in
    pub root: PathBuf,

    /// Images in discovery order
    pub images: Vec<EmbeddedImage>,

    /// Images that failed validation, decoding or embedding
    pub failed: usize,
}

impl EmbeddedSet {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Embedding vectors in image order.
    pub fn embeddings(&self) -> Vec<&[f32]> {
        self.images.iter().map(|i| i.embedding.as_slice()).collect()
    }

    /// Class labels in image order.
    pub fn classes(&self) -> Vec<Option<&str>> {
        self.images.iter().map(|i| i.class.as_deref()).collect()
    }

    /// Whether any image carries a class label.
    pub fn is_labelled(&self) -> bool {
        self.images.iter().any(|i| i.class.is_some())
    }

    /// Embedding dimension, if the set is non-empty.
    pub fn dimension(&self) -> Option<usize> {
        self.images.first().map(|i| i.embedding.len())
    }
}

/// One gallery image retrieved for a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    /// Gallery file name
    pub name: String,

    /// Index into the gallery set
    pub index: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,

    pub distance: f32,
}

/// Ranked gallery matches for one query, nearest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Query file name
    pub query: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,

    pub matches: Vec<Match>,
}

impl QueryResult {
    /// Gallery names in rank order.
    pub fn match_names(&self) -> Vec<String> {
        self.matches.iter().map(|m| m.name.clone()).collect()
    }
}

/// Outcome of ranking a gallery against a query set with one method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalRun {
    pub method: RetrievalMethod,

    /// Distance metric, e.g. "minkowski(p=2)" or "cosine"
    pub metric: String,

    pub results: Vec<QueryResult>,

    /// Present when the query set is labelled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<AccuracyReport>,
}

/// Timing and counts for one evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunStats {
    pub queries: usize,
    pub gallery: usize,
    pub failed: usize,
    pub embedding_dim: usize,
    pub embed_seconds: f64,
    pub retrieval_seconds: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(name: &str, class: Option<&str>, embedding: Vec<f32>) -> EmbeddedImage {
        EmbeddedImage {
            name: name.to_string(),
            path: PathBuf::from(name),
            class: class.map(str::to_string),
            embedding,
        }
    }

    #[test]
    fn test_embedded_set_accessors() {
        let set = EmbeddedSet {
            root: PathBuf::from("gallery"),
            images: vec![
                image("a.jpg", Some("cat"), vec![1.0, 0.0]),
                image("b.jpg", None, vec![0.0, 1.0]),
            ],
            failed: 0,
        };
        assert_eq!(set.len(), 2);
        assert_eq!(set.dimension(), Some(2));
        assert_eq!(set.classes(), vec![Some("cat"), None]);
        assert!(set.is_labelled());
        assert_eq!(set.embeddings()[1], &[0.0, 1.0]);
    }

    #[test]
    fn test_query_result_skips_missing_class() {
        let result = QueryResult {
            query: "q.jpg".to_string(),
            class: None,
            matches: vec![Match {
                name: "g.jpg".to_string(),
                index: 0,
                class: None,
                distance: 0.5,
            }],
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains("class"));
        assert_eq!(result.match_names(), vec!["g.jpg".to_string()]);
    }
}
