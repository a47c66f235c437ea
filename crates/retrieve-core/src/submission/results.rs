//! The results document sent to the scoring endpoint.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::RetrievalRun;

/// Ranked gallery names per query, tagged with the submitting group.
///
/// Serializes as `{"groupname": "...", "images": {"q.jpg": ["g1.jpg", ...]}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub groupname: String,
    pub images: BTreeMap<String, Vec<String>>,
}

impl Submission {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Accumulates query results before they are wrapped into a [`Submission`].
#[derive(Debug, Default, Clone)]
pub struct ResultsBuilder {
    images: BTreeMap<String, Vec<String>>,
}

impl ResultsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the ranked matches of every query in `run`.
    pub fn from_run(run: &RetrievalRun) -> Self {
        let mut builder = Self::new();
        for result in &run.results {
            builder.add(&result.query, result.match_names());
        }
        builder
    }

    /// Record the ranked gallery names of one query. A repeated query
    /// replaces its earlier entry.
    pub fn add(&mut self, query: &str, gallery: Vec<String>) -> &mut Self {
        if self.images.insert(query.to_string(), gallery).is_some() {
            tracing::warn!("Query {} added twice, keeping the latest ranking", query);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn finish(self, group: &str) -> Submission {
        Submission {
            groupname: group.to_string(),
            images: self.images,
        }
    }
}
