//! Retrieve Core - embedding-based image retrieval.
//!
//! Embeds a query set and a gallery set with an ONNX encoder, ranks the
//! gallery for every query, scores the ranking against class labels and
//! packages it for the challenge scoring endpoint.
//!
//! ```text
//! Discover → Validate → Decode → Preprocess → Embed → Rank (pairwise | k-NN) → Score / Submit
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use retrieve_core::{Config, EmbeddingEngine, FileDiscovery, ImageEmbedder, Retriever, RetrievalMethod};
//!
//! let config = Config::load()?;
//! let engine = Arc::new(EmbeddingEngine::load(&config.embedding, &config.model_dir())?);
//! let embedder = ImageEmbedder::new(engine, &config);
//! let discovery = FileDiscovery::new(config.processing.clone());
//!
//! let queries = embedder.embed_set(&discovery.discover("dataset/validation/query".as_ref()), &|| {}).await?;
//! let gallery = embedder.embed_set(&discovery.discover("dataset/validation/gallery".as_ref()), &|| {}).await?;
//!
//! let run = Retriever::new(config.retrieval.clone()).retrieve(&queries, &gallery, RetrievalMethod::Knn)?;
//! println!("{:?}", run.accuracy);
//! ```

pub mod config;
pub mod dataset;
pub mod embedding;
pub mod error;
pub mod math;
pub mod output;
pub mod pipeline;
pub mod retrieval;
pub mod submission;
pub mod types;
pub mod visualize;

pub use config::Config;
pub use dataset::{DatasetLayout, FileDiscovery, ImageSet, LabeledImage, Split};
pub use embedding::{EmbeddingEngine, ModelKind};
pub use error::{
    ConfigError, PipelineError, PipelineResult, Result, RetrievalError, RetrieveError,
    SubmissionError,
};
pub use output::{OutputFormat, OutputWriter};
pub use pipeline::{BatchEncoder, ImageEmbedder};
pub use retrieval::{AccuracyReport, Metric, RetrievalMethod, Retriever};
pub use submission::{ResultsBuilder, Submission, SubmissionClient, SubmissionReceipt};
pub use types::{EmbeddedImage, EmbeddedSet, Match, QueryResult, RetrievalRun, RunStats};
pub use visualize::Montage;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
