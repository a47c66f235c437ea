//! Error types for the retrieval pipeline.
//!
//! Errors are organized by stage so a failure names the image, the stage and
//! the offending value.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for retrieve operations.
#[derive(Error, Debug)]
pub enum RetrieveError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Image loading and embedding errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Ranking and scoring errors
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    /// Result submission errors
    #[error("Submission error: {0}")]
    Submission(#[from] SubmissionError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Image loading and embedding errors, organized by stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Image decoding failed
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// Embedding generation failed
    #[error("Embedding failed for {path}: {message}")]
    Embedding { path: PathBuf, message: String },

    /// Augmented image could not be produced or written
    #[error("Augmentation failed for {path}: {message}")]
    Augment { path: PathBuf, message: String },

    /// Writing an output artifact failed
    #[error("Write failed for {path}: {message}")]
    Write { path: PathBuf, message: String },

    /// Operation timed out
    #[error("Timeout in {stage} stage for {path} after {timeout_ms}ms")]
    Timeout {
        path: PathBuf,
        stage: String,
        timeout_ms: u64,
    },

    /// File exceeds size limit
    #[error("File too large: {path} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge {
        path: PathBuf,
        size_mb: u64,
        max_mb: u64,
    },

    /// Image dimensions exceed limit
    #[error("Image too large: {path} ({width}x{height} > {max_dim})")]
    ImageTooLarge {
        path: PathBuf,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// Unsupported image format
    #[error("Unsupported format for {path}: {format}")]
    UnsupportedFormat { path: PathBuf, format: String },

    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// No usable image in a query, gallery or training directory
    #[error("No usable images in {0}")]
    EmptySet(PathBuf),
}

/// Errors raised while computing distances, rankings and accuracies.
#[derive(Error, Debug, PartialEq)]
pub enum RetrievalError {
    /// Nothing to rank against
    #[error("Gallery is empty")]
    EmptyGallery,

    /// Query and gallery embeddings have different lengths
    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Ground-truth and match lists do not line up
    #[error("Length mismatch: {ground_truth} ground-truth labels vs {matched} match rows")]
    LengthMismatch { ground_truth: usize, matched: usize },

    /// Metric name not recognised
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    /// Top-k cut-off must be positive
    #[error("Invalid k: {0}")]
    InvalidK(usize),
}

/// Errors raised while posting results to the scoring endpoint.
#[derive(Error, Debug)]
pub enum SubmissionError {
    /// Transport failure or non-success HTTP status
    #[error("Submission to {url} failed: {message}")]
    Http {
        url: String,
        message: String,
        status_code: Option<u16>,
    },

    /// Endpoint could not be reached or the request could not be sent
    #[error("Could not reach {url}: {message}")]
    Connect { url: String, message: String },

    /// Endpoint did not answer in time
    #[error("Submission to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    /// Submission body could not be encoded
    #[error("Failed to encode submission: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Convenience type alias for retrieve results.
pub type Result<T> = std::result::Result<T, RetrieveError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
