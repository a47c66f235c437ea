//! Sub-configuration structs with their defaults.

pub use crate::embedding::{ModelKind, Normalization, TensorLayout};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory where ONNX models are stored
    pub model_dir: PathBuf,

    /// Root directory for results, submissions and plots
    pub output_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("~/.retrieve/models"),
            output_dir: PathBuf::from("output"),
        }
    }
}

/// Dataset directory layout.
///
/// Validation split: `<data_path>/<validation_dir>/{query,gallery}/<class>/*.jpg`.
/// Test split: `<data_path>/{query,gallery}/*.jpg`.
/// Training split: `<data_path>/<training_dir>/<class>/*.jpg`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub data_path: PathBuf,
    pub training_dir: String,
    pub validation_dir: String,
    pub query_dir: String,
    pub gallery_dir: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("dataset"),
            training_dir: "training".to_string(),
            validation_dir: "validation".to_string(),
            query_dir: "query".to_string(),
            gallery_dir: "gallery".to_string(),
        }
    }
}

/// Processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Number of images decoded concurrently
    pub parallel_workers: usize,

    /// Supported input formats
    pub supported_formats: Vec<String>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            parallel_workers: 4,
            supported_formats: vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()],
        }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum file size in megabytes
    pub max_file_size_mb: u64,

    /// Maximum image dimension (width or height)
    pub max_image_dimension: u32,

    /// Decode timeout in milliseconds
    pub decode_timeout_ms: u64,

    /// Timeout for one embedding batch in milliseconds
    pub embed_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 100,
            max_image_dimension: 10000,
            decode_timeout_ms: 5000,
            embed_timeout_ms: 120_000,
        }
    }
}

/// Embedding model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Which network produces the embeddings
    pub model: ModelKind,

    /// Square input size fed to the network
    pub image_size: u32,

    /// Input channels: 3 (RGB) or 1 (luma)
    pub channels: u32,

    /// Images per inference call
    pub batch_size: usize,

    /// Input tensor layout expected by the exported model
    pub layout: TensorLayout,

    /// Pixel normalization applied before inference
    pub normalization: Normalization,

    /// Output tensor to read; the first output when unset
    pub output_name: Option<String>,

    /// L2-normalize embeddings after flattening
    pub l2_normalize: bool,

    /// Where `retrieve models download` fetches the selected model from
    pub model_url: Option<String>,

    /// Expected BLAKE3 checksum of the downloaded model
    pub model_blake3: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: ModelKind::Autoencoder,
            image_size: 324,
            channels: 3,
            batch_size: 32,
            layout: TensorLayout::Nhwc,
            normalization: Normalization::Unit,
            output_name: None,
            l2_normalize: false,
            model_url: None,
            model_blake3: None,
        }
    }
}

/// Distance and ranking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Metric for the full query x gallery distance matrix (scipy names)
    pub metric: String,

    /// Exponent for the minkowski metric
    pub minkowski_p: f64,

    /// Metric for the nearest-neighbour search
    pub knn_metric: String,

    /// Neighbours returned per query by the nearest-neighbour search
    pub knn_neighbors: usize,

    /// Gallery names kept per query in results and submissions
    pub top_k: usize,

    /// Cut-offs reported as top-k accuracy
    pub report_ks: Vec<usize>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            metric: "minkowski".to_string(),
            minkowski_p: 2.0,
            knn_metric: "cosine".to_string(),
            knn_neighbors: 10,
            top_k: 10,
            report_ks: vec![1, 3, 10],
        }
    }
}

/// Scoring endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionConfig {
    /// Endpoint receiving the JSON results
    pub url: String,

    /// Group name sent with every submission
    pub group_name: String,

    /// Request timeout in milliseconds
    pub timeout_ms: u64,

    /// Max retry attempts for transient failures
    pub retry_attempts: u32,

    /// Base delay between retries in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            url: "http://kamino.disi.unitn.it:3001/results/".to_string(),
            group_name: "retrieve".to_string(),
            timeout_ms: 30_000,
            retry_attempts: 3,
            retry_delay_ms: 1000,
        }
    }
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Results file format ("json" or "jsonl")
    pub format: String,

    /// Pretty-print JSON output
    pub pretty: bool,

    /// Render a retrieval montage per query
    pub plot: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "json".to_string(),
            pretty: true,
            plot: false,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
