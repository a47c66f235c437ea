//! Image embedding generation.
//!
//! Converts images into flat feature vectors with one of three encoders
//! (convolutional autoencoder, pretrained ResNet50 backbone, triplet-loss
//! encoder) running locally via ONNX Runtime.
//!
//! # Usage
//!
//! ```rust,ignore
//! use retrieve_core::embedding::EmbeddingEngine;
//! use retrieve_core::Config;
//!
//! let config = Config::default();
//! let engine = EmbeddingEngine::load(&config.embedding, &config.model_dir())?;
//! let embedding = engine.embed(&decoded.image, &path)?;
//! ```

mod model;
pub(crate) mod onnx;
pub mod preprocess;

pub use model::{ModelKind, Normalization, TensorLayout};
pub use preprocess::PreprocessOptions;

use std::path::{Path, PathBuf};

use image::DynamicImage;
use ndarray::Array4;

use crate::config::EmbeddingConfig;
use crate::error::PipelineError;

use self::onnx::OnnxSession;
use self::preprocess::preprocess;

/// Engine for generating image embeddings.
pub struct EmbeddingEngine {
    session: OnnxSession,
    model: ModelKind,
    options: PreprocessOptions,
    l2_normalize: bool,
}

impl EmbeddingEngine {
    /// Load the configured encoder from the model directory.
    ///
    /// Expects the ONNX model at `{model_dir}/{model.file_name()}`.
    pub fn load(config: &EmbeddingConfig, model_dir: &Path) -> Result<Self, PipelineError> {
        let model_path = Self::model_path(config.model, model_dir);

        if !model_path.exists() {
            return Err(PipelineError::Embedding {
                path: model_path,
                message: format!(
                    "Model not found. Export the {} encoder to ONNX or run `retrieve models download`.",
                    config.model
                ),
            });
        }

        tracing::info!("Loading {} encoder from {:?}", config.model, model_path);
        let session = OnnxSession::load(&model_path, config.output_name.clone())?;
        tracing::info!("{} encoder loaded", config.model);

        Ok(Self {
            session,
            model: config.model,
            options: PreprocessOptions::from_config(config),
            l2_normalize: config.l2_normalize,
        })
    }

    /// The encoder variant behind this engine.
    pub fn model(&self) -> ModelKind {
        self.model
    }

    /// Input preprocessing parameters.
    pub fn preprocess_options(&self) -> &PreprocessOptions {
        &self.options
    }

    /// Preprocess an image into the model's input tensor.
    pub fn preprocess(&self, image: &DynamicImage) -> Array4<f32> {
        preprocess(image, &self.options)
    }

    /// Generate an embedding vector for one image.
    pub fn embed(&self, image: &DynamicImage, path: &Path) -> Result<Vec<f32>, PipelineError> {
        let tensor = self.preprocess(image);
        let mut rows = self.embed_preprocessed_batch(&[tensor], &[path.to_path_buf()])?;
        rows.pop().ok_or_else(|| PipelineError::Embedding {
            path: path.to_path_buf(),
            message: "Model returned no embedding".to_string(),
        })
    }

    /// Generate embeddings from already-preprocessed tensors in one inference call.
    pub fn embed_preprocessed_batch(
        &self,
        tensors: &[Array4<f32>],
        paths: &[PathBuf],
    ) -> Result<Vec<Vec<f32>>, PipelineError> {
        let mut rows = self.session.embed_batch(tensors, paths)?;
        if self.l2_normalize {
            for row in rows.iter_mut() {
                crate::math::l2_normalize_in_place(row);
            }
        }
        Ok(rows)
    }

    /// Check whether the model file exists on disk.
    pub fn model_exists(model: ModelKind, model_dir: &Path) -> bool {
        Self::model_path(model, model_dir).exists()
    }

    /// Get the expected model file path.
    pub fn model_path(model: ModelKind, model_dir: &Path) -> PathBuf {
        model_dir.join(model.file_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_model_has_hint() {
        let dir = tempfile::tempdir().unwrap();
        let config = EmbeddingConfig::default();
        let err = EmbeddingEngine::load(&config, dir.path())
            .err()
            .expect("missing model must fail");
        let msg = err.to_string();
        assert!(msg.contains("conv_ae_encoder.onnx"));
        assert!(msg.contains("retrieve models download"));
    }

    #[test]
    fn test_model_path() {
        let path = EmbeddingEngine::model_path(ModelKind::Pretrained, Path::new("/models"));
        assert_eq!(path, PathBuf::from("/models/resnet50_notop.onnx"));
        assert!(!EmbeddingEngine::model_exists(
            ModelKind::Pretrained,
            Path::new("/nonexistent")
        ));
    }
}
