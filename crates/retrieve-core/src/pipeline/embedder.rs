//! Turns a discovered image set into an embedded set.

use futures_util::stream::{self, StreamExt};
use ndarray::Array4;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::config::Config;
use crate::dataset::{ImageDecoder, ImageSet, LabeledImage, Validator};
use crate::embedding::preprocess::preprocess;
use crate::embedding::{EmbeddingEngine, PreprocessOptions};
use crate::error::PipelineError;
use crate::types::{EmbeddedImage, EmbeddedSet};

/// Anything that maps preprocessed image tensors to feature vectors.
pub trait BatchEncoder: Send + Sync + 'static {
    fn preprocess_options(&self) -> PreprocessOptions;

    /// One vector per tensor, in input order.
    fn encode_batch(
        &self,
        tensors: &[Array4<f32>],
        paths: &[PathBuf],
    ) -> Result<Vec<Vec<f32>>, PipelineError>;
}

impl BatchEncoder for EmbeddingEngine {
    fn preprocess_options(&self) -> PreprocessOptions {
        *EmbeddingEngine::preprocess_options(self)
    }

    fn encode_batch(
        &self,
        tensors: &[Array4<f32>],
        paths: &[PathBuf],
    ) -> Result<Vec<Vec<f32>>, PipelineError> {
        self.embed_preprocessed_batch(tensors, paths)
    }
}

/// Validates, decodes, preprocesses and embeds every image of a set.
pub struct ImageEmbedder<E: BatchEncoder = EmbeddingEngine> {
    encoder: Arc<E>,
    validator: Validator,
    decoder: ImageDecoder,
    parallel_workers: usize,
    batch_size: usize,
    embed_timeout_ms: u64,
}

impl<E: BatchEncoder> ImageEmbedder<E> {
    pub fn new(encoder: Arc<E>, config: &Config) -> Self {
        Self {
            encoder,
            validator: Validator::new(config.limits.clone()),
            decoder: ImageDecoder::new(config.limits.clone()),
            parallel_workers: config.processing.parallel_workers.max(1),
            batch_size: config.embedding.batch_size.max(1),
            embed_timeout_ms: config.limits.embed_timeout_ms,
        }
    }

    /// Embed every image of `set`.
    ///
    /// Images are loaded `parallel_workers` at a time with their order kept,
    /// then encoded `batch_size` at a time. Images that fail any stage are
    /// logged and skipped. `progress` is called once per image, whether it
    /// succeeded or not.
    pub async fn embed_set(
        &self,
        set: &ImageSet,
        progress: &(dyn Fn() + Send + Sync),
    ) -> Result<EmbeddedSet, PipelineError> {
        let options = self.encoder.preprocess_options();
        let mut images = Vec::with_capacity(set.len());
        let mut failed = 0usize;

        let mut batches = stream::iter(set.images.iter())
            .map(|image| self.load(image, options))
            .buffered(self.parallel_workers)
            .chunks(self.batch_size);

        while let Some(batch) = batches.next().await {
            let mut ready: Vec<(&LabeledImage, Array4<f32>)> = Vec::with_capacity(batch.len());
            for (image, loaded) in batch {
                match loaded {
                    Ok(tensor) => ready.push((image, tensor)),
                    Err(e) => {
                        tracing::warn!("Skipping image: {}", e);
                        failed += 1;
                        progress();
                    }
                }
            }
            if ready.is_empty() {
                continue;
            }

            let (sources, tensors): (Vec<&LabeledImage>, Vec<Array4<f32>>) =
                ready.into_iter().unzip();
            match self.encode(tensors, &sources).await {
                Ok(vectors) => {
                    for (source, embedding) in sources.into_iter().zip(vectors) {
                        images.push(EmbeddedImage {
                            name: source.name.clone(),
                            path: source.path.clone(),
                            class: source.class.clone(),
                            embedding,
                        });
                        progress();
                    }
                }
                Err(e) => {
                    tracing::error!("Embedding batch of {} images failed: {}", sources.len(), e);
                    failed += sources.len();
                    sources.iter().for_each(|_| progress());
                }
            }
        }

        if images.is_empty() {
            return Err(PipelineError::EmptySet(set.root.clone()));
        }

        tracing::info!(
            "Embedded {} images from {:?} ({} failed)",
            images.len(),
            set.root,
            failed
        );

        Ok(EmbeddedSet {
            root: set.root.clone(),
            images,
            failed,
        })
    }

    /// Validate, decode and preprocess one image.
    async fn load<'a>(
        &self,
        image: &'a LabeledImage,
        options: PreprocessOptions,
    ) -> (&'a LabeledImage, Result<Array4<f32>, PipelineError>) {
        let result = async {
            self.validator.validate(&image.path)?;
            let decoded = self.decoder.decode(&image.path).await?;
            let path = image.path.clone();
            tokio::task::spawn_blocking(move || preprocess(&decoded.image, &options))
                .await
                .map_err(|e| PipelineError::Decode {
                    path,
                    message: format!("Task join error: {}", e),
                })
        }
        .await;
        (image, result)
    }

    /// Run one encoder call on the blocking pool, bounded by `embed_timeout_ms`.
    async fn encode(
        &self,
        tensors: Vec<Array4<f32>>,
        sources: &[&LabeledImage],
    ) -> Result<Vec<Vec<f32>>, PipelineError> {
        let paths: Vec<PathBuf> = sources.iter().map(|s| s.path.clone()).collect();
        let first = paths.first().cloned().unwrap_or_default();
        let encoder = Arc::clone(&self.encoder);
        let expected = tensors.len();

        let result = timeout(
            Duration::from_millis(self.embed_timeout_ms),
            tokio::task::spawn_blocking(move || encoder.encode_batch(&tensors, &paths)),
        )
        .await;

        let vectors = match result {
            Ok(Ok(inner)) => inner?,
            Ok(Err(e)) => {
                return Err(PipelineError::Embedding {
                    path: first,
                    message: format!("Task join error: {}", e),
                })
            }
            Err(_) => {
                return Err(PipelineError::Timeout {
                    path: first,
                    stage: "embed".to_string(),
                    timeout_ms: self.embed_timeout_ms,
                })
            }
        };

        if vectors.len() != expected {
            return Err(PipelineError::Embedding {
                path: first,
                message: format!("expected {} embeddings, got {}", expected, vectors.len()),
            });
        }
        Ok(vectors)
    }
}
