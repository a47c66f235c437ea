//! ONNX Runtime session management and batched encoder inference.
//!
//! Loads an encoder exported to ONNX and turns its output tensor into one flat
//! feature vector per image, whatever the output rank (a dense code, or a
//! spatial feature map from a headless backbone).

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ndarray::Array4;
use ort::session::Session;
use ort::value::Value;

use crate::error::PipelineError;

/// Wraps an ONNX Runtime session for an image encoder.
///
/// Uses a `Mutex` because `Session::run` requires `&mut self`.
pub struct OnnxSession {
    session: Mutex<Session>,
    /// Name of the input tensor (detected from model metadata).
    input_name: String,
    /// Output to read; the first output when `None`.
    output_name: Option<String>,
}

impl OnnxSession {
    /// Load an encoder from an ONNX file.
    pub fn load(model_path: &Path, output_name: Option<String>) -> Result<Self, PipelineError> {
        let session = Session::builder()
            .map_err(|e| PipelineError::Embedding {
                path: model_path.to_path_buf(),
                message: format!("Failed to create ONNX session builder: {e}"),
            })?
            .commit_from_file(model_path)
            .map_err(|e| PipelineError::Embedding {
                path: model_path.to_path_buf(),
                message: format!("Failed to load ONNX model: {e}"),
            })?;

        let input_name = session
            .inputs()
            .first()
            .map(|i| i.name().to_string())
            .unwrap_or_else(|| "input_1".to_string());

        tracing::debug!(
            "Loaded encoder from {:?} (input: {:?}, outputs: {:?})",
            model_path,
            input_name,
            session
                .outputs()
                .iter()
                .map(|o| o.name())
                .collect::<Vec<_>>()
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
        })
    }

    /// Run batch inference on preprocessed `[1, ...]` tensors.
    ///
    /// Tensors are stacked into one `[N, ...]` input. Each row of the output
    /// is flattened to `prod(output_shape[1..])` values.
    pub fn embed_batch(
        &self,
        tensors: &[Array4<f32>],
        paths: &[PathBuf],
    ) -> Result<Vec<Vec<f32>>, PipelineError> {
        let batch_size = tensors.len();
        if batch_size == 0 {
            return Ok(vec![]);
        }
        let first_path = paths.first().cloned().unwrap_or_default();

        let shape_0 = tensors[0].shape();
        for (i, t) in tensors.iter().enumerate().skip(1) {
            if t.shape() != shape_0 {
                return Err(PipelineError::Embedding {
                    path: paths.get(i).cloned().unwrap_or_default(),
                    message: format!(
                        "Tensor shape mismatch in batch: expected {:?}, got {:?}",
                        shape_0,
                        t.shape()
                    ),
                });
            }
        }

        let (batch_shape, flat_data) = stack_batch(tensors);

        let input_value =
            Value::from_array((batch_shape, flat_data)).map_err(|e| PipelineError::Embedding {
                path: first_path.clone(),
                message: format!("Failed to create batch input tensor: {e}"),
            })?;

        let inputs = ort::inputs![self.input_name.as_str() => input_value];

        let mut session = self.session.lock().map_err(|e| PipelineError::Embedding {
            path: first_path.clone(),
            message: format!("Session lock poisoned: {e}"),
        })?;

        let outputs = session.run(inputs).map_err(|e| PipelineError::Embedding {
            path: first_path.clone(),
            message: format!("ONNX batch inference failed: {e}"),
        })?;

        let selected = match &self.output_name {
            Some(wanted) => outputs.iter().find(|(name, _)| *name == wanted.as_str()),
            None => outputs.iter().next(),
        }
        .ok_or_else(|| PipelineError::Embedding {
            path: first_path.clone(),
            message: format!(
                "Model did not produce output {}",
                self.output_name.as_deref().unwrap_or("<first>")
            ),
        })?;

        let (shape, data) =
            selected
                .1
                .try_extract_tensor::<f32>()
                .map_err(|e| PipelineError::Embedding {
                    path: first_path.clone(),
                    message: format!("Failed to extract output tensor: {e}"),
                })?;

        if shape.first().is_some_and(|&n| n as usize != batch_size) {
            return Err(PipelineError::Embedding {
                path: first_path,
                message: format!(
                    "Output batch dimension {:?} does not match input batch {}",
                    shape, batch_size
                ),
            });
        }

        split_rows(data, batch_size).ok_or_else(|| PipelineError::Embedding {
            path: first_path,
            message: format!(
                "Output of {} values cannot be split into {} rows",
                data.len(),
                batch_size
            ),
        })
    }
}

/// Stack `[1, a, b, c]` tensors into a flat `[N, a, b, c]` buffer.
fn stack_batch(tensors: &[Array4<f32>]) -> (Vec<i64>, Vec<f32>) {
    let shape_0 = tensors[0].shape();
    let mut flat_data = Vec::with_capacity(tensors.len() * tensors[0].len());
    for t in tensors {
        flat_data.extend(t.iter().copied());
    }
    let batch_shape = vec![
        tensors.len() as i64,
        shape_0[1] as i64,
        shape_0[2] as i64,
        shape_0[3] as i64,
    ];
    (batch_shape, flat_data)
}

/// Flatten a `[N, ...]` output into N equal rows.
fn split_rows(data: &[f32], rows: usize) -> Option<Vec<Vec<f32>>> {
    if rows == 0 || data.is_empty() || data.len() % rows != 0 {
        return None;
    }
    let dim = data.len() / rows;
    Some(data.chunks(dim).map(|c| c.to_vec()).collect())
}
