//! Embedding model variants and input tensor conventions.

use serde::{Deserialize, Serialize};

/// The network family used to produce embeddings.
///
/// Every variant is an encoder exported to ONNX ahead of time; the crate only
/// runs inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Encoder half of a convolutional autoencoder
    #[default]
    Autoencoder,
    /// ImageNet-pretrained ResNet50 without the classification head
    Pretrained,
    /// Encoder trained with a triplet loss
    Triplets,
}

impl ModelKind {
    /// All variants, in display order.
    pub const ALL: [ModelKind; 3] = [Self::Autoencoder, Self::Pretrained, Self::Triplets];

    /// Config / CLI name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Autoencoder => "autoencoder",
            Self::Pretrained => "pretrained",
            Self::Triplets => "triplets",
        }
    }

    /// Parse a model name, accepting the historical aliases.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "autoencoder" | "convae" | "conv_ae" => Some(Self::Autoencoder),
            "pretrained" | "resnet50" => Some(Self::Pretrained),
            "triplets" | "triplets_loss" | "triplet" => Some(Self::Triplets),
            _ => None,
        }
    }

    /// ONNX file name inside the model directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Autoencoder => "conv_ae_encoder.onnx",
            Self::Pretrained => "resnet50_notop.onnx",
            Self::Triplets => "triplets_encoder.onnx",
        }
    }

    /// Sub-directory of the output root used for this model's artifacts.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Autoencoder => "conv_ae",
            Self::Pretrained => "pretrained",
            Self::Triplets => "triplets_loss",
        }
    }

    /// File prefix for retrieval plots.
    pub fn plot_prefix(&self) -> &'static str {
        match self {
            Self::Autoencoder => "ConvAE",
            Self::Pretrained => "Pretr",
            Self::Triplets => "Triplets",
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Memory layout of the input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// `[batch, height, width, channels]` (Keras exports)
    #[default]
    Nhwc,
    /// `[batch, channels, height, width]`
    Nchw,
}

/// Pixel normalization applied before inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    /// `pixel / 255` in [0, 1]
    #[default]
    Unit,
    /// `(pixel / 255 - 0.5) / 0.5` in [-1, 1]
    Symmetric,
    /// ImageNet per-channel mean/std
    Imagenet,
}
