//! Image preprocessing for encoder inference.
//!
//! Resizes to a square input, selects RGB or luma channels, normalizes pixel
//! values and lays the tensor out as NHWC or NCHW.

use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array4;

use crate::config::EmbeddingConfig;

use super::model::{Normalization, TensorLayout};

/// ImageNet normalization mean (per RGB channel).
const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet normalization std (per RGB channel).
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Single-channel stand-ins for the ImageNet statistics.
const IMAGENET_LUMA_MEAN: f32 = 0.449;
const IMAGENET_LUMA_STD: f32 = 0.226;

/// Everything preprocessing needs to know about the model input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreprocessOptions {
    pub image_size: u32,
    pub channels: u32,
    pub layout: TensorLayout,
    pub normalization: Normalization,
}

impl PreprocessOptions {
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self {
            image_size: config.image_size,
            channels: config.channels,
            layout: config.layout,
            normalization: config.normalization,
        }
    }
}

/// Resize an image to the model input size and return its raw interleaved
/// pixels (RGB, or luma when `channels == 1`).
///
/// Grey sources are replicated to three channels and alpha is dropped by the
/// RGB conversion.
pub fn resize_pixels(image: &DynamicImage, image_size: u32, channels: u32) -> Vec<u8> {
    let resized = image.resize_exact(image_size, image_size, FilterType::Triangle);
    if channels == 1 {
        resized.to_luma8().into_raw()
    } else {
        resized.to_rgb8().into_raw()
    }
}

/// Preprocess an image into a `[1, ...]` tensor for ONNX Runtime.
pub fn preprocess(image: &DynamicImage, options: &PreprocessOptions) -> Array4<f32> {
    let raw = resize_pixels(image, options.image_size, options.channels);
    let size = options.image_size as usize;
    let channels = options.channels as usize;
    let norm = options.normalization;

    // Interleaved source offset: (y * size + x) * channels + c
    match options.layout {
        TensorLayout::Nhwc => Array4::from_shape_fn((1, size, size, channels), |(_, y, x, c)| {
            normalize(raw[(y * size + x) * channels + c], c, channels, norm)
        }),
        TensorLayout::Nchw => Array4::from_shape_fn((1, channels, size, size), |(_, c, y, x)| {
            normalize(raw[(y * size + x) * channels + c], c, channels, norm)
        }),
    }
}

fn normalize(value: u8, channel: usize, channels: usize, norm: Normalization) -> f32 {
    let v = value as f32 / 255.0;
    match norm {
        Normalization::Unit => v,
        Normalization::Symmetric => (v - 0.5) / 0.5,
        Normalization::Imagenet if channels == 1 => (v - IMAGENET_LUMA_MEAN) / IMAGENET_LUMA_STD,
        Normalization::Imagenet => (v - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};

    fn options(layout: TensorLayout, normalization: Normalization) -> PreprocessOptions {
        PreprocessOptions {
            image_size: 8,
            channels: 3,
            layout,
            normalization,
        }
    }

    #[test]
    fn test_preprocess_shape_nhwc() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(40, 30));
        let tensor = preprocess(&img, &options(TensorLayout::Nhwc, Normalization::Unit));
        assert_eq!(tensor.shape(), &[1, 8, 8, 3]);
    }

    #[test]
    fn test_preprocess_shape_nchw() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(40, 30));
        let tensor = preprocess(&img, &options(TensorLayout::Nchw, Normalization::Unit));
        assert_eq!(tensor.shape(), &[1, 3, 8, 8]);
    }

    #[test]
    fn test_unit_normalization_divides_by_255() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([255, 0, 51])));
        let tensor = preprocess(&img, &options(TensorLayout::Nhwc, Normalization::Unit));
        assert!((tensor[[0, 3, 3, 0]] - 1.0).abs() < 1e-6);
        assert!(tensor[[0, 3, 3, 1]].abs() < 1e-6);
        assert!((tensor[[0, 3, 3, 2]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_nchw_places_channels_first() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([255, 0, 0])));
        let tensor = preprocess(&img, &options(TensorLayout::Nchw, Normalization::Unit));
        assert!((tensor[[0, 0, 5, 5]] - 1.0).abs() < 1e-6);
        assert!(tensor[[0, 1, 5, 5]].abs() < 1e-6);
    }

    #[test]
    fn test_symmetric_normalization_range() {
        let white = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([255, 255, 255])));
        let tensor = preprocess(&white, &options(TensorLayout::Nhwc, Normalization::Symmetric));
        let max_val = tensor.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        assert!((max_val - 1.0).abs() < 0.01);

        let black = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([0, 0, 0])));
        let tensor = preprocess(&black, &options(TensorLayout::Nhwc, Normalization::Symmetric));
        let min_val = tensor.iter().cloned().fold(f32::INFINITY, f32::min);
        assert!((min_val + 1.0).abs() < 0.01);
    }

    #[test]
    fn test_grayscale_is_replicated_to_rgb() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, Luma([102])));
        let tensor = preprocess(&img, &options(TensorLayout::Nhwc, Normalization::Unit));
        assert_eq!(tensor.shape(), &[1, 8, 8, 3]);
        for c in 0..3 {
            assert!((tensor[[0, 2, 2, c]] - 0.4).abs() < 1e-6);
        }
    }

    #[test]
    fn test_alpha_channel_is_dropped() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 0])));
        let raw = resize_pixels(&img, 4, 3);
        assert_eq!(raw.len(), 4 * 4 * 3);
        assert_eq!(&raw[..3], &[10, 20, 30]);
    }

    #[test]
    fn test_single_channel_input() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([255, 255, 255])));
        let opts = PreprocessOptions {
            channels: 1,
            ..options(TensorLayout::Nhwc, Normalization::Unit)
        };
        let tensor = preprocess(&img, &opts);
        assert_eq!(tensor.shape(), &[1, 8, 8, 1]);
        assert!((tensor[[0, 0, 0, 0]] - 1.0).abs() < 1e-6);
    }
}
