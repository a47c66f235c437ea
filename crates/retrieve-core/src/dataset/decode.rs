//! Image decoding with format detection, size limits and timeout.

use image::{DynamicImage, GenericImageView, ImageFormat};
use std::path::Path;
use std::time::Duration;
use tokio::time::timeout;

use crate::config::LimitsConfig;
use crate::error::PipelineError;

/// Image decoder with configurable limits and timeout.
#[derive(Clone)]
pub struct ImageDecoder {
    limits: LimitsConfig,
}

/// Result of decoding an image.
pub struct DecodedImage {
    pub image: DynamicImage,
    /// Format detected from the file content
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub file_size: u64,
}

impl ImageDecoder {
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Read and decode the image at `path`.
    pub async fn decode(&self, path: &Path) -> Result<DecodedImage, PipelineError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PipelineError::FileNotFound(path.to_path_buf())
            } else {
                PipelineError::Decode {
                    path: path.to_path_buf(),
                    message: format!("Cannot read file: {}", e),
                }
            }
        })?;
        self.decode_from_bytes(bytes, path).await
    }

    /// Decode an in-memory buffer on the blocking pool, bounded by
    /// `decode_timeout_ms`.
    pub async fn decode_from_bytes(
        &self,
        bytes: Vec<u8>,
        path: &Path,
    ) -> Result<DecodedImage, PipelineError> {
        let path_owned = path.to_path_buf();
        let timeout_duration = Duration::from_millis(self.limits.decode_timeout_ms);

        let decode_result = timeout(
            timeout_duration,
            tokio::task::spawn_blocking(move || Self::decode_bytes_sync(bytes, &path_owned)),
        )
        .await;

        match decode_result {
            Ok(Ok(Ok(decoded))) => {
                let max_dim = self.limits.max_image_dimension;
                if decoded.width > max_dim || decoded.height > max_dim {
                    return Err(PipelineError::ImageTooLarge {
                        path: path.to_path_buf(),
                        width: decoded.width,
                        height: decoded.height,
                        max_dim,
                    });
                }
                Ok(decoded)
            }
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(e)) => Err(PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Task join error: {}", e),
            }),
            Err(_) => Err(PipelineError::Timeout {
                path: path.to_path_buf(),
                stage: "decode".to_string(),
                timeout_ms: self.limits.decode_timeout_ms,
            }),
        }
    }

    fn decode_bytes_sync(bytes: Vec<u8>, path: &Path) -> Result<DecodedImage, PipelineError> {
        use std::io::Cursor;

        let file_size = bytes.len() as u64;
        let reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Cannot detect image format: {}", e),
            })?;
        let format = match reader.format() {
            Some(f) => f,
            None => ImageFormat::from_path(path).map_err(|_| PipelineError::UnsupportedFormat {
                path: path.to_path_buf(),
                format: path
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("unknown")
                    .to_string(),
            })?,
        };
        let image = reader.decode().map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let (width, height) = image.dimensions();
        Ok(DecodedImage {
            image,
            format,
            width,
            height,
            file_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn write_png(path: &Path, w: u32, h: u32) {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(w, h, Rgb([10, 20, 30]));
        img.save_with_format(path, ImageFormat::Png).unwrap();
    }

    #[tokio::test]
    async fn test_decode_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        write_png(&path, 8, 6);

        let decoded = ImageDecoder::new(LimitsConfig::default())
            .decode(&path)
            .await
            .unwrap();
        assert_eq!((decoded.width, decoded.height), (8, 6));
        assert_eq!(decoded.format, ImageFormat::Png);
        assert!(decoded.file_size > 0);
    }

    #[tokio::test]
    async fn test_format_detected_by_content() {
        let dir = tempfile::tempdir().unwrap();
        let misnamed = dir.path().join("misnamed.jpg");
        write_png(&misnamed, 4, 4);

        let decoded = ImageDecoder::new(LimitsConfig::default())
            .decode(&misnamed)
            .await
            .unwrap();
        assert_eq!(decoded.format, ImageFormat::Png);
    }

    #[tokio::test]
    async fn test_decode_rejects_oversized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.png");
        write_png(&path, 32, 8);

        let limits = LimitsConfig {
            max_image_dimension: 16,
            ..LimitsConfig::default()
        };
        let err = ImageDecoder::new(limits).decode(&path).await.err().unwrap();
        assert!(matches!(err, PipelineError::ImageTooLarge { width: 32, .. }));
    }

    #[tokio::test]
    async fn test_decode_missing_and_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let decoder = ImageDecoder::new(LimitsConfig::default());

        let missing = decoder.decode(&dir.path().join("nope.jpg")).await;
        assert!(matches!(missing, Err(PipelineError::FileNotFound(_))));

        let garbage = dir.path().join("garbage.png");
        std::fs::write(&garbage, b"\x89PNG not really").unwrap();
        assert!(decoder.decode(&garbage).await.is_err());
    }
}
