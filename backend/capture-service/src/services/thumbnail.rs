//! Thumbnail codec - re-encodes a captured image for inline previews
//!
//! Decodes a JPEG or PNG file and re-encodes it at the original pixel size:
//! JPEG at a low quality factor, PNG at the best compression level. The
//! result is returned base64-encoded for embedding in the image record.
//!
//! Uses `spawn_blocking` for the CPU-bound work so the async runtime is not blocked.

use crate::error::CodecError;
use base64::Engine as _;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::io::Reader as ImageReader;
use image::{DynamicImage, GenericImageView, ImageEncoder, ImageFormat, ImageOutputFormat};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration for thumbnail encoding
#[derive(Clone, Debug)]
pub struct ThumbnailConfig {
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self { jpeg_quality: 40 }
    }
}

/// Thumbnail codec
#[derive(Clone, Debug, Default)]
pub struct ThumbnailCodec {
    config: ThumbnailConfig,
}

impl ThumbnailCodec {
    pub fn new(config: ThumbnailConfig) -> Self {
        Self { config }
    }

    /// Encode the image at `path` as a base64 thumbnail (blocking version)
    ///
    /// **Note:** This method performs file I/O and CPU-intensive work and should
    /// not be called directly from async code. Use `encode_async` instead.
    pub fn encode(&self, path: &Path) -> Result<String, CodecError> {
        let reader = ImageReader::open(path)
            .and_then(|r| r.with_guessed_format())
            .map_err(|source| CodecError::OpenFailed {
                path: path.to_path_buf(),
                source,
            })?;

        let format = reader.format();
        let img = reader.decode().map_err(|e| CodecError::DecodeFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let (width, height) = img.dimensions();
        debug!(path = %path.display(), ?format, width, height, "Encoding thumbnail");

        let data = match format {
            Some(ImageFormat::Jpeg) => self.encode_jpeg(&img),
            Some(ImageFormat::Png) => encode_png(&img),
            other => {
                return Err(CodecError::UnsupportedFormat {
                    path: path.to_path_buf(),
                    format: other
                        .map(|f| format!("{f:?}"))
                        .unwrap_or_else(|| "unknown".to_string()),
                })
            }
        }
        .map_err(|reason| CodecError::EncodeFailed {
            path: path.to_path_buf(),
            reason,
        })?;

        debug!(path = %path.display(), size = data.len(), "Thumbnail encoded");

        Ok(base64::engine::general_purpose::STANDARD.encode(data))
    }

    /// Encode a thumbnail on the blocking thread pool
    pub async fn encode_async(&self, path: PathBuf) -> Result<String, CodecError> {
        let codec = self.clone();
        let task_path = path.clone();

        tokio::task::spawn_blocking(move || codec.encode(&task_path))
            .await
            .map_err(|e| CodecError::EncodeFailed {
                path,
                reason: format!("Thumbnail task panicked: {e}"),
            })?
    }

    fn encode_jpeg(&self, img: &DynamicImage) -> Result<Vec<u8>, String> {
        // JPEG has no alpha and no 16-bit depth
        let img = match img {
            DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => img.clone(),
            other => DynamicImage::ImageRgb8(other.to_rgb8()),
        };

        let mut buf = Vec::new();
        img.write_to(
            &mut Cursor::new(&mut buf),
            ImageOutputFormat::Jpeg(self.config.jpeg_quality),
        )
        .map_err(|e| format!("Failed to encode JPEG: {e}"))?;
        Ok(buf)
    }
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, String> {
    let mut buf = Vec::new();
    let (width, height) = img.dimensions();
    PngEncoder::new_with_quality(&mut buf, CompressionType::Best, FilterType::Adaptive)
        .write_image(img.as_bytes(), width, height, img.color())
        .map_err(|e| format!("Failed to encode PNG: {e}"))?;
    Ok(buf)
}
