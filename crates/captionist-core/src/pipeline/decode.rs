//! Image decoding with format detection, validation, and timeout support.

use image::{DynamicImage, GenericImageView, ImageFormat};
use std::path::Path;
use std::time::Duration;
use tokio::time::timeout;

use crate::config::LimitsConfig;
use crate::error::PipelineError;

/// Image decoder with configurable limits and timeout.
pub struct ImageDecoder {
    limits: LimitsConfig,
}

/// Result of decoding an image.
pub struct DecodedImage {
    /// Decoded pixels, converted to 8-bit RGB
    pub image: DynamicImage,
    /// Detected image format
    pub format: ImageFormat,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Original encoded bytes (sent as-is to vision LLMs)
    pub bytes: Vec<u8>,
}

impl DecodedImage {
    /// Size of the encoded image in bytes.
    pub fn file_size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

impl ImageDecoder {
    /// Create a new decoder with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Decode an image from an in-memory byte buffer with validation and timeout.
    ///
    /// Decoding runs on the blocking pool. `path` is only used for format
    /// fallback and error messages (uploads pass their original file name).
    pub async fn decode_from_bytes(
        &self,
        bytes: Vec<u8>,
        path: &Path,
    ) -> Result<DecodedImage, PipelineError> {
        let path_owned = path.to_path_buf();
        let timeout_duration = Duration::from_millis(self.limits.decode_timeout_ms);

        let decode_result = timeout(timeout_duration, async {
            tokio::task::spawn_blocking(move || Self::decode_bytes_sync(bytes, &path_owned)).await
        })
        .await;

        match decode_result {
            Ok(Ok(Ok(decoded))) => {
                if decoded.width > self.limits.max_image_dimension
                    || decoded.height > self.limits.max_image_dimension
                {
                    return Err(PipelineError::ImageTooLarge {
                        path: path.to_path_buf(),
                        width: decoded.width,
                        height: decoded.height,
                        max_dim: self.limits.max_image_dimension,
                    });
                }
                Ok(decoded)
            }
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(e)) => Err(PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Task join error: {}", e),
            }),
            Err(_) => Err(PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!(
                    "Decoding did not finish within {}ms",
                    self.limits.decode_timeout_ms
                ),
            }),
        }
    }

    /// Synchronous decode from bytes (runs in spawn_blocking).
    fn decode_bytes_sync(bytes: Vec<u8>, path: &Path) -> Result<DecodedImage, PipelineError> {
        use std::io::Cursor;

        let reader = image::ImageReader::new(Cursor::new(bytes.as_slice()))
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

        // Models expect 3-channel RGB regardless of the source (RGBA, grayscale, 16-bit).
        let image = DynamicImage::ImageRgb8(image.to_rgb8());
        let (width, height) = image.dimensions();

        Ok(DecodedImage {
            image,
            format,
            width,
            height,
            bytes,
        })
    }
}

/// Convert an ImageFormat to a string representation.
pub fn format_to_string(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "jpeg".to_string(),
        ImageFormat::Png => "png".to_string(),
        ImageFormat::WebP => "webp".to_string(),
        ImageFormat::Gif => "gif".to_string(),
        ImageFormat::Tiff => "tiff".to_string(),
        ImageFormat::Bmp => "bmp".to_string(),
        _ => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, LumaA, Rgba, RgbaImage};

    fn png_bytes(image: DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_format_to_string() {
        assert_eq!(format_to_string(ImageFormat::Jpeg), "jpeg");
        assert_eq!(format_to_string(ImageFormat::Png), "png");
        assert_eq!(format_to_string(ImageFormat::WebP), "webp");
    }

    #[test]
    fn test_rgba_is_normalized_to_rgb() {
        let rgba = RgbaImage::from_pixel(8, 6, Rgba([10, 20, 30, 128]));
        let bytes = png_bytes(DynamicImage::ImageRgba8(rgba));
        let decoded = ImageDecoder::decode_bytes_sync(bytes, Path::new("a.png")).unwrap();
        assert!(matches!(decoded.image, DynamicImage::ImageRgb8(_)));
        assert_eq!((decoded.width, decoded.height), (8, 6));
        assert_eq!(decoded.format, ImageFormat::Png);
    }

    #[test]
    fn test_grayscale_alpha_is_normalized_to_rgb() {
        let gray: ImageBuffer<LumaA<u8>, Vec<u8>> =
            ImageBuffer::from_pixel(4, 4, LumaA([200, 255]));
        let bytes = png_bytes(DynamicImage::ImageLumaA8(gray));
        let decoded = ImageDecoder::decode_bytes_sync(bytes, Path::new("g.png")).unwrap();
        assert!(matches!(decoded.image, DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn test_format_detected_by_content() {
        // PNG bytes behind a .jpg name are still detected as PNG.
        let bytes = png_bytes(DynamicImage::new_rgb8(4, 4));
        let decoded = ImageDecoder::decode_bytes_sync(bytes, Path::new("misnamed.jpg")).unwrap();
        assert_eq!(decoded.format, ImageFormat::Png);
    }

    #[test]
    fn test_truncated_png_is_decode_error() {
        let mut bytes = png_bytes(DynamicImage::new_rgb8(32, 32));
        bytes.truncate(40);
        let err = ImageDecoder::decode_bytes_sync(bytes, Path::new("broken.png"))
            .err()
            .unwrap();
        assert!(err.is_input_error());
    }

    #[tokio::test]
    async fn test_decode_rejects_oversized_dimensions() {
        let limits = LimitsConfig {
            max_image_dimension: 16,
            ..LimitsConfig::default()
        };
        let bytes = png_bytes(DynamicImage::new_rgb8(32, 8));
        let err = ImageDecoder::new(limits)
            .decode_from_bytes(bytes, Path::new("wide.png"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::ImageTooLarge { width: 32, .. }));
    }
}
