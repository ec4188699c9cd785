//! Core types for background removal operations

use crate::error::Result;
use crate::services::dataurl;
use image::RgbaImage;

/// Source of an image handed to the removal pipeline
///
/// Ephemeral and caller-owned. When given raw bytes, the client materializes a
/// temporary locator for the worker and is solely responsible for releasing it
/// once the request settles.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Raw encoded image bytes (JPEG, PNG, ...)
    Bytes(Vec<u8>),
    /// A resource locator: a filesystem path or a `data:` URL
    Locator(String),
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<String> for ImageSource {
    fn from(locator: String) -> Self {
        Self::Locator(locator)
    }
}

impl From<&str> for ImageSource {
    fn from(locator: &str) -> Self {
        Self::Locator(locator.to_string())
    }
}

/// Per-pixel foreground-opacity map produced by the segmentation model
///
/// Single channel, one byte per pixel of the source image, row-major,
/// top-to-bottom. 0 = fully background (transparent), 255 = fully foreground.
#[derive(Debug, Clone)]
pub struct SegmentationMask {
    /// Mask values, one byte per pixel
    pub data: Vec<u8>,
    /// Mask dimensions (width, height), matching the source image
    pub dimensions: (u32, u32),
}

impl SegmentationMask {
    /// Create a new segmentation mask
    #[must_use]
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Self {
        Self { data, dimensions }
    }

    /// Number of pixels this mask covers
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the mask is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Fraction of pixels classified as foreground (mask value >= 128)
    #[must_use]
    pub fn foreground_ratio(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let foreground = self.data.iter().filter(|&&v| v >= 128).count();
        foreground as f64 / self.data.len() as f64
    }
}

/// Result of a background removal request
///
/// Holds the composited RGBA image (original color, mask-derived alpha) prior
/// to encoding. The host-facing artifact is the PNG data URL.
#[derive(Debug, Clone)]
pub struct RemovalResult {
    /// Composited image with the mask applied to the alpha channel
    pub image: RgbaImage,
    /// Image dimensions (width, height)
    pub dimensions: (u32, u32),
}

impl RemovalResult {
    /// Create a new removal result
    #[must_use]
    pub fn new(image: RgbaImage) -> Self {
        let dimensions = image.dimensions();
        Self { image, dimensions }
    }

    /// Encode the composited image as lossless 8-bit RGBA PNG bytes
    ///
    /// # Errors
    ///
    /// Returns an error if PNG encoding fails.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        self.image.write_to(&mut cursor, image::ImageFormat::Png)?;
        Ok(buffer)
    }

    /// Encode the composited image as a `data:image/png;base64,...` URL
    ///
    /// # Errors
    ///
    /// Returns an error if PNG encoding fails.
    pub fn to_data_url(&self) -> Result<String> {
        let png = self.to_png_bytes()?;
        Ok(dataurl::encode(&png, "image/png"))
    }
}

/// Lifecycle state of a background removal worker
///
/// The model loads at most once per worker; a load failure is terminal for
/// that worker instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Worker constructed, model load not yet requested
    Uninitialized,
    /// Model load in progress
    Loading,
    /// Model loaded, removal requests accepted
    Ready,
    /// Model load failed; all subsequent requests fail immediately
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_segmentation_mask_creation() {
        let mask = SegmentationMask::new(vec![0, 128, 255, 64], (2, 2));
        assert_eq!(mask.len(), 4);
        assert!(!mask.is_empty());
        assert_eq!(mask.dimensions, (2, 2));
    }

    #[test]
    fn test_foreground_ratio() {
        let mask = SegmentationMask::new(vec![0, 128, 255, 64], (2, 2));
        assert!((mask.foreground_ratio() - 0.5).abs() < f64::EPSILON);

        let empty = SegmentationMask::new(vec![], (0, 0));
        assert!(empty.foreground_ratio().abs() < f64::EPSILON);
    }

    #[test]
    fn test_result_png_round_trip() {
        let image = RgbaImage::from_pixel(4, 3, Rgba([200, 10, 30, 128]));
        let result = RemovalResult::new(image.clone());
        assert_eq!(result.dimensions, (4, 3));

        let png = result.to_png_bytes().unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.as_raw(), image.as_raw());
    }

    #[test]
    fn test_result_data_url_prefix() {
        let image = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]));
        let url = RemovalResult::new(image).to_data_url().unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_image_source_conversions() {
        let from_bytes: ImageSource = vec![1u8, 2, 3].into();
        assert!(matches!(from_bytes, ImageSource::Bytes(_)));

        let from_str: ImageSource = "photo.jpg".into();
        assert!(matches!(from_str, ImageSource::Locator(_)));
    }
}
