//! Image preprocessing for model inference
//!
//! Segmentation models expect a fixed square input. Images are resized with
//! their aspect ratio preserved, centered on a padded canvas, and normalized
//! into an NCHW f32 tensor. The inverse of this transformation is applied
//! when mapping the model's output back onto the original pixel grid (see
//! `Segmenter::tensor_to_mask`).

use crate::{
    config::RemovalConfig,
    error::{RemovalError, Result},
};
use image::{DynamicImage, ImageBuffer, RgbImage};
use ndarray::Array4;

/// Padding color used for the letterbox canvas (white, matching the training
/// setup of the supported models)
const PADDING_COLOR: [u8; 3] = [255, 255, 255];

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Preprocess an image into an inference-ready NCHW tensor
    ///
    /// Handles RGB conversion, aspect-ratio-preserving resize, center padding
    /// to the model's square input size, and mean/std normalization.
    ///
    /// # Errors
    ///
    /// Returns `RemovalError::Inference` if the computed dimensions fall out
    /// of range (degenerate input sizes).
    pub fn preprocess_for_inference(
        image: &DynamicImage,
        config: &RemovalConfig,
    ) -> Result<Array4<f32>> {
        let target_size = config.model_input_size;

        let rgb_image = image.to_rgb8();
        let (orig_width, orig_height) = rgb_image.dimensions();
        if orig_width == 0 || orig_height == 0 {
            return Err(RemovalError::inference("Cannot preprocess an empty image"));
        }

        let (_scale, new_width, new_height) =
            Self::letterbox_scale(target_size, orig_width, orig_height);

        let resized = image::imageops::resize(
            &rgb_image,
            new_width,
            new_height,
            image::imageops::FilterType::Triangle,
        );

        let mut canvas = ImageBuffer::from_pixel(
            target_size,
            target_size,
            image::Rgb(PADDING_COLOR),
        );

        let offset_x = (target_size - new_width) / 2;
        let offset_y = (target_size - new_height) / 2;
        for (x, y, pixel) in resized.enumerate_pixels() {
            let canvas_x = x + offset_x;
            let canvas_y = y + offset_y;
            if canvas_x < target_size && canvas_y < target_size {
                canvas.put_pixel(canvas_x, canvas_y, *pixel);
            }
        }

        Ok(Self::canvas_to_tensor(&canvas, config))
    }

    /// Compute the letterbox scale and scaled dimensions for a target square
    ///
    /// The same math is reproduced by the mask postprocessing to invert the
    /// transformation, so both sides must stay in sync.
    #[must_use]
    pub fn letterbox_scale(target_size: u32, orig_width: u32, orig_height: u32) -> (f32, u32, u32) {
        let target = target_size as f32;
        let scale = target.min((target / orig_width as f32).min(target / orig_height as f32));
        let new_width = (orig_width as f32 * scale).round() as u32;
        let new_height = (orig_height as f32 * scale).round() as u32;
        (scale, new_width.max(1), new_height.max(1))
    }

    /// Convert the padded canvas to a normalized NCHW tensor
    fn canvas_to_tensor(canvas: &RgbImage, config: &RemovalConfig) -> Array4<f32> {
        let size = config.model_input_size as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

        #[allow(clippy::indexing_slicing)]
        // Tensor dimensions are pre-allocated to match the canvas size.
        for (y, row) in canvas.rows().enumerate() {
            for (x, pixel) in row.enumerate() {
                for channel in 0..3 {
                    tensor[[0, channel, y, x]] = (f32::from(pixel[channel]) / 255.0
                        - config.normalization_mean[channel])
                        / config.normalization_std[channel];
                }
            }
        }

        tensor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn test_config() -> RemovalConfig {
        RemovalConfig::builder()
            .model_input_size(64)
            .build()
            .unwrap()
    }

    fn red_image(width: u32, height: u32) -> DynamicImage {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_pixel(width, height, Rgb([255, 0, 0]));
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_tensor_shape_matches_input_size() {
        let tensor =
            ImagePreprocessor::preprocess_for_inference(&red_image(100, 50), &test_config())
                .unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 64, 64]);
    }

    #[test]
    fn test_letterbox_scale_wide_image() {
        let (scale, w, h) = ImagePreprocessor::letterbox_scale(64, 128, 32);
        assert!((scale - 0.5).abs() < 1e-6);
        assert_eq!((w, h), (64, 16));
    }

    #[test]
    fn test_letterbox_scale_never_upscales_past_target() {
        let (_, w, h) = ImagePreprocessor::letterbox_scale(64, 10, 10);
        assert!(w <= 64 && h <= 64);
    }

    #[test]
    fn test_normalization_applied() {
        let config = test_config();
        let tensor =
            ImagePreprocessor::preprocess_for_inference(&red_image(64, 64), &config).unwrap();

        // Full-size input, no padding: every pixel is pure red.
        let expected_r = (1.0 - config.normalization_mean[0]) / config.normalization_std[0];
        let expected_g = (0.0 - config.normalization_mean[1]) / config.normalization_std[1];
        assert!((tensor[[0, 0, 32, 32]] - expected_r).abs() < 1e-5);
        assert!((tensor[[0, 1, 32, 32]] - expected_g).abs() < 1e-5);
    }

    #[test]
    fn test_empty_image_rejected() {
        let img = DynamicImage::new_rgb8(0, 0);
        assert!(ImagePreprocessor::preprocess_for_inference(&img, &test_config()).is_err());
    }
}
