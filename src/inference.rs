//! Inference backend abstraction and the segmentation pipeline
//!
//! `InferenceBackend` is the seam between the pipeline and the model runtime.
//! `Segmenter` owns a boxed backend and turns a decoded image into a
//! per-pixel mask: preprocess to tensor, infer, map the model's single-channel
//! output back onto the original pixel grid.

use crate::{
    config::RemovalConfig,
    error::{RemovalError, Result},
    types::SegmentationMask,
    utils::ImagePreprocessor,
};
use image::DynamicImage;
use instant::Instant;
use ndarray::Array4;
use tracing::debug;

/// Coordinate transformation parameters for tensor-to-mask conversion
#[derive(Debug, Clone)]
struct CoordinateTransformation {
    /// Scale factor used during preprocessing
    scale: f32,
    /// X offset for centering
    offset_x: u32,
    /// Y offset for centering
    offset_y: u32,
    /// Mask width in tensor coordinates
    mask_width: u32,
    /// Mask height in tensor coordinates
    mask_height: u32,
}

/// Trait for inference backends (the model runtime adapter)
///
/// A backend wraps a pretrained segmentation model as an opaque function from
/// a normalized NCHW tensor to a single-channel probability tensor. Backends
/// run inside the worker thread and never cross it, so `Send` suffices.
pub trait InferenceBackend: Send {
    /// Load the model and prepare the runtime
    ///
    /// Called at most once per worker lifetime. `on_progress` receives load
    /// percentages in 0..=100 for streaming back to the host.
    ///
    /// # Errors
    /// - Model file missing or unreadable
    /// - Unsupported hardware backend
    /// - Runtime session creation failures
    fn initialize(
        &mut self,
        config: &RemovalConfig,
        on_progress: &mut dyn FnMut(u32),
    ) -> Result<()>;

    /// Run inference on the input tensor
    ///
    /// Output is `1x1xHxW` with values in `[0, 1]` (foreground probability).
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Model inference failures
    /// - Tensor conversion errors
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Check if the backend has loaded its model
    fn is_initialized(&self) -> bool;
}

/// Segmentation pipeline around a single inference backend
///
/// Owned by the worker; the loaded model is shared read-only across all
/// requests within the worker's lifetime.
pub struct Segmenter {
    backend: Box<dyn InferenceBackend>,
    config: RemovalConfig,
}

impl Segmenter {
    /// Create a segmenter around an uninitialized backend
    #[must_use]
    pub fn new(backend: Box<dyn InferenceBackend>, config: RemovalConfig) -> Self {
        Self { backend, config }
    }

    /// Load the model, streaming load percentages to `on_progress`
    ///
    /// Idempotent: once loaded, returns immediately without reloading.
    ///
    /// # Errors
    ///
    /// Propagates backend initialization failures as `RemovalError::ModelLoad`.
    pub fn load(&mut self, on_progress: &mut dyn FnMut(u32)) -> Result<()> {
        if self.backend.is_initialized() {
            return Ok(());
        }
        let load_start = Instant::now();
        self.backend
            .initialize(&self.config, on_progress)
            .map_err(|e| match e {
                err @ RemovalError::ModelLoad(_) => err,
                other => RemovalError::model_load(other.to_string()),
            })?;
        debug!(
            elapsed_ms = load_start.elapsed().as_millis() as u64,
            "Segmentation model loaded"
        );
        Ok(())
    }

    /// Whether the model has been loaded
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.backend.is_initialized()
    }

    /// Produce a segmentation mask aligned to the image's pixel grid
    ///
    /// The mask has exactly one byte per input pixel, row-major, regardless of
    /// the model's internal resolution.
    ///
    /// # Errors
    ///
    /// Returns `RemovalError::Inference` for preprocessing or inference
    /// failures; the segmenter remains usable afterwards.
    pub fn segment(&mut self, image: &DynamicImage) -> Result<SegmentationMask> {
        if !self.backend.is_initialized() {
            return Err(RemovalError::inference("Model not loaded"));
        }

        let original_dimensions = (image.width(), image.height());

        let preprocess_start = Instant::now();
        let input_tensor = ImagePreprocessor::preprocess_for_inference(image, &self.config)?;
        let preprocess_ms = preprocess_start.elapsed().as_millis() as u64;

        let inference_start = Instant::now();
        let output_tensor = self.backend.infer(&input_tensor)?;
        let inference_ms = inference_start.elapsed().as_millis() as u64;

        debug!(
            width = original_dimensions.0,
            height = original_dimensions.1,
            preprocess_ms,
            inference_ms,
            "Segmentation complete"
        );

        Self::tensor_to_mask(&output_tensor, original_dimensions)
    }

    /// Convert the output tensor to a mask with inverse letterbox mapping
    fn tensor_to_mask(
        tensor: &Array4<f32>,
        original_dimensions: (u32, u32),
    ) -> Result<SegmentationMask> {
        Self::validate_tensor_shape(tensor)?;
        let transformation = Self::inverse_transformation(tensor, original_dimensions);
        let mask_data = Self::extract_mask_values(tensor, original_dimensions, &transformation);
        Ok(SegmentationMask::new(mask_data, original_dimensions))
    }

    /// Validate the model produced a single-channel batch-of-one tensor
    fn validate_tensor_shape(tensor: &Array4<f32>) -> Result<()> {
        let shape = tensor.shape();
        if shape.first().copied().unwrap_or(0) != 1 || shape.get(1).copied().unwrap_or(0) != 1 {
            return Err(RemovalError::inference(format!(
                "Unexpected output tensor shape {shape:?}: expected [1, 1, H, W]"
            )));
        }
        Ok(())
    }

    /// Reproduce the preprocessing math to map original pixels into tensor space
    fn inverse_transformation(
        tensor: &Array4<f32>,
        original_dimensions: (u32, u32),
    ) -> CoordinateTransformation {
        let shape = tensor.shape();
        let mask_height = shape.get(2).copied().unwrap_or(0) as u32;
        let mask_width = shape.get(3).copied().unwrap_or(0) as u32;
        let (orig_width, orig_height) = original_dimensions;

        // Assumes a square tensor, which holds for the supported models.
        let (scale, scaled_width, scaled_height) =
            ImagePreprocessor::letterbox_scale(mask_width, orig_width, orig_height);

        let offset_x = (mask_width - scaled_width) / 2;
        let offset_y = (mask_height.max(scaled_height) - scaled_height) / 2;

        CoordinateTransformation {
            scale,
            offset_x,
            offset_y,
            mask_width,
            mask_height,
        }
    }

    /// Sample the tensor at every original pixel position
    fn extract_mask_values(
        tensor: &Array4<f32>,
        original_dimensions: (u32, u32),
        transformation: &CoordinateTransformation,
    ) -> Vec<u8> {
        let (orig_width, orig_height) = original_dimensions;
        let mut mask_data = Vec::with_capacity((orig_width as usize) * (orig_height as usize));

        for y in 0..orig_height {
            for x in 0..orig_width {
                let value = Self::tensor_value_at(tensor, x, y, transformation);
                mask_data.push((value.clamp(0.0, 1.0) * 255.0) as u8);
            }
        }

        mask_data
    }

    /// Get the tensor value for an original-image coordinate
    fn tensor_value_at(
        tensor: &Array4<f32>,
        x: u32,
        y: u32,
        transformation: &CoordinateTransformation,
    ) -> f32 {
        let scaled_x = (x as f32 * transformation.scale).round() as u32;
        let scaled_y = (y as f32 * transformation.scale).round() as u32;

        let tensor_x = scaled_x + transformation.offset_x;
        let tensor_y = scaled_y + transformation.offset_y;

        if tensor_x < transformation.mask_width && tensor_y < transformation.mask_height {
            tensor
                .get([0, 0, tensor_y as usize, tensor_x as usize])
                .copied()
                .unwrap_or(0.0)
        } else {
            // Outside the model's prediction area (letterbox padding).
            0.0
        }
    }
}
