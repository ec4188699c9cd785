//! ONNX Runtime backend implementation
//!
//! Wraps an ONNX Runtime session around the configured segmentation model,
//! with execution-provider selection (CPU, CUDA, CoreML) and thread tuning.
//! Inference inside the session may use GPU or multi-threaded CPU kernels;
//! that is opaque to the rest of the pipeline.

use crate::config::{ExecutionProvider, RemovalConfig};
use crate::error::{RemovalError, Result};
use crate::inference::InferenceBackend;
use ndarray::Array4;
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use tracing::{debug, info, warn};

/// ONNX Runtime backend for segmentation models
pub struct OnnxBackend {
    session: Option<Session>,
    initialized: bool,
}

impl OnnxBackend {
    /// Create a new, unloaded ONNX backend
    #[must_use]
    pub fn new() -> Self {
        Self {
            session: None,
            initialized: false,
        }
    }

    /// Resolve intra/inter thread counts, auto-detecting when set to 0
    fn thread_counts(config: &RemovalConfig) -> (usize, usize) {
        let cores = std::thread::available_parallelism()
            .map(std::num::NonZero::get)
            .unwrap_or(8);
        let intra = if config.intra_threads > 0 {
            config.intra_threads
        } else {
            cores
        };
        let inter = if config.inter_threads > 0 {
            config.inter_threads
        } else {
            (cores / 4).max(1)
        };
        (intra, inter)
    }

    /// Build the session with the requested execution provider
    fn build_session(config: &RemovalConfig, model_data: &[u8]) -> Result<Session> {
        let mut session_builder = Session::builder()
            .map_err(|e| RemovalError::model_load(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| RemovalError::model_load(format!("Failed to set optimization level: {e}")))?;

        session_builder = match config.execution_provider {
            ExecutionProvider::Auto => {
                let mut providers = Vec::new();

                let cuda_provider = CUDAExecutionProvider::default();
                if OrtExecutionProvider::is_available(&cuda_provider).unwrap_or(false) {
                    info!("CUDA execution provider is available and will be used");
                    providers.push(cuda_provider.build());
                } else {
                    debug!("CUDA execution provider is not available");
                }

                let coreml_provider = CoreMLExecutionProvider::default();
                if OrtExecutionProvider::is_available(&coreml_provider).unwrap_or(false) {
                    info!("CoreML execution provider is available and will be used");
                    providers.push(
                        CoreMLExecutionProvider::default()
                            .with_subgraphs(true)
                            .build(),
                    );
                } else {
                    debug!("CoreML execution provider is not available");
                }

                if providers.is_empty() {
                    warn!("No hardware acceleration available, falling back to CPU");
                    session_builder
                } else {
                    session_builder
                        .with_execution_providers(providers)
                        .map_err(|e| {
                            RemovalError::model_load(format!(
                                "Failed to set auto execution providers: {e}"
                            ))
                        })?
                }
            },
            ExecutionProvider::Cpu => {
                info!("Using CPU execution provider");
                session_builder
            },
            ExecutionProvider::Cuda => {
                let cuda_provider = CUDAExecutionProvider::default();
                if OrtExecutionProvider::is_available(&cuda_provider).unwrap_or(false) {
                    info!("Using CUDA execution provider");
                    session_builder
                        .with_execution_providers([cuda_provider.build()])
                        .map_err(|e| {
                            RemovalError::model_load(format!(
                                "Failed to set CUDA execution provider: {e}"
                            ))
                        })?
                } else {
                    warn!("CUDA requested but not available, falling back to CPU");
                    session_builder
                }
            },
            ExecutionProvider::CoreMl => {
                let coreml_provider = CoreMLExecutionProvider::default();
                if OrtExecutionProvider::is_available(&coreml_provider).unwrap_or(false) {
                    info!("Using CoreML execution provider");
                    session_builder
                        .with_execution_providers([CoreMLExecutionProvider::default()
                            .with_subgraphs(true)
                            .build()])
                        .map_err(|e| {
                            RemovalError::model_load(format!(
                                "Failed to set CoreML execution provider: {e}"
                            ))
                        })?
                } else {
                    warn!("CoreML requested but not available, falling back to CPU");
                    session_builder
                }
            },
        };

        let (intra_threads, inter_threads) = Self::thread_counts(config);
        session_builder
            .with_parallel_execution(true)
            .map_err(|e| RemovalError::model_load(format!("Failed to enable parallel execution: {e}")))?
            .with_intra_threads(intra_threads)
            .map_err(|e| RemovalError::model_load(format!("Failed to set intra threads: {e}")))?
            .with_inter_threads(inter_threads)
            .map_err(|e| RemovalError::model_load(format!("Failed to set inter threads: {e}")))?
            .commit_from_memory(model_data)
            .map_err(|e| RemovalError::model_load(format!("Failed to create session from model data: {e}")))
    }
}

impl Default for OnnxBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for OnnxBackend {
    fn initialize(
        &mut self,
        config: &RemovalConfig,
        on_progress: &mut dyn FnMut(u32),
    ) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        on_progress(0);

        let model_data = std::fs::read(&config.model_path).map_err(|e| {
            RemovalError::model_load(format!(
                "Failed to read model file '{}': {e}",
                config.model_path.display()
            ))
        })?;
        debug!(
            path = %config.model_path.display(),
            size_bytes = model_data.len(),
            "Model file read"
        );
        on_progress(50);

        let session = Self::build_session(config, &model_data)?;
        on_progress(100);

        info!(provider = %config.execution_provider, "ONNX Runtime session created");
        self.session = Some(session);
        self.initialized = true;
        Ok(())
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        if !self.initialized {
            return Err(RemovalError::inference("Backend not initialized"));
        }
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| RemovalError::inference("ONNX session not initialized"))?;

        let input_value = Value::from_array(input.clone())
            .map_err(|e| RemovalError::inference(format!("Failed to convert input tensor: {e}")))?;

        // Positional inputs avoid a dependency on tensor names across models.
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| RemovalError::inference(format!("ONNX inference failed: {e}")))?;

        let keys: Vec<_> = outputs.keys().collect();
        let first_key = keys
            .first()
            .ok_or_else(|| RemovalError::inference("No output tensors found"))?;
        let output_tensor = outputs
            .get(first_key)
            .ok_or_else(|| RemovalError::inference("First output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| RemovalError::inference(format!("Failed to extract output tensor: {e}")))?;

        let output_shape = output_tensor.shape().to_vec();
        if output_shape.len() != 4 {
            return Err(RemovalError::inference(format!(
                "Expected 4D output tensor, got {}D",
                output_shape.len()
            )));
        }

        let output_data = output_tensor.view().to_owned();
        Array4::from_shape_vec(
            (
                output_shape.first().copied().unwrap_or(1),
                output_shape.get(1).copied().unwrap_or(1),
                output_shape.get(2).copied().unwrap_or(1),
                output_shape.get(3).copied().unwrap_or(1),
            ),
            output_data.into_raw_vec_and_offset().0,
        )
        .map_err(|e| RemovalError::inference(format!("Failed to reshape output tensor: {e}")))
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uninitialized_backend_rejects_inference() {
        let mut backend = OnnxBackend::new();
        let input = Array4::<f32>::zeros((1, 3, 8, 8));
        assert!(backend.infer(&input).is_err());
        assert!(!backend.is_initialized());
    }

    #[test]
    fn test_missing_model_file_is_load_error() {
        let mut backend = OnnxBackend::new();
        let config = RemovalConfig::builder()
            .model_path("/nonexistent/model.onnx")
            .build()
            .unwrap();
        let err = backend.initialize(&config, &mut |_| {}).unwrap_err();
        assert!(err.is_terminal());
    }

    #[test]
    fn test_thread_count_auto_detection() {
        let config = RemovalConfig::default();
        let (intra, inter) = OnnxBackend::thread_counts(&config);
        assert!(intra >= 1);
        assert!(inter >= 1);

        let config = RemovalConfig::builder()
            .intra_threads(2)
            .inter_threads(3)
            .build()
            .unwrap();
        assert_eq!(OnnxBackend::thread_counts(&config), (2, 3));
    }
}
