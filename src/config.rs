//! Configuration for the background removal worker and backends

use crate::error::{RemovalError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Execution provider for model inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon GPU acceleration
    CoreMl,
}

impl Default for ExecutionProvider {
    fn default() -> Self {
        Self::Auto
    }
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

/// Configuration for a background removal worker
///
/// The segmentation model is an opaque external dependency: the config points
/// at an ONNX file on disk and carries the preprocessing parameters the model
/// was trained with. The defaults match `RMBG`/`ISNet`-style segmentation
/// models (1024x1024 input, `ImageNet` normalization).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovalConfig {
    /// Path to the ONNX segmentation model file
    pub model_path: PathBuf,

    /// Square input size the model expects (pixels per side)
    pub model_input_size: u32,

    /// Per-channel normalization mean applied during preprocessing
    pub normalization_mean: [f32; 3],

    /// Per-channel normalization std applied during preprocessing
    pub normalization_std: [f32; 3],

    /// Execution provider for inference
    pub execution_provider: ExecutionProvider,

    /// Number of intra-op threads for inference (0 = auto)
    pub intra_threads: usize,

    /// Number of inter-op threads for inference (0 = auto)
    pub inter_threads: usize,

    /// Enable debug mode (additional logging and validation)
    pub debug: bool,
}

impl Default for RemovalConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::new(),
            model_input_size: 1024,
            normalization_mean: [0.485, 0.456, 0.406],
            normalization_std: [0.229, 0.224, 0.225],
            execution_provider: ExecutionProvider::Auto,
            intra_threads: 0,
            inter_threads: 0,
            debug: false,
        }
    }
}

impl RemovalConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> RemovalConfigBuilder {
        RemovalConfigBuilder::new()
    }
}

/// Builder for `RemovalConfig`
#[derive(Debug, Default)]
pub struct RemovalConfigBuilder {
    config: RemovalConfig,
}

impl RemovalConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: RemovalConfig::default(),
        }
    }

    /// Set the path to the ONNX model file
    #[must_use]
    pub fn model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.model_path = path.into();
        self
    }

    /// Set the square input size the model expects
    #[must_use]
    pub fn model_input_size(mut self, size: u32) -> Self {
        self.config.model_input_size = size;
        self
    }

    /// Set per-channel normalization mean
    #[must_use]
    pub fn normalization_mean(mut self, mean: [f32; 3]) -> Self {
        self.config.normalization_mean = mean;
        self
    }

    /// Set per-channel normalization std
    #[must_use]
    pub fn normalization_std(mut self, std: [f32; 3]) -> Self {
        self.config.normalization_std = std;
        self
    }

    /// Set execution provider
    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    /// Set number of intra-op threads (0 = auto)
    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    /// Set number of inter-op threads (0 = auto)
    #[must_use]
    pub fn inter_threads(mut self, threads: usize) -> Self {
        self.config.inter_threads = threads;
        self
    }

    /// Enable debug mode
    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    ///
    /// Returns `RemovalError::InvalidConfig` for:
    /// - Zero model input size
    /// - Zero-valued normalization std (division by zero during preprocessing)
    pub fn build(self) -> Result<RemovalConfig> {
        if self.config.model_input_size == 0 {
            return Err(RemovalError::invalid_config(
                "Model input size must be greater than zero",
            ));
        }
        if self.config.normalization_std.iter().any(|&s| s == 0.0) {
            return Err(RemovalError::invalid_config(
                "Normalization std must be non-zero for every channel",
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RemovalConfig::default();
        assert_eq!(config.model_input_size, 1024);
        assert_eq!(config.execution_provider, ExecutionProvider::Auto);
        assert_eq!(config.intra_threads, 0);
    }

    #[test]
    fn test_builder_validation() {
        let err = RemovalConfig::builder().model_input_size(0).build();
        assert!(err.is_err());

        let err = RemovalConfig::builder()
            .normalization_std([0.0, 1.0, 1.0])
            .build();
        assert!(err.is_err());

        let config = RemovalConfig::builder()
            .model_path("model.onnx")
            .model_input_size(320)
            .execution_provider(ExecutionProvider::Cpu)
            .build()
            .unwrap();
        assert_eq!(config.model_input_size, 320);
        assert_eq!(config.execution_provider, ExecutionProvider::Cpu);
    }

    #[test]
    fn test_execution_provider_display() {
        assert_eq!(ExecutionProvider::Auto.to_string(), "auto");
        assert_eq!(ExecutionProvider::CoreMl.to_string(), "coreml");
    }

    #[test]
    fn test_config_serde_round_trip() {
        let config = RemovalConfig::builder()
            .model_path("models/rmbg-1.4.onnx")
            .execution_provider(ExecutionProvider::Cuda)
            .build()
            .unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let back: RemovalConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.model_path, config.model_path);
        assert_eq!(back.execution_provider, ExecutionProvider::Cuda);
    }
}
