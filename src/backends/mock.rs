//! Mock backend implementations for testing and debugging

use crate::config::RemovalConfig;
use crate::error::{RemovalError, Result};
use crate::inference::InferenceBackend;
use ndarray::Array4;

/// Deterministic mock segmentation backend
///
/// Marks the centered half-size region of the input as foreground and the
/// rest as background, which is enough structure to exercise the full
/// pipeline (letterbox mapping, compositing, encoding) without a model file.
#[derive(Debug)]
pub struct MockSegmentationBackend {
    initialized: bool,
    load_progress_steps: Vec<u32>,
}

impl MockSegmentationBackend {
    /// Create a new mock backend
    #[must_use]
    pub fn new() -> Self {
        Self {
            initialized: false,
            load_progress_steps: vec![0, 50, 100],
        }
    }

    /// Override the load percentages reported during initialization
    #[must_use]
    pub fn with_load_progress(mut self, steps: Vec<u32>) -> Self {
        self.load_progress_steps = steps;
        self
    }
}

impl Default for MockSegmentationBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for MockSegmentationBackend {
    fn initialize(
        &mut self,
        _config: &RemovalConfig,
        on_progress: &mut dyn FnMut(u32),
    ) -> Result<()> {
        for &step in &self.load_progress_steps {
            on_progress(step);
        }
        self.initialized = true;
        Ok(())
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        if !self.initialized {
            return Err(RemovalError::inference("Mock backend not initialized"));
        }

        let (n, _c, h, w) = input.dim();
        let mut output = Array4::<f32>::zeros((n, 1, h, w));

        // Foreground square covering the central half of each axis.
        let (y0, y1) = (h / 4, h * 3 / 4);
        let (x0, x1) = (w / 4, w * 3 / 4);
        for batch in 0..n {
            for y in y0..y1 {
                for x in x0..x1 {
                    if let Some(elem) = output.get_mut([batch, 0, y, x]) {
                        *elem = 1.0;
                    }
                }
            }
        }

        Ok(output)
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// Which operation a [`FailingMockBackend`] fails on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailureMode {
    /// `initialize` fails (terminal model-load error path)
    Load,
    /// `initialize` succeeds, every `infer` fails (per-request error path)
    Inference,
}

/// Mock backend that fails on demand, for error-path testing
#[derive(Debug)]
pub struct FailingMockBackend {
    mode: MockFailureMode,
    initialized: bool,
}

impl FailingMockBackend {
    /// Create a backend that fails in the given mode
    #[must_use]
    pub fn new(mode: MockFailureMode) -> Self {
        Self {
            mode,
            initialized: false,
        }
    }
}

impl InferenceBackend for FailingMockBackend {
    fn initialize(
        &mut self,
        _config: &RemovalConfig,
        _on_progress: &mut dyn FnMut(u32),
    ) -> Result<()> {
        match self.mode {
            MockFailureMode::Load => Err(RemovalError::model_load(
                "Mock model load failure (simulated fetch error)",
            )),
            MockFailureMode::Inference => {
                self.initialized = true;
                Ok(())
            },
        }
    }

    fn infer(&mut self, _input: &Array4<f32>) -> Result<Array4<f32>> {
        Err(RemovalError::inference(
            "Mock inference failure (simulated runtime exception)",
        ))
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}
