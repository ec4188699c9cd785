//! Inference backend implementations
//!
//! - ONNX Runtime backend (hardware-accelerated, feature-gated)
//! - Mock backend (deterministic, model-free; used by this crate's tests and
//!   available to hosts that need to exercise the pipeline without a model)

#[cfg(feature = "onnx")]
pub mod onnx;

pub mod mock;

#[cfg(feature = "onnx")]
pub use self::onnx::OnnxBackend;

pub use self::mock::{FailingMockBackend, MockFailureMode, MockSegmentationBackend};
