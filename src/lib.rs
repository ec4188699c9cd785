#![allow(clippy::uninlined_format_args)]

//! # PIRÜETAS Background Removal Core
//!
//! Worker-isolated background removal for the PIRÜETAS sticker/poster editor.
//! A segmentation model runs on a dedicated worker thread so that model
//! loading and inference never block the interactive editing surface; the
//! client façade serializes requests (at most one in flight, newest wins),
//! converts the model's single-channel mask into a per-pixel alpha channel on
//! the original image, and hands the host a PNG data URL it can drop straight
//! onto the canvas.
//!
//! ## Features
//!
//! - **Worker isolation**: model load and inference on a dedicated thread,
//!   message-passing only, request-id correlation for stale results
//! - **Single in-flight request**: a newer removal supersedes the pending one
//!   (reject-then-replace; the superseded caller sees a dedicated error)
//! - **Mask compositing**: hard alpha overwrite preserving RGB exactly
//! - **ONNX Runtime backend**: CPU/CUDA/CoreML execution providers (`onnx`
//!   feature, default on); deterministic mock backends for model-free testing
//! - **Remote fallback**: hosted-API adapter producing the same output shape
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pirueta_bgremove::{BackgroundRemovalClient, ImageSource, RemovalConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = RemovalConfig::builder()
//!     .model_path("models/rmbg-1.4.onnx")
//!     .build()?;
//! let client = BackgroundRemovalClient::new(config);
//!
//! let image_bytes = std::fs::read("sticker-source.jpg")?;
//! let data_url = client
//!     .remove_background(ImageSource::Bytes(image_bytes), None)
//!     .await?;
//! // `data_url` starts with "data:image/png;base64," and can be used
//! // directly as a canvas image source.
//! # Ok(())
//! # }
//! ```
//!
//! ## Progress reporting
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pirueta_bgremove::{
//!     BackgroundRemovalClient, ImageSource, ProgressHandler, RemovalConfig,
//! };
//!
//! # async fn example(client: BackgroundRemovalClient, bytes: Vec<u8>) -> anyhow::Result<()> {
//! let handler: ProgressHandler = Arc::new(|update| {
//!     println!("{}: {}/{}", update.phase, update.current, update.total);
//! });
//! let url = client
//!     .remove_background(ImageSource::Bytes(bytes), Some(handler))
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! The `loading_model` phase is reported only while the worker's one-time
//! model load is in flight; every request reports the `processing` phase.

pub mod backends;
pub mod client;
pub mod compositor;
pub mod config;
pub mod error;
pub mod inference;
pub mod protocol;
pub mod remote;
pub mod services;
pub mod strategy;
pub mod types;
pub mod utils;
pub mod worker;

// Public API exports
#[cfg(feature = "onnx")]
pub use backends::OnnxBackend;
pub use backends::{FailingMockBackend, MockFailureMode, MockSegmentationBackend};
pub use client::BackgroundRemovalClient;
pub use compositor::apply_mask;
pub use config::{ExecutionProvider, RemovalConfig, RemovalConfigBuilder};
pub use error::{RemovalError, Result};
pub use inference::{InferenceBackend, Segmenter};
pub use protocol::{StatusPhase, WorkerEvent, WorkerRequest};
pub use remote::RemoteBackgroundRemover;
pub use services::{ProgressHandler, ProgressPhase, ProgressUpdate};
pub use strategy::RemovalStrategy;
pub use types::{ImageSource, RemovalResult, SegmentationMask, WorkerState};
pub use worker::{BackendFactory, DefaultBackendFactory, WorkerHandle};

/// Remove the background of an image with a one-off client
///
/// Convenience wrapper that constructs a throwaway [`BackgroundRemovalClient`]
/// (and thus a throwaway worker and model load) for a single removal. Hosts
/// that process more than one image should hold a client instead so the
/// loaded model is reused.
///
/// # Errors
///
/// See [`BackgroundRemovalClient::remove_background`].
pub async fn remove_background_local(
    source: ImageSource,
    config: RemovalConfig,
    on_progress: Option<ProgressHandler>,
) -> Result<String> {
    let client = BackgroundRemovalClient::new(config);
    client.remove_background(source, on_progress).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_api_surface() {
        // Compilation test: the host-facing types are exported and buildable.
        let _config = RemovalConfig::default();
        let _source: ImageSource = "photo.png".into();
        let _phase = ProgressPhase::Processing;
    }
}
