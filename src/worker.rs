//! Background removal worker
//!
//! An isolated execution unit: a dedicated OS thread owning the segmentation
//! pipeline, so model loading and inference never block the interactive
//! editing surface. The worker communicates exclusively through message
//! channels (requests in, events out) with no shared memory.
//!
//! State machine: `Uninitialized --Init--> Loading --ok--> Ready`, and
//! `Loading --err--> Failed`. A load failure is terminal: the worker answers
//! every subsequent removal request with a model-load error and is never
//! auto-retried; the owner must construct a new worker.

use crate::{
    config::RemovalConfig,
    error::{RemovalError, Result},
    inference::{InferenceBackend, Segmenter},
    protocol::{StatusPhase, WorkerEvent, WorkerRequest},
    services::dataurl,
    types::{RemovalResult, WorkerState},
};
use image::DynamicImage;
use std::sync::mpsc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

/// Factory trait for creating inference backends
///
/// The worker constructs its backend inside its own thread, so the factory
/// crosses the thread boundary instead of the backend itself. Hosts and tests
/// inject alternative backends (e.g. mocks) through this seam.
pub trait BackendFactory: Send + Sync {
    /// Create an uninitialized backend instance
    ///
    /// # Errors
    ///
    /// Returns `RemovalError` if no backend is available for this build.
    fn create_backend(&self, config: &RemovalConfig) -> Result<Box<dyn InferenceBackend>>;
}

/// Default backend factory: ONNX Runtime when the `onnx` feature is enabled
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    #[cfg(feature = "onnx")]
    fn create_backend(&self, _config: &RemovalConfig) -> Result<Box<dyn InferenceBackend>> {
        Ok(Box::new(crate::backends::OnnxBackend::new()))
    }

    #[cfg(not(feature = "onnx"))]
    fn create_backend(&self, _config: &RemovalConfig) -> Result<Box<dyn InferenceBackend>> {
        Err(RemovalError::invalid_config(
            "No inference backend compiled in; enable the `onnx` feature",
        ))
    }
}

/// Handle to a spawned worker thread
///
/// Dropping the handle closes the request channel; the worker thread drains
/// what it has and exits. Requests already accepted still run to completion;
/// there is no mid-inference cancellation.
pub struct WorkerHandle {
    request_tx: mpsc::Sender<WorkerRequest>,
}

impl WorkerHandle {
    /// Spawn a worker thread around the given config and backend factory
    ///
    /// Events are delivered to `events` in send order. The channel is
    /// unbounded so the worker thread never blocks on a slow consumer.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the OS refuses to spawn the thread.
    pub fn spawn(
        config: RemovalConfig,
        factory: Box<dyn BackendFactory>,
        events: UnboundedSender<WorkerEvent>,
    ) -> Result<Self> {
        let (request_tx, request_rx) = mpsc::channel();

        std::thread::Builder::new()
            .name("bgremoval-worker".to_string())
            .spawn(move || {
                Worker::new(config, factory.as_ref(), events).run(&request_rx);
                debug!("Background removal worker thread exiting");
            })?;

        Ok(Self { request_tx })
    }

    /// Send a request to the worker
    ///
    /// # Errors
    ///
    /// Returns `RemovalError::Worker` if the worker thread has terminated.
    pub fn send(&self, request: WorkerRequest) -> Result<()> {
        self.request_tx
            .send(request)
            .map_err(|_| RemovalError::worker("Worker thread has terminated"))
    }
}

/// Worker-side state and pipeline ownership
struct Worker {
    segmenter: Option<Segmenter>,
    state: WorkerState,
    load_error: Option<String>,
    events: UnboundedSender<WorkerEvent>,
}

impl Worker {
    fn new(
        config: RemovalConfig,
        factory: &dyn BackendFactory,
        events: UnboundedSender<WorkerEvent>,
    ) -> Self {
        match factory.create_backend(&config) {
            Ok(backend) => Self {
                segmenter: Some(Segmenter::new(backend, config)),
                state: WorkerState::Uninitialized,
                load_error: None,
                events,
            },
            Err(e) => {
                let message = format!("Failed to create inference backend: {e}");
                error!("{message}");
                Self {
                    segmenter: None,
                    state: WorkerState::Failed,
                    load_error: Some(message),
                    events,
                }
            },
        }
    }

    /// Process requests until the channel closes or the client disappears
    fn run(mut self, requests: &mpsc::Receiver<WorkerRequest>) {
        while let Ok(request) = requests.recv() {
            let delivered = match request {
                WorkerRequest::Init => self.handle_init(),
                WorkerRequest::RemoveBackground {
                    request_id,
                    locator,
                } => self.handle_remove(request_id, &locator),
            };
            if !delivered {
                // Client side dropped its event receiver; nothing left to serve.
                break;
            }
        }
    }

    fn emit(&self, event: WorkerEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Handle the idempotent `Init` message
    fn handle_init(&mut self) -> bool {
        match self.state {
            WorkerState::Loading | WorkerState::Ready | WorkerState::Failed => {
                // Second init is a no-op; no duplicate status stream.
                debug!(state = ?self.state, "Ignoring redundant init");
                true
            },
            WorkerState::Uninitialized => {
                self.state = WorkerState::Loading;
                let Some(segmenter) = self.segmenter.as_mut() else {
                    self.state = WorkerState::Failed;
                    let message = self
                        .load_error
                        .clone()
                        .unwrap_or_else(|| "No inference backend available".to_string());
                    return self.emit(WorkerEvent::Error {
                        request_id: None,
                        message,
                    });
                };

                let events = self.events.clone();
                let load_result = segmenter.load(&mut |percent| {
                    let _ = events.send(WorkerEvent::Status {
                        phase: StatusPhase::Loading,
                        progress: percent,
                    });
                });

                match load_result {
                    Ok(()) => {
                        self.state = WorkerState::Ready;
                        info!("Segmentation model ready");
                        self.emit(WorkerEvent::Status {
                            phase: StatusPhase::Ready,
                            progress: 100,
                        })
                    },
                    Err(e) => {
                        let message = e.to_string();
                        warn!("Model load failed: {message}");
                        self.state = WorkerState::Failed;
                        self.load_error = Some(message.clone());
                        self.emit(WorkerEvent::Error {
                            request_id: None,
                            message,
                        })
                    },
                }
            },
        }
    }

    /// Handle a removal request, emitting exactly one terminal event
    fn handle_remove(&mut self, request_id: u64, locator: &str) -> bool {
        match self.state {
            WorkerState::Failed => {
                let detail = self
                    .load_error
                    .clone()
                    .unwrap_or_else(|| "unknown load failure".to_string());
                self.emit(WorkerEvent::Error {
                    request_id: Some(request_id),
                    message: format!("Model failed to load: {detail}"),
                })
            },
            WorkerState::Uninitialized | WorkerState::Loading => self.emit(WorkerEvent::Error {
                request_id: Some(request_id),
                message: "Model not loaded".to_string(),
            }),
            WorkerState::Ready => {
                if !self.emit(WorkerEvent::Status {
                    phase: StatusPhase::Processing,
                    progress: 0,
                }) {
                    return false;
                }

                match self.remove_background(locator) {
                    Ok((png, width, height)) => self.emit(WorkerEvent::Result {
                        request_id,
                        png,
                        width,
                        height,
                    }),
                    Err(e) => {
                        // Request-scoped failure; the worker stays usable.
                        warn!(request_id, "Background removal failed: {e}");
                        self.emit(WorkerEvent::Error {
                            request_id: Some(request_id),
                            message: e.to_string(),
                        })
                    },
                }
            },
        }
    }

    /// Decode, segment, composite, and encode one image
    fn remove_background(&mut self, locator: &str) -> Result<(Vec<u8>, u32, u32)> {
        let segmenter = self
            .segmenter
            .as_mut()
            .ok_or_else(|| RemovalError::inference("No inference backend available"))?;

        let image = load_image(locator)?;
        let (width, height) = (image.width(), image.height());
        debug!(width, height, "Processing removal request");

        let mask = segmenter.segment(&image)?;
        let composited = crate::compositor::apply_mask(&image.to_rgba8(), &mask);
        let png = RemovalResult::new(composited).to_png_bytes()?;

        Ok((png, width, height))
    }
}

/// Decode an image from a locator: a `data:` URL or a filesystem path
fn load_image(locator: &str) -> Result<DynamicImage> {
    if dataurl::is_data_url(locator) {
        let bytes = dataurl::decode(locator)?;
        image::load_from_memory(&bytes)
            .map_err(|e| RemovalError::inference(format!("Failed to decode image: {e}")))
    } else {
        image::open(locator)
            .map_err(|e| RemovalError::inference(format!("Failed to open image '{locator}': {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{FailingMockBackend, MockFailureMode, MockSegmentationBackend};
    use image::{Rgba, RgbaImage};
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    struct MockFactory;

    impl BackendFactory for MockFactory {
        fn create_backend(&self, _config: &RemovalConfig) -> Result<Box<dyn InferenceBackend>> {
            Ok(Box::new(MockSegmentationBackend::new()))
        }
    }

    struct FailingFactory(MockFailureMode);

    impl BackendFactory for FailingFactory {
        fn create_backend(&self, _config: &RemovalConfig) -> Result<Box<dyn InferenceBackend>> {
            Ok(Box::new(FailingMockBackend::new(self.0)))
        }
    }

    fn test_config() -> RemovalConfig {
        RemovalConfig::builder()
            .model_input_size(64)
            .build()
            .unwrap()
    }

    fn spawn_worker(factory: Box<dyn BackendFactory>) -> (WorkerHandle, UnboundedReceiver<WorkerEvent>) {
        let (events_tx, events_rx) = unbounded_channel();
        let handle = WorkerHandle::spawn(test_config(), factory, events_tx).unwrap();
        (handle, events_rx)
    }

    fn red_image_locator() -> String {
        let image = RgbaImage::from_pixel(16, 16, Rgba([255, 0, 0, 255]));
        let mut png = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        dataurl::encode(&png, "image/png")
    }

    async fn next_terminal(rx: &mut UnboundedReceiver<WorkerEvent>) -> WorkerEvent {
        loop {
            let event = rx.recv().await.expect("worker channel closed");
            if event.is_terminal() {
                return event;
            }
        }
    }

    #[tokio::test]
    async fn test_double_init_single_load_sequence() {
        let (handle, mut rx) = spawn_worker(Box::new(MockFactory));
        handle.send(WorkerRequest::Init).unwrap();
        handle.send(WorkerRequest::Init).unwrap();
        handle
            .send(WorkerRequest::RemoveBackground {
                request_id: 1,
                locator: red_image_locator(),
            })
            .unwrap();

        let mut loading_reports = 0;
        let mut ready_reports = 0;
        loop {
            let event = rx.recv().await.unwrap();
            match event {
                WorkerEvent::Status {
                    phase: StatusPhase::Loading,
                    ..
                } => loading_reports += 1,
                WorkerEvent::Status {
                    phase: StatusPhase::Ready,
                    ..
                } => ready_reports += 1,
                WorkerEvent::Result { request_id, .. } => {
                    assert_eq!(request_id, 1);
                    break;
                },
                WorkerEvent::Error { message, .. } => panic!("unexpected error: {message}"),
                WorkerEvent::Status { .. } => {},
            }
        }
        // Mock reports three load percentages; a second init must not repeat them.
        assert_eq!(loading_reports, 3);
        assert_eq!(ready_reports, 1);
    }

    #[tokio::test]
    async fn test_remove_before_init_rejected() {
        let (handle, mut rx) = spawn_worker(Box::new(MockFactory));
        handle
            .send(WorkerRequest::RemoveBackground {
                request_id: 5,
                locator: red_image_locator(),
            })
            .unwrap();

        match next_terminal(&mut rx).await {
            WorkerEvent::Error {
                request_id,
                message,
            } => {
                assert_eq!(request_id, Some(5));
                assert!(message.contains("not loaded"));
            },
            other => panic!("expected error event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_load_failure_is_terminal() {
        let (handle, mut rx) = spawn_worker(Box::new(FailingFactory(MockFailureMode::Load)));
        handle.send(WorkerRequest::Init).unwrap();

        match next_terminal(&mut rx).await {
            WorkerEvent::Error { request_id, .. } => assert_eq!(request_id, None),
            other => panic!("expected load error, got {other:?}"),
        }

        // Every subsequent request fails immediately, and no processing
        // status is ever emitted.
        for id in [10, 11] {
            handle
                .send(WorkerRequest::RemoveBackground {
                    request_id: id,
                    locator: red_image_locator(),
                })
                .unwrap();
            match rx.recv().await.unwrap() {
                WorkerEvent::Error {
                    request_id,
                    message,
                } => {
                    assert_eq!(request_id, Some(id));
                    assert!(message.contains("failed to load"));
                },
                other => panic!("expected immediate error, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_inference_failure_keeps_worker_usable() {
        let (handle, mut rx) = spawn_worker(Box::new(FailingFactory(MockFailureMode::Inference)));
        handle.send(WorkerRequest::Init).unwrap();

        for id in [1, 2] {
            handle
                .send(WorkerRequest::RemoveBackground {
                    request_id: id,
                    locator: red_image_locator(),
                })
                .unwrap();
            match next_terminal(&mut rx).await {
                WorkerEvent::Error { request_id, .. } => assert_eq!(request_id, Some(id)),
                other => panic!("expected inference error, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_successful_removal_result() {
        let (handle, mut rx) = spawn_worker(Box::new(MockFactory));
        handle.send(WorkerRequest::Init).unwrap();
        handle
            .send(WorkerRequest::RemoveBackground {
                request_id: 42,
                locator: red_image_locator(),
            })
            .unwrap();

        match next_terminal(&mut rx).await {
            WorkerEvent::Result {
                request_id,
                png,
                width,
                height,
            } => {
                assert_eq!(request_id, 42);
                assert_eq!((width, height), (16, 16));

                let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
                // RGB preserved everywhere; mock marks the center foreground.
                for pixel in decoded.pixels() {
                    assert_eq!(&pixel.0[0..3], &[255, 0, 0]);
                }
                assert_eq!(decoded.get_pixel(8, 8).0[3], 255);
                assert_eq!(decoded.get_pixel(0, 0).0[3], 0);
            },
            other => panic!("expected result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_corrupt_image_produces_tagged_error() {
        let (handle, mut rx) = spawn_worker(Box::new(MockFactory));
        handle.send(WorkerRequest::Init).unwrap();
        handle
            .send(WorkerRequest::RemoveBackground {
                request_id: 3,
                locator: dataurl::encode(b"not an image", "image/png"),
            })
            .unwrap();

        match next_terminal(&mut rx).await {
            WorkerEvent::Error { request_id, .. } => assert_eq!(request_id, Some(3)),
            other => panic!("expected decode error, got {other:?}"),
        }

        // The worker remains usable for the next request.
        handle
            .send(WorkerRequest::RemoveBackground {
                request_id: 4,
                locator: red_image_locator(),
            })
            .unwrap();
        assert!(matches!(
            next_terminal(&mut rx).await,
            WorkerEvent::Result { request_id: 4, .. }
        ));
    }
}
