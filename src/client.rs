//! Background removal client façade
//!
//! The main-context side of the pipeline: owns the worker lifecycle,
//! serializes concurrent requests (single in-flight request with a
//! reject-then-replace policy), converts caller inputs into locators the
//! worker can read, and converts the worker's binary result into a data URL.
//!
//! The client is an explicit owned object constructed by whatever composes
//! the editor, not a process-wide singleton, so teardown is clean and tests
//! don't leak state into each other.

use crate::{
    config::RemovalConfig,
    error::{RemovalError, Result},
    protocol::{StatusPhase, WorkerEvent, WorkerRequest},
    services::dataurl,
    services::progress::{ProgressHandler, ProgressUpdate},
    types::{ImageSource, WorkerState},
    worker::{BackendFactory, DefaultBackendFactory, WorkerHandle},
};
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// The continuation pair and progress sink of the in-flight request
struct PendingRequest {
    request_id: u64,
    responder: oneshot::Sender<Result<String>>,
    on_progress: Option<ProgressHandler>,
}

/// Mutable client state shared with the event pump task
struct ClientInner {
    config: RemovalConfig,
    factory: Option<Box<dyn BackendFactory>>,
    worker: Option<WorkerHandle>,
    lifecycle: WorkerState,
    next_request_id: u64,
    pending: Option<PendingRequest>,
    /// Temporary locators for byte-input requests, keyed by request id.
    /// Each entry is released exactly once, when that request's terminal
    /// event arrives, even if the request was superseded meanwhile, since
    /// the worker may still be reading the file.
    locators: HashMap<u64, NamedTempFile>,
}

/// Client façade for worker-isolated background removal
///
/// At most one removal is in flight per client at any time: a new request
/// rejects the pending one with [`RemovalError::Superseded`] before being
/// dispatched. Supersession is promise-level only: the worker still finishes
/// the computation it already started, and the client discards the stale
/// result by request id.
pub struct BackgroundRemovalClient {
    inner: Arc<Mutex<ClientInner>>,
}

impl BackgroundRemovalClient {
    /// Create a client using the default (ONNX) backend factory
    #[must_use]
    pub fn new(config: RemovalConfig) -> Self {
        Self::with_factory(config, Box::new(DefaultBackendFactory))
    }

    /// Create a client with an injected backend factory
    #[must_use]
    pub fn with_factory(config: RemovalConfig, factory: Box<dyn BackendFactory>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ClientInner {
                config,
                factory: Some(factory),
                worker: None,
                lifecycle: WorkerState::Uninitialized,
                next_request_id: 0,
                pending: None,
                locators: HashMap::new(),
            })),
        }
    }

    /// Remove the background of an image, resolving to a PNG data URL
    ///
    /// Lazily spawns the worker on first call, which also triggers the
    /// one-time model load. `on_progress` is invoked zero or more times
    /// before the future settles: with the `loading_model` phase only while
    /// the first load is in flight, and with the `processing` phase for every
    /// request.
    ///
    /// # Errors
    ///
    /// - [`RemovalError::Superseded`] if a newer request pre-empts this one
    /// - [`RemovalError::ModelLoad`] if the worker's model failed to load
    ///   (terminal for this client's worker)
    /// - [`RemovalError::Inference`] for decode/inference failures scoped to
    ///   this request
    /// - [`RemovalError::Worker`] if the worker thread is gone
    pub async fn remove_background(
        &self,
        source: ImageSource,
        on_progress: Option<ProgressHandler>,
    ) -> Result<String> {
        let receiver = {
            let mut inner = self.inner.lock().expect("client state poisoned");

            self.ensure_worker(&mut inner)?;

            // Reject-then-replace: the old continuation and its progress sink
            // are discarded before the new request is dispatched.
            if let Some(previous) = inner.pending.take() {
                debug!(
                    request_id = previous.request_id,
                    "Superseding pending removal request"
                );
                let _ = previous.responder.send(Err(RemovalError::Superseded));
            }

            let request_id = inner.next_request_id;
            inner.next_request_id += 1;

            let locator = match source {
                ImageSource::Locator(locator) => locator,
                ImageSource::Bytes(bytes) => {
                    let file = write_temp_locator(&bytes)?;
                    let locator = file.path().to_string_lossy().into_owned();
                    inner.locators.insert(request_id, file);
                    locator
                },
            };

            let (responder, receiver) = oneshot::channel();
            inner.pending = Some(PendingRequest {
                request_id,
                responder,
                on_progress,
            });

            let send_result = inner
                .worker
                .as_ref()
                .ok_or_else(|| RemovalError::worker("Worker not spawned"))
                .and_then(|worker| {
                    worker.send(WorkerRequest::RemoveBackground {
                        request_id,
                        locator,
                    })
                });
            if let Err(e) = send_result {
                inner.pending = None;
                inner.locators.remove(&request_id);
                return Err(e);
            }

            receiver
        };

        receiver
            .await
            .map_err(|_| RemovalError::worker("Removal client shut down"))?
    }

    /// Lifecycle state of the underlying worker as last observed
    #[must_use]
    pub fn worker_state(&self) -> WorkerState {
        self.inner.lock().expect("client state poisoned").lifecycle
    }

    /// Spawn the worker and its event pump on first use
    fn ensure_worker(&self, inner: &mut ClientInner) -> Result<()> {
        if inner.worker.is_some() {
            return Ok(());
        }

        let factory = inner
            .factory
            .take()
            .ok_or_else(|| RemovalError::worker("Worker already shut down"))?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let worker = WorkerHandle::spawn(inner.config.clone(), factory, events_tx)?;
        worker.send(WorkerRequest::Init)?;
        inner.worker = Some(worker);
        inner.lifecycle = WorkerState::Loading;

        tokio::spawn(pump_events(Arc::clone(&self.inner), events_rx));
        Ok(())
    }
}

/// Write request bytes to a temporary locator the worker can read
fn write_temp_locator(bytes: &[u8]) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file)
}

/// Drive worker events into the client state until the worker goes away
async fn pump_events(
    inner: Arc<Mutex<ClientInner>>,
    mut events: mpsc::UnboundedReceiver<WorkerEvent>,
) {
    while let Some(event) = events.recv().await {
        handle_event(&inner, event);
    }

    // Worker thread gone: fail whatever is still pending and release any
    // locators the worker can no longer be reading.
    let (pending, locators) = {
        let mut inner = inner.lock().expect("client state poisoned");
        inner.worker = None;
        (inner.pending.take(), std::mem::take(&mut inner.locators))
    };
    drop(locators);
    if let Some(pending) = pending {
        warn!(
            request_id = pending.request_id,
            "Worker terminated with a request pending"
        );
        let _ = pending
            .responder
            .send(Err(RemovalError::worker("Worker terminated unexpectedly")));
    }
}

/// Apply one worker event to the client state
fn handle_event(inner: &Arc<Mutex<ClientInner>>, event: WorkerEvent) {
    match event {
        WorkerEvent::Status { phase, progress } => {
            let handler = {
                let mut inner = inner.lock().expect("client state poisoned");
                match phase {
                    StatusPhase::Loading => inner.lifecycle = WorkerState::Loading,
                    StatusPhase::Ready => inner.lifecycle = WorkerState::Ready,
                    StatusPhase::Processing => {},
                }
                inner
                    .pending
                    .as_ref()
                    .and_then(|pending| pending.on_progress.clone())
            };
            if let Some(handler) = handler {
                let update = match phase {
                    StatusPhase::Loading => ProgressUpdate::loading_model(progress),
                    StatusPhase::Processing => ProgressUpdate::processing(),
                    StatusPhase::Ready => return,
                };
                handler(update);
            }
        },
        WorkerEvent::Result {
            request_id,
            png,
            width,
            height,
        } => {
            let pending = settle(inner, request_id);
            let Some(pending) = pending else {
                debug!(request_id, "Discarding stale removal result");
                return;
            };
            debug!(request_id, width, height, "Removal request resolved");
            let _ = pending
                .responder
                .send(Ok(dataurl::encode(&png, "image/png")));
        },
        WorkerEvent::Error {
            request_id,
            message,
        } => {
            let mut guard = inner.lock().expect("client state poisoned");
            let Some(request_id) = request_id else {
                // Load-phase failure not tied to a request: terminal worker state.
                guard.lifecycle = WorkerState::Failed;
                return;
            };
            guard.locators.remove(&request_id);
            let matches = guard
                .pending
                .as_ref()
                .is_some_and(|pending| pending.request_id == request_id);
            let pending = if matches { guard.pending.take() } else { None };
            drop(guard);

            let Some(pending) = pending else {
                debug!(request_id, "Discarding stale removal error");
                return;
            };
            let _ = pending.responder.send(Err(classify_worker_error(message)));
        },
    }
}

/// Release the locator for a settled request and take its continuation if it
/// is still the pending one
fn settle(inner: &Arc<Mutex<ClientInner>>, request_id: u64) -> Option<PendingRequest> {
    let mut inner = inner.lock().expect("client state poisoned");
    inner.locators.remove(&request_id);
    let matches = inner
        .pending
        .as_ref()
        .is_some_and(|pending| pending.request_id == request_id);
    if matches {
        inner.pending.take()
    } else {
        None
    }
}

/// Map a worker error message back to the error taxonomy
fn classify_worker_error(message: String) -> RemovalError {
    if message.contains("failed to load") || message.contains("Model load error") {
        RemovalError::ModelLoad(message)
    } else {
        RemovalError::Inference(message)
    }
}
