//! Message protocol between the removal client and its worker
//!
//! Transport is a pair of in-order channels: requests flow into the worker
//! thread, events flow back to the client's pump task. Every removal pair is
//! tagged with a monotonically increasing request id so the client can safely
//! discard terminal events for requests it has already superseded; ordering
//! alone is not relied on.

use serde::{Deserialize, Serialize};

/// Request sent from the client to the worker
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerRequest {
    /// Trigger the one-time model load. Idempotent: a second `Init` while
    /// loading or ready is a no-op and produces no duplicate status stream.
    Init,
    /// Remove the background of the image behind `locator`
    RemoveBackground {
        /// Correlation id; echoed on the terminal event for this request
        request_id: u64,
        /// Filesystem path or `data:` URL of the encoded image
        locator: String,
    },
}

/// Status phase reported by the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusPhase {
    /// Model load in progress (progress is a percentage 0..=100)
    Loading,
    /// Model loaded; removal requests accepted
    Ready,
    /// Inference running for the current request
    Processing,
}

/// Event sent from the worker back to the client
///
/// Per removal request the worker emits zero or more `Status` events followed
/// by exactly one terminal event (`Result` or `Error`), never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerEvent {
    /// Non-terminal status/progress report
    Status {
        /// Current phase
        phase: StatusPhase,
        /// Percentage for `Loading`, unused otherwise
        progress: u32,
    },
    /// Successful removal result
    Result {
        /// Id of the request this result belongs to
        request_id: u64,
        /// Lossless RGBA PNG encoding of the composited image
        png: Vec<u8>,
        /// Result width in pixels
        width: u32,
        /// Result height in pixels
        height: u32,
    },
    /// Failure report
    Error {
        /// Id of the failed request; `None` for load-phase failures that are
        /// not tied to a specific removal request
        request_id: Option<u64>,
        /// Human-readable failure description
        message: String,
    },
}

impl WorkerEvent {
    /// The request id carried by a terminal event, if any
    #[must_use]
    pub fn request_id(&self) -> Option<u64> {
        match self {
            Self::Status { .. } => None,
            Self::Result { request_id, .. } => Some(*request_id),
            Self::Error { request_id, .. } => *request_id,
        }
    }

    /// Whether this event settles a removal request
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Result { .. } | Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_classification() {
        let status = WorkerEvent::Status {
            phase: StatusPhase::Loading,
            progress: 40,
        };
        assert!(!status.is_terminal());
        assert_eq!(status.request_id(), None);

        let result = WorkerEvent::Result {
            request_id: 7,
            png: vec![],
            width: 1,
            height: 1,
        };
        assert!(result.is_terminal());
        assert_eq!(result.request_id(), Some(7));

        let error = WorkerEvent::Error {
            request_id: Some(9),
            message: "boom".to_string(),
        };
        assert!(error.is_terminal());
        assert_eq!(error.request_id(), Some(9));
    }

    #[test]
    fn test_event_envelope_is_tagged() {
        let event = WorkerEvent::Error {
            request_id: None,
            message: "load failed".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"error\""));

        let parsed: WorkerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.request_id(), None);
        assert!(parsed.is_terminal());
    }
}
