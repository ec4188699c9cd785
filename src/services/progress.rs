//! Progress reporting for background removal requests
//!
//! Progress reporting is separated from the pipeline so hosts can surface it
//! however they like (spinner, percentage label, nothing at all).

/// Phase of a background removal request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    /// Model download/initialization; reported only while the worker's first
    /// load is in flight. Never reported again once the worker is ready.
    LoadingModel,
    /// Inference running for the current request
    Processing,
}

impl ProgressPhase {
    /// Stable string key for the phase, matching the host-facing protocol
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LoadingModel => "loading_model",
            Self::Processing => "processing",
        }
    }

    /// Human-readable description of the phase
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::LoadingModel => "Loading segmentation model",
            Self::Processing => "Removing background",
        }
    }
}

impl std::fmt::Display for ProgressPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single progress report delivered to the caller's handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Current phase
    pub phase: ProgressPhase,
    /// Progress within the phase
    pub current: u32,
    /// Upper bound for `current` (100 for percentage-style phases)
    pub total: u32,
}

impl ProgressUpdate {
    /// Create a model-loading progress update (percentage 0..=100)
    #[must_use]
    pub fn loading_model(percent: u32) -> Self {
        Self {
            phase: ProgressPhase::LoadingModel,
            current: percent.min(100),
            total: 100,
        }
    }

    /// Create a processing progress update
    #[must_use]
    pub fn processing() -> Self {
        Self {
            phase: ProgressPhase::Processing,
            current: 0,
            total: 100,
        }
    }
}

/// Callback invoked zero or more times before a request settles
///
/// Invoked from the client's event pump task, so it must be `Send + Sync`.
/// `Arc` so the client can invoke it without holding its internal lock.
pub type ProgressHandler = std::sync::Arc<dyn Fn(ProgressUpdate) + Send + Sync + 'static>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_keys() {
        assert_eq!(ProgressPhase::LoadingModel.as_str(), "loading_model");
        assert_eq!(ProgressPhase::Processing.as_str(), "processing");
        assert_eq!(ProgressPhase::Processing.to_string(), "processing");
    }

    #[test]
    fn test_loading_update_clamps_percentage() {
        let update = ProgressUpdate::loading_model(250);
        assert_eq!(update.current, 100);
        assert_eq!(update.total, 100);

        let update = ProgressUpdate::loading_model(42);
        assert_eq!(update.current, 42);
    }
}
