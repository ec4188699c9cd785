//! Removal strategy selection
//!
//! The host picks between the local worker-isolated model and a hosted API by
//! configuration. Both arms expose one capability and produce the same output
//! shape (a data URL), so the editor does not care which one is active.

use crate::{
    client::BackgroundRemovalClient,
    error::Result,
    remote::RemoteBackgroundRemover,
    services::progress::ProgressHandler,
    types::ImageSource,
};

/// A background removal strategy selected by host configuration
pub enum RemovalStrategy {
    /// Local worker-isolated model inference
    Local(BackgroundRemovalClient),
    /// Hosted removal API
    Remote(RemoteBackgroundRemover),
}

impl RemovalStrategy {
    /// Remove the background of an image, resolving to a data URL
    ///
    /// The remote arm has no model load and reports no progress; the handler
    /// is only invoked on the local path.
    ///
    /// # Errors
    ///
    /// Propagates the active strategy's failures; see
    /// [`BackgroundRemovalClient::remove_background`] and
    /// [`RemoteBackgroundRemover::remove_background`].
    pub async fn remove_background(
        &self,
        source: ImageSource,
        on_progress: Option<ProgressHandler>,
    ) -> Result<String> {
        match self {
            Self::Local(client) => client.remove_background(source, on_progress).await,
            Self::Remote(remover) => {
                let bytes = match source {
                    ImageSource::Bytes(bytes) => bytes,
                    ImageSource::Locator(locator) => {
                        if crate::services::dataurl::is_data_url(&locator) {
                            crate::services::dataurl::decode(&locator)?
                        } else {
                            tokio::fs::read(&locator).await?
                        }
                    },
                };
                remover.remove_background(&bytes).await
            },
        }
    }
}
