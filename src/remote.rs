//! Remote background removal adapter
//!
//! Thin HTTP client for hosted removal APIs (remove.bg-style): multipart POST
//! with the image under the `image_file` form field and the API key in a
//! header, binary image body back on success. Produces the same output shape
//! as the local worker (a data URL) so the host can switch strategies freely.

use crate::error::{RemovalError, Result};
use crate::services::dataurl;
use tracing::debug;

/// Header carrying the API key, as used by the hosted removal services
const API_KEY_HEADER: &str = "X-Api-Key";

/// Client for a hosted background removal API
pub struct RemoteBackgroundRemover {
    endpoint: String,
    api_key: String,
    http: reqwest::Client,
}

impl RemoteBackgroundRemover {
    /// Create a remover for the given endpoint and API key
    #[must_use]
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Remove the background of an encoded image, resolving to a data URL
    ///
    /// # Errors
    ///
    /// Returns [`RemovalError::Remote`] for transport failures and non-2xx
    /// responses (with status and response body in the message).
    pub async fn remove_background(&self, image_bytes: &[u8]) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(image_bytes.to_vec())
            .file_name("image")
            .mime_str("application/octet-stream")
            .map_err(|e| RemovalError::remote(format!("Failed to build multipart body: {e}")))?;
        let form = reqwest::multipart::Form::new().part("image_file", part);

        let response = self
            .http
            .post(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| RemovalError::remote(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemovalError::remote(format!(
                "API returned {status}: {body}"
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RemovalError::remote(format!("Failed to read response body: {e}")))?;
        debug!(size_bytes = bytes.len(), "Remote removal response received");

        let mime = dataurl::sniff_image_mime(&bytes);
        Ok(dataurl::encode(&bytes, mime))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructor_stores_endpoint() {
        let remover = RemoteBackgroundRemover::new("https://api.example.com/v1/removebg", "key-1");
        assert_eq!(remover.endpoint, "https://api.example.com/v1/removebg");
        assert_eq!(remover.api_key, "key-1");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_remote_error() {
        let remover = RemoteBackgroundRemover::new("http://127.0.0.1:1/removebg", "key");
        let err = remover.remove_background(&[1, 2, 3]).await.unwrap_err();
        assert!(matches!(err, RemovalError::Remote(_)));
    }
}
