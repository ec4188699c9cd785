//! Data URL encoding and decoding
//!
//! The host consumes removal results as `data:` URLs so they can be dropped
//! straight onto the canvas as an image source. Incoming locators may also be
//! `data:` URLs (e.g. a cropped image produced by the editor).

use crate::error::{RemovalError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Encode binary data as a `data:<mime>;base64,...` URL
#[must_use]
pub fn encode(bytes: &[u8], mime: &str) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Decode a `data:` URL into its binary payload
///
/// Only base64-encoded payloads are supported, which is the form this crate
/// itself produces and the form browsers emit for canvas exports.
///
/// # Errors
///
/// Returns `RemovalError::Inference` if the URL is not a well-formed
/// base64 `data:` URL.
pub fn decode(url: &str) -> Result<Vec<u8>> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| RemovalError::inference("Not a data URL"))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| RemovalError::inference("Malformed data URL: missing payload"))?;
    if !meta.ends_with(";base64") {
        return Err(RemovalError::inference(
            "Unsupported data URL encoding: expected base64",
        ));
    }
    STANDARD
        .decode(payload)
        .map_err(|e| RemovalError::inference(format!("Invalid base64 payload in data URL: {e}")))
}

/// Whether a locator string is a `data:` URL
#[must_use]
pub fn is_data_url(locator: &str) -> bool {
    locator.starts_with("data:")
}

/// Best-effort MIME sniffing for an encoded image body
///
/// Used when wrapping remote API responses, which arrive without a reliable
/// content type. Falls back to `image/png`.
#[must_use]
pub fn sniff_image_mime(bytes: &[u8]) -> &'static str {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => "image/png",
    }
}
