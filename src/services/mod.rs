//! Service layer for pirueta-bgremove
//!
//! Infrastructure concerns kept out of the pipeline logic: data URL
//! encoding/decoding for host-facing results and progress reporting plumbing.

pub mod dataurl;
pub mod progress;

pub use progress::{ProgressHandler, ProgressPhase, ProgressUpdate};
