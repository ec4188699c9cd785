//! Complete example demonstrating worker-isolated background removal
//!
//! Usage:
//!   cargo run --example remove_background -- <model.onnx> <input-image> [output.png]
//!
//! Loads the segmentation model on the worker thread (reporting load progress
//! the first time), removes the background of the input image, and writes the
//! resulting transparent PNG next to the input.

use anyhow::{Context, Result};
use pirueta_bgremove::{
    BackgroundRemovalClient, ExecutionProvider, ImageSource, ProgressHandler, RemovalConfig,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let model_path = args.next().context("usage: remove_background <model.onnx> <input> [output]")?;
    let input_path = args.next().context("missing input image path")?;
    let output_path = args.next().unwrap_or_else(|| "output.png".to_string());

    let config = RemovalConfig::builder()
        .model_path(&model_path)
        .execution_provider(ExecutionProvider::Auto)
        .build()?;
    let client = BackgroundRemovalClient::new(config);

    let handler: ProgressHandler = Arc::new(|update| {
        println!("  [{}] {}/{}", update.phase, update.current, update.total);
    });

    println!("🖼️ Removing background: {input_path}");
    let image_bytes = std::fs::read(&input_path)
        .with_context(|| format!("failed to read {input_path}"))?;
    let data_url = client
        .remove_background(ImageSource::Bytes(image_bytes), Some(handler))
        .await?;

    // The data URL is what a canvas host would consume directly; for the CLI
    // demo we decode it back to bytes and write a file.
    let png = pirueta_bgremove::services::dataurl::decode(&data_url)?;
    std::fs::write(&output_path, &png)
        .with_context(|| format!("failed to write {output_path}"))?;
    println!("✅ Wrote {output_path} ({} bytes)", png.len());

    // A second removal on the same client reuses the loaded model.
    let again = client
        .remove_background(ImageSource::Locator(input_path.clone()), None)
        .await?;
    println!(
        "🔁 Second pass (model already loaded): {} chars of data URL",
        again.len()
    );

    Ok(())
}
