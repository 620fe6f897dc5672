//! Chest-scan classification pipeline.
//!
//! Four sequential stages, each independently testable:
//! acquisition (file or URL -> decoded bitmap), preprocessing (bitmap ->
//! normalized `[1,224,224,3]` tensor), inference (tensor -> class
//! probabilities via a cached model session), and decision (arg-max ->
//! [`DiagnosisResult`]). A polling [`worker`] drains pending scan records
//! from a store and writes diagnoses back.
//!
//! The crate is a library — no UI, no storage engine, no HTTP server.
//! Embedding applications compose [`pipeline::ScanPipeline`] with their own
//! fetcher/engine/store implementations, or enable the `onnx-runtime`
//! feature for the real ONNX classifier.

pub mod config;
pub mod pipeline;
pub mod worker;

pub use pipeline::{
    ClassProbabilities, DiagnosisResult, InferenceEngine, ModelManager, ModelSource,
    PipelineError, ScanClass, ScanPipeline,
};
#[cfg(feature = "onnx-runtime")]
pub use pipeline::OrtClassifier;
pub use worker::{DiagnosisWorker, ScanStore, WorkerError};

use tracing_subscriber::EnvFilter;

/// Initialize tracing for embedding binaries.
///
/// Honors `RUST_LOG` when set, otherwise falls back to the crate default.
/// Safe to call when a subscriber is already installed (the second install
/// is ignored).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();
}
