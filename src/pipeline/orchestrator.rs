//! Pipeline orchestration: one entry point per acquisition mode.
//!
//! `run_*` methods never panic and never return `Err` — every failure is
//! folded into an invalid [`DiagnosisResult`] so calling surfaces always
//! receive the full output contract. `try_run_*` variants expose the typed
//! [`PipelineError`] for embedding code that wants to branch on kinds.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use super::acquire::{self, ImageFetcher};
use super::decision;
use super::inference::{InferenceEngine, ModelManager};
use super::preprocess::preprocess;
use super::types::{DiagnosisResult, RawImage};
use super::PipelineError;

#[cfg(feature = "onnx-runtime")]
use super::acquire::HttpImageFetcher;
#[cfg(feature = "onnx-runtime")]
use super::inference::{ModelSource, OrtClassifier};

/// The composed scan classification pipeline.
///
/// One instance serves many runs; concurrent runs share only the model
/// manager's cached session.
pub struct ScanPipeline<E: InferenceEngine> {
    fetcher: Box<dyn ImageFetcher>,
    model: Arc<ModelManager<E>>,
}

impl<E: InferenceEngine> ScanPipeline<E> {
    pub fn new(fetcher: Box<dyn ImageFetcher>, model: Arc<ModelManager<E>>) -> Self {
        Self { fetcher, model }
    }

    /// Classify an already-uploaded payload.
    /// `media_type` is the type declared at upload, when known.
    pub fn run_bytes(&self, bytes: &[u8], media_type: Option<&str>) -> DiagnosisResult {
        complete(self.try_run_bytes(bytes, media_type))
    }

    pub fn try_run_bytes(
        &self,
        bytes: &[u8],
        media_type: Option<&str>,
    ) -> Result<DiagnosisResult, PipelineError> {
        if let Some(media_type) = media_type {
            acquire::validate_media_type(media_type)?;
        }
        acquire::validate_scan_bytes(bytes)?;
        let raw = acquire::decode_scan(bytes)?;
        self.diagnose(raw)
    }

    /// Classify a scan stored on the local filesystem.
    pub fn run_file(&self, path: &Path) -> DiagnosisResult {
        complete(self.try_run_file(path))
    }

    pub fn try_run_file(&self, path: &Path) -> Result<DiagnosisResult, PipelineError> {
        let raw = acquire::acquire_from_file(path)?;
        self.diagnose(raw)
    }

    /// Classify a scan behind a remote URL.
    pub fn run_url(&self, url: &str) -> DiagnosisResult {
        complete(self.try_run_url(url))
    }

    pub fn try_run_url(&self, url: &str) -> Result<DiagnosisResult, PipelineError> {
        let raw = acquire::acquire_from_url(self.fetcher.as_ref(), url)?;
        self.diagnose(raw)
    }

    /// Stages 2–4: preprocess, infer against the cached session, decide.
    fn diagnose(&self, raw: RawImage) -> Result<DiagnosisResult, PipelineError> {
        let tensor = preprocess(&raw)?;
        let session = self.model.session()?;
        let output = session.classify(&tensor)?;
        let (diagnosis, confidence, probabilities) = decision::evaluate(&output)?;

        info!(
            diagnosis = %diagnosis,
            confidence,
            "Scan classified"
        );
        Ok(DiagnosisResult::valid(diagnosis, confidence, probabilities))
    }
}

#[cfg(feature = "onnx-runtime")]
impl ScanPipeline<OrtClassifier> {
    /// Production pipeline: HTTP fetcher with the default timeout, ONNX
    /// classifier lazily loaded from `source` on first inference.
    pub fn with_onnx_model(source: ModelSource) -> Result<Self, PipelineError> {
        let fetcher = HttpImageFetcher::with_default_timeout()?;
        let model = Arc::new(ModelManager::new(move || OrtClassifier::load(&source)));
        Ok(Self::new(Box::new(fetcher), model))
    }
}

/// Fold a typed failure into the always-complete result shape.
fn complete(outcome: Result<DiagnosisResult, PipelineError>) -> DiagnosisResult {
    match outcome {
        Ok(result) => result,
        Err(e) => {
            warn!(error = %e, "Scan classification failed");
            DiagnosisResult::invalid(e.to_string())
        }
    }
}
