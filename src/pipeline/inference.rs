//! Inference invocation: [`InputTensor`] -> [`OutputVector`].
//!
//! The model session is the only long-lived shared resource in the crate.
//! [`ModelManager`] owns its lifecycle: constructed lazily on first use,
//! shared read-only afterwards, never torn down before process exit. A
//! failed load is never cached — the next invocation retries.

use std::sync::{Arc, Mutex};

use tracing::info;

use super::types::{InputTensor, OutputVector};
use super::PipelineError;
use crate::config::MODEL_FETCH_TIMEOUT_SECS;

/// Executes one classification against a loaded model.
///
/// Implementations must be safe to share across concurrent pipeline runs;
/// the tensor is read-only and the engine must not retain it.
pub trait InferenceEngine: Send + Sync {
    fn classify(&self, tensor: &InputTensor) -> Result<OutputVector, PipelineError>;
}

// ═══════════════════════════════════════════════════════════
// Model source
// ═══════════════════════════════════════════════════════════

/// Where the model bytes come from: a hosted artifact or a bundled file.
#[derive(Debug, Clone)]
pub enum ModelSource {
    Url(String),
    Path(std::path::PathBuf),
}

impl ModelSource {
    /// Fetch the raw model bytes.
    ///
    /// Every failure on this path — including a download timeout — is a
    /// [`PipelineError::ModelLoad`]: callers retry the whole load, there is
    /// no partial recovery.
    pub fn fetch(&self) -> Result<Vec<u8>, PipelineError> {
        match self {
            ModelSource::Url(url) => {
                let client = reqwest::blocking::Client::builder()
                    .timeout(std::time::Duration::from_secs(MODEL_FETCH_TIMEOUT_SECS))
                    .build()
                    .map_err(|e| {
                        PipelineError::ModelLoad(format!("Failed to build HTTP client: {e}"))
                    })?;

                let response = client.get(url).send().map_err(|e| {
                    if e.is_timeout() {
                        PipelineError::ModelLoad(format!(
                            "Model download timed out after {MODEL_FETCH_TIMEOUT_SECS}s: {url}"
                        ))
                    } else {
                        PipelineError::ModelLoad(format!("Model download failed: {e}"))
                    }
                })?;

                let status = response.status();
                if !status.is_success() {
                    return Err(PipelineError::ModelLoad(format!(
                        "Model download failed (HTTP {status}): {url}"
                    )));
                }

                let bytes = response
                    .bytes()
                    .map_err(|e| PipelineError::ModelLoad(format!("Model download failed: {e}")))?
                    .to_vec();

                if bytes.is_empty() {
                    return Err(PipelineError::ModelLoad(format!(
                        "Model download returned an empty body: {url}"
                    )));
                }
                Ok(bytes)
            }
            ModelSource::Path(path) => std::fs::read(path).map_err(|e| {
                PipelineError::ModelLoad(format!("Cannot read model at {}: {e}", path.display()))
            }),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// ModelManager — lazy, shared, never poisoned
// ═══════════════════════════════════════════════════════════

/// Single accessor for the process-wide model session.
///
/// The slot lock is held across construction, so concurrent first calls are
/// deduplicated: one caller loads, the rest wait on the lock and receive
/// the same `Arc`. On a failed load the slot stays empty and the error is
/// returned — the next call retries instead of reusing a broken session.
pub struct ModelManager<E> {
    loader: Box<dyn Fn() -> Result<E, PipelineError> + Send + Sync>,
    slot: Mutex<Option<Arc<E>>>,
}

impl<E> ModelManager<E> {
    pub fn new(
        loader: impl Fn() -> Result<E, PipelineError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            loader: Box::new(loader),
            slot: Mutex::new(None),
        }
    }

    /// Get the cached session, loading it on first use.
    pub fn session(&self) -> Result<Arc<E>, PipelineError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| PipelineError::ModelLoad("Session cache lock poisoned".into()))?;

        if let Some(session) = slot.as_ref() {
            return Ok(Arc::clone(session));
        }

        let engine = (self.loader)()?;
        let session = Arc::new(engine);
        *slot = Some(Arc::clone(&session));
        info!("Model session initialized");
        Ok(session)
    }

    /// Whether a session has been loaded and cached.
    pub fn is_loaded(&self) -> bool {
        self.slot.lock().map(|s| s.is_some()).unwrap_or(false)
    }
}

// ═══════════════════════════════════════════════════════════
// ONNX Runtime classifier — behind `onnx-runtime` feature
// ═══════════════════════════════════════════════════════════

#[cfg(feature = "onnx-runtime")]
mod onnx {
    use std::sync::Mutex;

    use ort::session::Session;
    use ort::value::TensorRef;
    use tracing::debug;

    use super::{InferenceEngine, ModelSource};
    use crate::pipeline::types::{InputTensor, OutputVector};
    use crate::pipeline::PipelineError;

    /// Real classifier backed by ONNX Runtime.
    ///
    /// Input/output names are read from the model's own declarations at
    /// load time — a model that declares none is rejected up front rather
    /// than failing on the first inference.
    ///
    /// Uses interior mutability (Mutex) because `ort::Session::run` requires
    /// `&mut self` but [`InferenceEngine`] exposes `&self` for shared usage.
    pub struct OrtClassifier {
        session: Mutex<Session>,
        input_name: String,
        output_name: String,
    }

    impl OrtClassifier {
        /// Construct a session from in-memory model bytes.
        pub fn from_bytes(model_bytes: &[u8]) -> Result<Self, PipelineError> {
            let session = Session::builder()
                .map_err(|e: ort::Error| PipelineError::ModelLoad(e.to_string()))?
                .with_intra_threads(2)
                .map_err(|e: ort::Error| PipelineError::ModelLoad(e.to_string()))?
                .commit_from_memory(model_bytes)
                .map_err(|e: ort::Error| {
                    PipelineError::ModelLoad(format!("ONNX session construction failed: {e}"))
                })?;

            let input_name = session
                .inputs
                .first()
                .map(|i| i.name.clone())
                .ok_or_else(|| {
                    PipelineError::ModelLoad("Model declares no inputs".into())
                })?;
            let output_name = session
                .outputs
                .first()
                .map(|o| o.name.clone())
                .ok_or_else(|| {
                    PipelineError::ModelLoad("Model declares no outputs".into())
                })?;

            tracing::info!(
                input = %input_name,
                output = %output_name,
                "ONNX classifier loaded"
            );

            Ok(Self {
                session: Mutex::new(session),
                input_name,
                output_name,
            })
        }

        /// Fetch model bytes from the source and construct the session.
        pub fn load(source: &ModelSource) -> Result<Self, PipelineError> {
            let bytes = source.fetch()?;
            Self::from_bytes(&bytes)
        }
    }

    impl InferenceEngine for OrtClassifier {
        fn classify(&self, tensor: &InputTensor) -> Result<OutputVector, PipelineError> {
            let [n, h, w, c] = tensor.shape();
            // The binding is f32 NHWC; a model expecting anything else fails
            // here instead of being silently coerced.
            let array = ndarray::Array4::from_shape_vec((n, h, w, c), tensor.data().to_vec())
                .map_err(|e| PipelineError::Inference(e.to_string()))?;
            let input = TensorRef::from_array_view(&array)
                .map_err(|e| PipelineError::Inference(e.to_string()))?;

            let mut session = self
                .session
                .lock()
                .map_err(|_| PipelineError::Inference("Session lock poisoned".into()))?;

            let outputs = session
                .run(ort::inputs![self.input_name.as_str() => input])
                .map_err(|e| PipelineError::Inference(format!("ONNX inference failed: {e}")))?;

            let (shape, data) = outputs[self.output_name.as_str()]
                .try_extract_tensor::<f32>()
                .map_err(|e| {
                    PipelineError::Inference(format!(
                        "Output '{}' extraction failed: {e}",
                        self.output_name
                    ))
                })?;

            debug!(output_shape = ?shape, values = data.len(), "Inference complete");
            Ok(OutputVector::new(data.to_vec()))
        }
    }
}

#[cfg(feature = "onnx-runtime")]
pub use onnx::OrtClassifier;

// ═══════════════════════════════════════════════════════════
// Mock engine (testing)
// ═══════════════════════════════════════════════════════════

/// Mock engine returning a configured vector or failure; counts calls.
pub struct MockEngine {
    output: Vec<f32>,
    fail: bool,
    calls: std::sync::atomic::AtomicUsize,
}

impl MockEngine {
    pub fn returning(output: Vec<f32>) -> Self {
        Self {
            output,
            fail: false,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            output: vec![],
            fail: true,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl InferenceEngine for MockEngine {
    fn classify(&self, _tensor: &InputTensor) -> Result<OutputVector, PipelineError> {
        self.calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if self.fail {
            return Err(PipelineError::Inference("Mock engine failure".into()));
        }
        Ok(OutputVector::new(self.output.clone()))
    }
}
