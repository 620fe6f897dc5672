//! The scan classification pipeline.
//!
//! Data flows strictly forward: acquire -> preprocess -> infer -> decide.
//! Every stage fails fast with a tagged [`PipelineError`]; the orchestrator
//! folds failures into an invalid [`DiagnosisResult`] — no stage ever
//! substitutes a default diagnosis for an error.

pub mod types;
pub mod acquire;
pub mod preprocess;
pub mod inference;
pub mod decision;
pub mod orchestrator;

pub use types::*;
pub use acquire::*;
pub use preprocess::*;
pub use inference::*;
pub use decision::*;
pub use orchestrator::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Wrong media type, unreadable or undecodable payload, zero-dimension
    /// bitmap, or payload outside the size bounds.
    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    /// Remote scan download exceeded its bound.
    #[error("Fetch timed out after {seconds}s: {url}")]
    FetchTimeout { url: String, seconds: u64 },

    /// Remote scan download failed for a non-timeout reason.
    /// `status` is set when the server answered with a non-success code.
    #[error("Fetch failed: {message}")]
    Fetch {
        url: String,
        status: Option<u16>,
        message: String,
    },

    /// Decode succeeded but the bitmap could not be turned into a tensor.
    #[error("Preprocessing failed: {0}")]
    Preprocessing(String),

    /// Model byte fetch or session construction failed.
    /// Never cached — the next invocation retries the load.
    #[error("Model load failed: {0}")]
    ModelLoad(String),

    /// The session ran but its output could not be extracted as expected.
    #[error("Inference failed: {0}")]
    Inference(String),

    /// Output vector length does not match the class count.
    #[error("Expected {expected} class probabilities, got {actual}")]
    InvalidOutputShape { expected: usize, actual: usize },

    /// Output vector is unusable: non-finite values, or no class above zero.
    /// An all-zero vector is the signature of an upstream error path and is
    /// rejected here rather than arg-maxed into a spurious "normal".
    #[error("Degenerate output vector: {0}")]
    DegenerateOutput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// HTTP status carried by a [`PipelineError::Fetch`], if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Fetch { status, .. } => *status,
            _ => None,
        }
    }
}
