use std::io;
use thiserror::Error;

/// A long-running computation observed its cancellation token.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("computation cancelled before completion")]
pub struct Cancelled;

/// Errors from the code-construction searches (Gallager, GCE, RCJ, Hamming).
///
/// Running out of iterations is not an error: searches report that as
/// `Ok(None)` so the caller can retry with a different budget or seed.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("unable to create generator for H matrix: {0}")]
    Build(BuildError),
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl From<BuildError> for SearchError {
    fn from(err: BuildError) -> Self {
        match err {
            BuildError::Cancelled(cancelled) => SearchError::Cancelled(cancelled),
            other => SearchError::Build(other),
        }
    }
}

/// Errors from deriving a systematic generator out of a parity-check matrix.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("row reduced matrix does not begin with an identity block")]
    NotSystematic,
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// Errors from the persistence layer for codes and simulation results.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("result file was produced by a different decoder: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },
    #[error("result file does not match the loaded code: expected digest {expected}, found {found}")]
    CodeMismatch { expected: String, found: String },
    #[error("error reading or writing JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}
