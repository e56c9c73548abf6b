//! Error types for the cin-core library.

use thiserror::Error;

/// Main error type for the cin library.
///
/// Only total input unusability fails a run. Fields that cannot be found are
/// reported as `null` in a successful record, never as an error.
#[derive(Error, Debug)]
pub enum CinError {
    /// The OCR result has no non-whitespace content.
    #[error("image unreadable: OCR produced no text")]
    EmptyInput,

    /// The OCR collaborator reported a failure; passed through unchanged.
    #[error("OCR error: {0}")]
    UpstreamOcr(#[from] OcrError),

    /// The host deadline had already passed when the OCR call returned.
    #[error("deadline exceeded before extraction started")]
    Cancelled,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors reported by OCR engines.
#[derive(Error, Debug)]
pub enum OcrError {
    /// The engine is not installed or not configured.
    #[error("OCR engine unavailable: {0}")]
    Unavailable(String),

    /// The engine ran but reported a failure.
    #[error("{engine} failed: {message}")]
    Engine { engine: String, message: String },

    /// The uploaded bytes are not an image the engine can read.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// I/O error while talking to the engine.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OcrError {
    /// Create an engine failure.
    pub fn engine(engine: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Engine {
            engine: engine.into(),
            message: message.into(),
        }
    }
}

/// Result type for the cin library.
pub type Result<T> = std::result::Result<T, CinError>;
