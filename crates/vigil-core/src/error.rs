//! Shared error type across vigil crates.

use thiserror::Error;

/// Coarse error classes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid startup configuration (including instrument
    /// registration). Fatal.
    Configuration,
    /// A gauge callback failed during a collection pass.
    Collection,
    /// Malformed metadata reached a recording hook.
    Recording,
    /// Sampler start/stop misuse.
    Lifecycle,
    /// Internal invariant broken (e.g. poisoned lock).
    Internal,
}

impl ErrorKind {
    /// String representation used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Configuration => "CONFIGURATION",
            ErrorKind::Collection => "COLLECTION",
            ErrorKind::Recording => "RECORDING",
            ErrorKind::Lifecycle => "LIFECYCLE",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, VigilError>;

/// Unified error type used by core and server.
#[derive(Debug, Clone, Error)]
pub enum VigilError {
    #[error("invalid config: {0}")]
    Config(String),
    #[error("instrument already registered: {0}")]
    DuplicateInstrument(String),
    #[error("invalid instrument: {0}")]
    InvalidInstrument(String),
    #[error("invalid histogram boundaries: {0}")]
    InvalidBoundaries(String),
    #[error("recording skipped: {0}")]
    Recording(String),
    #[error("callback for {instrument} failed: {message}")]
    Callback { instrument: String, message: String },
    #[error("lifecycle: {0}")]
    Lifecycle(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl VigilError {
    /// Map the error onto its taxonomy class.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VigilError::Config(_)
            | VigilError::DuplicateInstrument(_)
            | VigilError::InvalidInstrument(_)
            | VigilError::InvalidBoundaries(_) => ErrorKind::Configuration,
            VigilError::Recording(_) => ErrorKind::Recording,
            VigilError::Callback { .. } => ErrorKind::Collection,
            VigilError::Lifecycle(_) => ErrorKind::Lifecycle,
            VigilError::Internal(_) => ErrorKind::Internal,
        }
    }
}
