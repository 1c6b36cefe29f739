//! Upload error types.

use oncostage_transfer::TransferError;

/// Errors returned by an [`UploadBackend`](crate::UploadBackend).
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl BackendError {
    /// Returns `true` for failures worth retrying: network errors,
    /// timeouts, 5xx, 408 and 429.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            Self::Api { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            Self::Transport(_) => true,
            Self::Json(_) | Self::Protocol(_) => false,
        }
    }
}

/// Why an upload ended without a file id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    SessionOpenFailed,
    ChunkFailed { chunk_index: u32 },
    FinalizeFailed,
    Cancelled,
    Source,
    Internal,
}

/// Errors produced by a file upload.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("could not open upload session: {0}")]
    SessionOpenFailed(#[source] BackendError),

    #[error("chunk {chunk_index} failed after {attempts} attempt(s): {source}")]
    ChunkFailed {
        chunk_index: u32,
        attempts: u32,
        #[source]
        source: BackendError,
    },

    #[error("finalize failed after {attempts} attempt(s): {source}")]
    FinalizeFailed {
        attempts: u32,
        #[source]
        source: BackendError,
    },

    #[error("cancelled")]
    Cancelled,

    #[error("source error: {0}")]
    Source(#[from] TransferError),

    #[error("upload task failed: {0}")]
    Task(String),
}

impl UploadError {
    pub fn reason(&self) -> FailureReason {
        match self {
            Self::SessionOpenFailed(_) => FailureReason::SessionOpenFailed,
            Self::ChunkFailed { chunk_index, .. } => FailureReason::ChunkFailed {
                chunk_index: *chunk_index,
            },
            Self::FinalizeFailed { .. } => FailureReason::FinalizeFailed,
            Self::Cancelled => FailureReason::Cancelled,
            Self::Source(_) => FailureReason::Source,
            Self::Task(_) => FailureReason::Internal,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
