//! Upload configuration, events and results.

use std::time::Duration;

use oncostage_protocol::constants::{MAX_CHUNK_SIZE, MIN_CHUNK_SIZE};
use oncostage_transfer::DEFAULT_CHUNK_SIZE;

use crate::error::FailureReason;
use crate::retry::RetryPolicy;

/// Default number of chunks in flight per file.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Upper bound on chunks in flight per file.
pub const MAX_CONCURRENCY: usize = 16;

/// Tunables for one orchestrator.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Bytes per chunk, clamped to the backend's accepted range.
    pub chunk_size: usize,
    /// Chunks in flight at once for a single file.
    pub concurrency: usize,
    /// Retry budget applied to each chunk.
    pub retry: RetryPolicy,
    /// Attempts allowed for the finalize call.
    pub finalize_attempts: u32,
    /// Hash the file before opening the session so the backend can
    /// deduplicate. Costs one extra read of the file.
    pub prehash_digest: bool,
    /// Identity sent as `uploader` when opening a session.
    pub uploader: String,
    /// Capacity of the event channel used by [`UploadTask`](crate::UploadTask).
    pub event_buffer: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
            finalize_attempts: 3,
            prehash_digest: false,
            uploader: String::new(),
            event_buffer: 256,
        }
    }
}

impl UploadConfig {
    /// Returns a copy with every field forced into its valid range.
    pub fn normalized(mut self) -> Self {
        self.chunk_size = self.chunk_size.clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE);
        self.concurrency = self.concurrency.clamp(1, MAX_CONCURRENCY);
        self.retry.max_attempts = self.retry.max_attempts.max(1);
        self.finalize_attempts = self.finalize_attempts.max(1);
        self.event_buffer = self.event_buffer.max(1);
        self
    }
}

/// Events emitted while a file uploads.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    SessionOpened {
        session_id: String,
        chunk_count: u32,
        chunk_size: u64,
    },
    ChunkAcknowledged {
        index: u32,
        bytes: u64,
    },
    ChunkRetry {
        index: u32,
        attempt: u32,
        delay: Duration,
    },
    /// Monotonic integer percentage; never repeats a value.
    Progress {
        percent: u8,
        bytes_acknowledged: u64,
        total_bytes: u64,
        bytes_per_second: f64,
    },
    Finalizing,
    Completed {
        file_id: String,
    },
    Failed {
        reason: FailureReason,
        error: String,
    },
    Cancelled,
}

/// A successfully uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub file_id: String,
    pub file_name: String,
    pub file_size: u64,
    pub session_id: String,
    /// Hex MD5 sent to the backend.
    pub digest: String,
    /// The backend already had this content; no chunks were sent.
    pub deduplicated: bool,
}
