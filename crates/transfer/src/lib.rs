//! Chunked upload primitives: chunk planning, sequential chunk reading with
//! a single-pass file digest, the per-session chunk status table and
//! monotonic progress accounting.

mod chunked;
mod digest;
mod progress;
mod source;
mod types;

pub use chunked::{ChunkPlan, ChunkReader, checksum_bytes};
pub use digest::{FileDigest, digest_bytes, digest_source};
pub use progress::{ProgressAccountant, SpeedCalculator};
pub use source::UploadFile;
pub use types::{Chunk, UploadSession};

/// Default chunk size: 5 MiB.
///
/// A 4 GiB whole-slide image yields ~820 chunk requests at this size.
pub const DEFAULT_CHUNK_SIZE: usize = 5 * 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("source size changed: expected {expected} bytes, read {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("invalid source: {0}")]
    InvalidSource(String),

    #[error("chunk index {index} out of range (chunk count {count})")]
    ChunkOutOfRange { index: u32, count: u32 },
}
