//! Wire types for the OncoStage chunked upload session protocol.
//!
//! The backend exposes three operations per upload: open a session,
//! put each chunk, and finalize the session into a durable file id.
//! This crate only describes the payloads; transport lives in
//! `oncostage-upload`.

pub mod constants;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use messages::{
    ApiErrorBody, ChunkAck, FinalizeRequest, FinalizeResponse, OpenSessionRequest,
    OpenSessionResponse,
};
pub use types::{ChunkState, FileCategory, ParseCategoryError, UploadStatus};
