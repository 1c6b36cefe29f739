//! Chunked file upload to the OncoStage files API.
//!
//! A library crate with no UI dependencies. The orchestrator talks to an
//! [`UploadBackend`]; [`HttpBackend`] is the production implementation and
//! tests substitute in-memory mocks.
//!
//! # Pipeline
//!
//! 1. **Open** - register the file with the backend and get a session id
//! 2. **Transfer** - send chunks with bounded concurrency and per-chunk retry
//! 3. **Finalize** - commit the session with the whole-file digest

pub mod backend;
pub mod error;
pub mod files_api;
pub mod http;
pub mod orchestrator;
pub mod retry;
pub mod types;

pub use backend::{BackendFuture, UploadBackend};
pub use error::{BackendError, FailureReason, UploadError};
pub use files_api::{BatchEntry, FilesApi, completed_file_ids};
pub use http::HttpBackend;
pub use orchestrator::{UploadOrchestrator, UploadTask};
pub use retry::RetryPolicy;
pub use types::{DEFAULT_CONCURRENCY, MAX_CONCURRENCY, UploadConfig, UploadEvent, UploadResult};
