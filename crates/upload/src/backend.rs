//! Backend trait for the three-step upload protocol.
//!
//! The orchestrator only talks to this trait. [`HttpBackend`](crate::HttpBackend)
//! implements it over HTTPS; tests implement it with in-memory mocks.

use std::future::Future;
use std::pin::Pin;

use oncostage_protocol::{
    ChunkAck, FinalizeRequest, FinalizeResponse, OpenSessionRequest, OpenSessionResponse,
};
use oncostage_transfer::Chunk;

use crate::error::BackendError;

/// Boxed future returned by [`UploadBackend`] methods.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, BackendError>> + Send + 'a>>;

/// Abstract upload endpoint.
///
/// Implementations must be safe to call concurrently: several `put_chunk`
/// calls for the same session are in flight at once.
pub trait UploadBackend: Send + Sync {
    /// Opens a session for one file.
    fn open_session<'a>(
        &'a self,
        request: &'a OpenSessionRequest,
    ) -> BackendFuture<'a, OpenSessionResponse>;

    /// Sends one chunk. Re-sending an acknowledged index must be harmless.
    fn put_chunk<'a>(&'a self, session_id: &'a str, chunk: &'a Chunk)
    -> BackendFuture<'a, ChunkAck>;

    /// Asks the backend to assemble the acknowledged chunks.
    fn finalize<'a>(
        &'a self,
        session_id: &'a str,
        request: &'a FinalizeRequest,
    ) -> BackendFuture<'a, FinalizeResponse>;
}
