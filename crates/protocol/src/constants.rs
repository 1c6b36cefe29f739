use std::time::Duration;

/// Collection path for upload sessions, relative to the API base URL.
pub const UPLOADS_PATH: &str = "/files/uploads";

/// Path segment under a session for chunk transfers.
pub const CHUNKS_SEGMENT: &str = "chunks";

/// Path segment under a session for the commit step.
pub const FINALIZE_SEGMENT: &str = "finalize";

/// Header carrying the SHA-256 hex checksum of a chunk body.
pub const CHUNK_CHECKSUM_HEADER: &str = "X-Chunk-Checksum";

/// Content type of raw chunk bodies.
pub const CHUNK_CONTENT_TYPE: &str = "application/octet-stream";

/// Timeout for JSON request/response operations (open, finalize).
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for a single chunk transfer.
///
/// Chunks of several MiB over a slow clinical network can take far longer
/// than a JSON round trip.
pub const CHUNK_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Smallest chunk size the backend accepts (1 MiB).
pub const MIN_CHUNK_SIZE: usize = 1024 * 1024;

/// Largest chunk size the backend accepts (64 MiB).
pub const MAX_CHUNK_SIZE: usize = 64 * 1024 * 1024;
