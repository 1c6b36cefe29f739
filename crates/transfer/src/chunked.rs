use std::sync::Arc;

use bytes::Bytes;
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use crate::digest::FileDigest;
use crate::source::{Origin, UploadFile};
use crate::types::Chunk;
use crate::{DEFAULT_CHUNK_SIZE, TransferError};

// ---------------------------------------------------------------------------
// Checksum helpers
// ---------------------------------------------------------------------------

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// ChunkPlan
// ---------------------------------------------------------------------------

/// Fixed split of a file into chunks, derived once per session.
///
/// A zero-byte file still has one (empty) chunk so the session has
/// something to acknowledge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    total_size: u64,
    chunk_size: u64,
    chunk_count: u32,
}

impl ChunkPlan {
    /// Plans `total_size` bytes in chunks of `chunk_size`.
    ///
    /// If `chunk_size` is 0, [`DEFAULT_CHUNK_SIZE`] is used.
    pub fn new(total_size: u64, chunk_size: usize) -> Result<Self, TransferError> {
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        } as u64;

        let count = if total_size == 0 {
            1
        } else {
            total_size.div_ceil(chunk_size)
        };
        let chunk_count = u32::try_from(count).map_err(|_| {
            TransferError::InvalidSource(format!(
                "{total_size} bytes needs {count} chunks of {chunk_size} bytes"
            ))
        })?;

        Ok(Self {
            total_size,
            chunk_size,
            chunk_count,
        })
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn chunk_count(&self) -> u32 {
        self.chunk_count
    }

    /// Byte offset of chunk `index`.
    pub fn chunk_offset(&self, index: u32) -> Result<u64, TransferError> {
        self.check_index(index)?;
        Ok(index as u64 * self.chunk_size)
    }

    /// Length of chunk `index`; only the last chunk may be short.
    pub fn chunk_len(&self, index: u32) -> Result<u64, TransferError> {
        let offset = self.chunk_offset(index)?;
        Ok((self.total_size - offset).min(self.chunk_size))
    }

    fn check_index(&self, index: u32) -> Result<(), TransferError> {
        if index >= self.chunk_count {
            return Err(TransferError::ChunkOutOfRange {
                index,
                count: self.chunk_count,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ChunkReader
// ---------------------------------------------------------------------------

enum Input {
    File(tokio::fs::File),
    Memory(Arc<[u8]>),
}

/// Reads a source strictly in chunk order, attaching a SHA-256 checksum to
/// every chunk and feeding the whole-file MD5 as it goes.
///
/// Each byte is read exactly once.
pub struct ChunkReader {
    input: Input,
    plan: ChunkPlan,
    next_index: u32,
    digest: FileDigest,
}

impl ChunkReader {
    /// Opens `file` for chunked reading according to `plan`.
    pub async fn open(file: &UploadFile, plan: ChunkPlan) -> Result<Self, TransferError> {
        if plan.total_size() != file.size() {
            return Err(TransferError::InvalidSource(format!(
                "plan covers {} bytes but {} has {}",
                plan.total_size(),
                file.name(),
                file.size()
            )));
        }

        let input = match file.origin() {
            Origin::Path(path) => Input::File(tokio::fs::File::open(path).await?),
            Origin::Memory(data) => Input::Memory(Arc::clone(data)),
        };

        Ok(Self {
            input,
            plan,
            next_index: 0,
            digest: FileDigest::new(),
        })
    }

    /// Reads the next chunk. Returns `None` once every planned chunk was read.
    pub async fn next_chunk(&mut self) -> Result<Option<Chunk>, TransferError> {
        if self.next_index >= self.plan.chunk_count() {
            return Ok(None);
        }

        let index = self.next_index;
        let offset = self.plan.chunk_offset(index)?;
        let len = self.plan.chunk_len(index)? as usize;
        let is_last = index + 1 == self.plan.chunk_count();

        let data = match &mut self.input {
            Input::Memory(bytes) => {
                let start = offset as usize;
                Bytes::copy_from_slice(&bytes[start..start + len])
            }
            Input::File(file) => {
                let mut buf = vec![0u8; len];
                let mut filled = 0;
                while filled < len {
                    let n = file.read(&mut buf[filled..]).await?;
                    if n == 0 {
                        return Err(TransferError::SizeMismatch {
                            expected: self.plan.total_size(),
                            actual: offset + filled as u64,
                        });
                    }
                    filled += n;
                }

                if is_last {
                    // A file that grew after planning would be silently cut.
                    let mut probe = [0u8; 1];
                    let extra = file.read(&mut probe).await?;
                    if extra > 0 {
                        return Err(TransferError::SizeMismatch {
                            expected: self.plan.total_size(),
                            actual: self.plan.total_size() + extra as u64,
                        });
                    }
                }
                Bytes::from(buf)
            }
        };

        self.digest.update(&data);
        self.next_index += 1;

        let checksum = checksum_bytes(&data);
        Ok(Some(Chunk {
            index,
            offset,
            data,
            checksum,
        }))
    }

    /// The plan this reader follows.
    pub fn plan(&self) -> &ChunkPlan {
        &self.plan
    }

    /// Number of chunks not yet read.
    pub fn remaining_chunks(&self) -> u32 {
        self.plan.chunk_count() - self.next_index
    }

    /// Consumes the reader and returns the MD5 hex of everything read.
    ///
    /// Fails if chunks remain unread, since the digest would be partial.
    pub fn finish_digest(self) -> Result<String, TransferError> {
        if self.remaining_chunks() > 0 {
            return Err(TransferError::InvalidSource(format!(
                "digest requested with {} chunks unread",
                self.remaining_chunks()
            )));
        }
        Ok(self.digest.finalize())
    }
}
