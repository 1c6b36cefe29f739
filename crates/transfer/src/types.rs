use bytes::Bytes;
use oncostage_protocol::{ChunkState, FileCategory, UploadStatus};

use crate::TransferError;
use crate::chunked::ChunkPlan;

/// A chunk of file data for transfer.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Position of this chunk within the session.
    pub index: u32,
    /// Byte offset within the file.
    pub offset: u64,
    /// Raw chunk data. Cloning shares the buffer.
    pub data: Bytes,
    /// SHA-256 hex checksum of `data`.
    pub checksum: String,
}

impl Chunk {
    /// Size of this chunk in bytes.
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Client-side record of one file's in-flight transfer.
///
/// Owned by a single upload invocation; nothing else mutates it.
#[derive(Debug, Clone)]
pub struct UploadSession {
    id: String,
    file_name: String,
    category: FileCategory,
    plan: ChunkPlan,
    status: UploadStatus,
    chunks: Vec<ChunkState>,
    acknowledged_bytes: u64,
    digest: Option<String>,
    error: String,
}

impl UploadSession {
    /// Creates a pending session with every chunk pending.
    pub fn new(id: String, file_name: String, category: FileCategory, plan: ChunkPlan) -> Self {
        Self {
            id,
            file_name,
            category,
            plan,
            status: UploadStatus::Pending,
            chunks: vec![ChunkState::Pending; plan.chunk_count() as usize],
            acknowledged_bytes: 0,
            digest: None,
            error: String::new(),
        }
    }

    /// Marks the session as in-progress.
    pub fn start(&mut self) {
        self.status = UploadStatus::InProgress;
    }

    /// Marks chunk `index` as sent and awaiting acknowledgement.
    pub fn mark_in_flight(&mut self, index: u32) -> Result<(), TransferError> {
        *self.slot(index)? = ChunkState::InFlight;
        Ok(())
    }

    /// Puts a chunk back to pending before a retry.
    pub fn mark_pending(&mut self, index: u32) -> Result<(), TransferError> {
        let slot = self.slot(index)?;
        if *slot != ChunkState::Acknowledged {
            *slot = ChunkState::Pending;
        }
        Ok(())
    }

    /// Records an acknowledgement and returns the bytes newly credited.
    ///
    /// A duplicate acknowledgement credits nothing.
    pub fn acknowledge(&mut self, index: u32) -> Result<u64, TransferError> {
        let len = self.plan.chunk_len(index)?;
        let slot = self.slot(index)?;
        if *slot == ChunkState::Acknowledged {
            return Ok(0);
        }
        *slot = ChunkState::Acknowledged;
        self.acknowledged_bytes += len;
        Ok(len)
    }

    /// Marks a chunk as having exhausted its retry budget.
    pub fn mark_failed(&mut self, index: u32) -> Result<(), TransferError> {
        *self.slot(index)? = ChunkState::Failed;
        Ok(())
    }

    /// Marks the session as finalizing and records the digest sent.
    pub fn begin_finalize(&mut self, digest: Option<String>) {
        self.status = UploadStatus::Finalizing;
        self.digest = digest;
    }

    /// Marks the session as completed.
    pub fn complete(&mut self) {
        self.status = UploadStatus::Completed;
    }

    /// Marks the session as failed with an error message.
    pub fn fail(&mut self, err: &str) {
        self.status = UploadStatus::Failed;
        self.error = err.to_string();
    }

    /// Marks the session as cancelled.
    pub fn cancel(&mut self) {
        self.status = UploadStatus::Cancelled;
    }

    /// Returns `true` when every chunk is acknowledged.
    pub fn all_acknowledged(&self) -> bool {
        self.chunks.iter().all(|c| *c == ChunkState::Acknowledged)
    }

    /// Number of chunks currently in `state`.
    pub fn count(&self, state: ChunkState) -> usize {
        self.chunks.iter().filter(|c| **c == state).count()
    }

    /// State of chunk `index`.
    pub fn chunk_state(&self, index: u32) -> Option<ChunkState> {
        self.chunks.get(index as usize).copied()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn category(&self) -> FileCategory {
        self.category
    }

    pub fn plan(&self) -> &ChunkPlan {
        &self.plan
    }

    pub fn status(&self) -> UploadStatus {
        self.status
    }

    /// Sum of the sizes of acknowledged chunks.
    pub fn acknowledged_bytes(&self) -> u64 {
        self.acknowledged_bytes
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    pub fn error(&self) -> &str {
        &self.error
    }

    fn slot(&mut self, index: u32) -> Result<&mut ChunkState, TransferError> {
        let count = self.plan.chunk_count();
        self.chunks
            .get_mut(index as usize)
            .ok_or(TransferError::ChunkOutOfRange { index, count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_session(total: u64, chunk_size: usize) -> UploadSession {
        UploadSession::new(
            "s1".into(),
            "slide.svs".into(),
            FileCategory::Pathology,
            ChunkPlan::new(total, chunk_size).unwrap(),
        )
    }

    #[test]
    fn new_session_is_pending() {
        let session = sample_session(10, 4);
        assert_eq!(session.status(), UploadStatus::Pending);
        assert_eq!(session.count(ChunkState::Pending), 3);
        assert_eq!(session.acknowledged_bytes(), 0);
        assert!(!session.all_acknowledged());
    }

    #[test]
    fn acknowledge_credits_chunk_sizes() {
        let mut session = sample_session(10, 4);
        session.start();
        assert_eq!(session.status(), UploadStatus::InProgress);

        session.mark_in_flight(2).unwrap();
        assert_eq!(session.chunk_state(2), Some(ChunkState::InFlight));
        assert_eq!(session.acknowledge(2).unwrap(), 2);
        assert_eq!(session.acknowledge(0).unwrap(), 4);
        assert_eq!(session.acknowledged_bytes(), 6);

        assert_eq!(session.acknowledge(1).unwrap(), 4);
        assert!(session.all_acknowledged());
        assert_eq!(session.acknowledged_bytes(), 10);
    }

    #[test]
    fn duplicate_acknowledge_credits_nothing() {
        let mut session = sample_session(10, 4);
        session.acknowledge(0).unwrap();
        assert_eq!(session.acknowledge(0).unwrap(), 0);
        assert_eq!(session.acknowledged_bytes(), 4);
    }

    #[test]
    fn mark_pending_never_downgrades_acknowledged() {
        let mut session = sample_session(10, 4);
        session.acknowledge(1).unwrap();
        session.mark_pending(1).unwrap();
        assert_eq!(session.chunk_state(1), Some(ChunkState::Acknowledged));

        session.mark_in_flight(0).unwrap();
        session.mark_pending(0).unwrap();
        assert_eq!(session.chunk_state(0), Some(ChunkState::Pending));
    }

    #[test]
    fn out_of_range_index_rejected() {
        let mut session = sample_session(10, 4);
        assert!(matches!(
            session.acknowledge(3),
            Err(TransferError::ChunkOutOfRange { index: 3, count: 3 })
        ));
        assert!(session.mark_in_flight(7).is_err());
        assert!(session.chunk_state(3).is_none());
    }

    #[test]
    fn empty_file_session_completes_with_zero_bytes() {
        let mut session = sample_session(0, 4);
        assert_eq!(session.plan().chunk_count(), 1);
        assert_eq!(session.acknowledge(0).unwrap(), 0);
        assert!(session.all_acknowledged());
    }

    #[test]
    fn finalize_and_complete() {
        let mut session = sample_session(4, 4);
        session.acknowledge(0).unwrap();
        session.begin_finalize(Some("abc".into()));
        assert_eq!(session.status(), UploadStatus::Finalizing);
        assert_eq!(session.digest(), Some("abc"));
        session.complete();
        assert!(session.status().is_terminal());
    }

    #[test]
    fn fail_records_error() {
        let mut session = sample_session(4, 4);
        session.start();
        session.mark_failed(0).unwrap();
        session.fail("chunk 0 rejected");
        assert_eq!(session.status(), UploadStatus::Failed);
        assert_eq!(session.error(), "chunk 0 rejected");
        assert_eq!(session.count(ChunkState::Failed), 1);
    }

    #[test]
    fn cancel_marks_cancelled() {
        let mut session = sample_session(4, 4);
        session.start();
        session.cancel();
        assert_eq!(session.status(), UploadStatus::Cancelled);
    }
}
