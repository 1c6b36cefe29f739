//! Callback-style facade over the orchestrator.
//!
//! `upload_file` takes an `on_progress(percent)` closure and resolves to the
//! file id. `upload_batch` runs several files with a per-batch parallelism
//! limit and reports progress per file name.

use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream;
use oncostage_protocol::FileCategory;
use oncostage_transfer::UploadFile;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::backend::UploadBackend;
use crate::error::{BackendError, UploadError};
use crate::http::HttpBackend;
use crate::orchestrator::UploadOrchestrator;
use crate::types::{UploadConfig, UploadEvent, UploadResult};

/// Outcome of one file in a batch.
#[derive(Debug)]
pub struct BatchEntry {
    pub file_name: String,
    pub result: Result<UploadResult, UploadError>,
}

/// Client for the files API.
#[derive(Clone)]
pub struct FilesApi {
    orchestrator: UploadOrchestrator,
}

impl FilesApi {
    pub fn new(backend: Arc<dyn UploadBackend>, config: UploadConfig) -> Self {
        Self {
            orchestrator: UploadOrchestrator::new(backend, config),
        }
    }

    /// Builds a client backed by [`HttpBackend`].
    pub fn http(
        base_url: &str,
        api_token: Option<&str>,
        config: UploadConfig,
    ) -> Result<Self, BackendError> {
        let backend = HttpBackend::new(base_url, api_token)?;
        Ok(Self::new(Arc::new(backend), config))
    }

    /// Uploads one file and returns its file id.
    ///
    /// `on_progress` receives strictly increasing percentages, ending at 100
    /// on success.
    pub async fn upload_file<F>(
        &self,
        file: &UploadFile,
        category: FileCategory,
        on_progress: F,
    ) -> Result<String, UploadError>
    where
        F: Fn(u8),
    {
        let cancel = CancellationToken::new();
        self.upload_file_with_cancel(file, category, &cancel, on_progress)
            .await
            .map(|done| done.file_id)
    }

    /// Like [`upload_file`](Self::upload_file), but stops when `cancel` fires.
    ///
    /// No progress is reported once cancellation has been observed.
    pub async fn upload_file_with_cancel<F>(
        &self,
        file: &UploadFile,
        category: FileCategory,
        cancel: &CancellationToken,
        on_progress: F,
    ) -> Result<UploadResult, UploadError>
    where
        F: Fn(u8),
    {
        let (events_tx, mut events_rx) = mpsc::channel(self.orchestrator.config().event_buffer);

        let upload = async move {
            self.orchestrator
                .upload(file, category, cancel, &events_tx)
                .await
        };
        let forward = async {
            while let Some(event) = events_rx.recv().await {
                if let UploadEvent::Progress { percent, .. } = event {
                    if !cancel.is_cancelled() {
                        on_progress(percent);
                    }
                }
            }
        };

        let (result, ()) = tokio::join!(upload, forward);
        result
    }

    /// Uploads `files` with at most `max_parallel_files` running at once.
    ///
    /// Entries come back in input order. One file failing does not stop
    /// the others; cancelling `cancel` stops all of them.
    pub async fn upload_batch<F>(
        &self,
        files: &[UploadFile],
        category: FileCategory,
        max_parallel_files: usize,
        cancel: &CancellationToken,
        on_progress: F,
    ) -> Vec<BatchEntry>
    where
        F: Fn(&str, u8),
    {
        let on_progress = &on_progress;
        let entries: Vec<BatchEntry> = stream::iter(files)
            .map(|file| async move {
                let result = self
                    .upload_file_with_cancel(file, category, cancel, |percent| {
                        on_progress(file.name(), percent)
                    })
                    .await;
                BatchEntry {
                    file_name: file.name().to_string(),
                    result,
                }
            })
            .buffered(max_parallel_files.max(1))
            .collect()
            .await;

        let succeeded = entries.iter().filter(|e| e.result.is_ok()).count();
        info!(
            files = entries.len(),
            succeeded,
            failed = entries.len() - succeeded,
            "batch finished"
        );
        entries
    }
}

/// File ids of the successful entries, keyed by file name.
pub fn completed_file_ids(entries: &[BatchEntry]) -> Vec<(&str, &str)> {
    entries
        .iter()
        .filter_map(|e| match &e.result {
            Ok(done) => Some((e.file_name.as_str(), done.file_id.as_str())),
            Err(_) => None,
        })
        .collect()
}
