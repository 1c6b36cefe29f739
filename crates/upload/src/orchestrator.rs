//! Single-file upload orchestrator.
//!
//! Opens a session, streams chunks with bounded concurrency and per-chunk
//! retry, then finalizes. Progress and lifecycle events go out on an mpsc
//! channel; cancellation is a [`CancellationToken`].

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use oncostage_protocol::{ChunkAck, ChunkState, FileCategory, FinalizeRequest, OpenSessionRequest};
use oncostage_transfer::{
    Chunk, ChunkPlan, ChunkReader, ProgressAccountant, SpeedCalculator, TransferError, UploadFile,
    UploadSession, digest_source,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backend::UploadBackend;
use crate::error::{BackendError, UploadError};
use crate::types::{UploadConfig, UploadEvent, UploadResult};

/// Work queued for one chunk slot.
enum ChunkJob {
    Send { chunk: Chunk, attempt: u32 },
    Backoff { chunk: Chunk, attempt: u32, delay: Duration },
}

/// What a finished [`ChunkJob`] produced.
enum ChunkStep {
    Sent {
        chunk: Chunk,
        attempt: u32,
        outcome: Result<ChunkAck, BackendError>,
    },
    /// Backoff elapsed; `attempt` is the number of the next send.
    Due { chunk: Chunk, attempt: u32 },
}

/// Uploads files through an [`UploadBackend`].
///
/// Cheap to clone; clones share the backend.
#[derive(Clone)]
pub struct UploadOrchestrator {
    backend: Arc<dyn UploadBackend>,
    config: UploadConfig,
}

impl UploadOrchestrator {
    /// Creates an orchestrator. `config` is normalized first.
    pub fn new(backend: Arc<dyn UploadBackend>, config: UploadConfig) -> Self {
        Self {
            backend,
            config: config.normalized(),
        }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Spawns the upload of one file on the current runtime.
    ///
    /// The returned task owns the event receiver and the cancellation
    /// token. Dropping the task cancels the upload.
    pub fn start(&self, file: UploadFile, category: FileCategory) -> UploadTask {
        let (events_tx, events_rx) = mpsc::channel(self.config.event_buffer);
        let cancel = CancellationToken::new();

        let orchestrator = self.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            orchestrator
                .upload(&file, category, &token, &events_tx)
                .await
        });

        UploadTask {
            events: Some(events_rx),
            guard: cancel.clone().drop_guard(),
            cancel,
            handle,
        }
    }

    /// Uploads one file and returns its durable file id.
    ///
    /// Events are sent via `events_tx`; a full channel pauses the upload
    /// until the receiver catches up. A closed channel is ignored. At most
    /// one terminal event (`Completed`, `Failed` or `Cancelled`) is sent
    /// last. Once cancelled, the terminal event is only sent if the channel
    /// has room.
    pub async fn upload(
        &self,
        file: &UploadFile,
        category: FileCategory,
        cancel: &CancellationToken,
        events_tx: &mpsc::Sender<UploadEvent>,
    ) -> Result<UploadResult, UploadError> {
        let result = self.run(file, category, cancel, events_tx).await;

        let terminal = match &result {
            Ok(done) => {
                info!(
                    file = %done.file_name,
                    file_id = %done.file_id,
                    bytes = done.file_size,
                    deduplicated = done.deduplicated,
                    "upload completed"
                );
                UploadEvent::Completed {
                    file_id: done.file_id.clone(),
                }
            }
            Err(UploadError::Cancelled) => {
                info!(file = %file.name(), "upload cancelled");
                UploadEvent::Cancelled
            }
            Err(e) => {
                error!(file = %file.name(), error = %e, "upload failed");
                UploadEvent::Failed {
                    reason: e.reason(),
                    error: e.to_string(),
                }
            }
        };
        emit_terminal(cancel, events_tx, terminal).await;

        result
    }

    async fn run(
        &self,
        file: &UploadFile,
        category: FileCategory,
        cancel: &CancellationToken,
        events_tx: &mpsc::Sender<UploadEvent>,
    ) -> Result<UploadResult, UploadError> {
        check_cancelled(cancel)?;
        let plan = ChunkPlan::new(file.size(), self.config.chunk_size)?;

        let prehashed = if self.config.prehash_digest {
            let digest = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(UploadError::Cancelled),
                digest = digest_source(file) => digest?,
            };
            Some(digest)
        } else {
            None
        };

        // Local read errors surface before the backend hears about the file.
        let mut reader = ChunkReader::open(file, plan).await?;

        let request = OpenSessionRequest {
            category,
            file_name: file.name().to_string(),
            total_size: plan.total_size(),
            chunk_size: plan.chunk_size(),
            chunk_count: plan.chunk_count(),
            digest: prehashed.clone(),
            uploader: self.config.uploader.clone(),
            client_attempt_id: Uuid::new_v4().to_string(),
        };

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UploadError::Cancelled),
            opened = self.backend.open_session(&request) => {
                opened.map_err(UploadError::SessionOpenFailed)?
            }
        };
        if opened.session_id.is_empty() {
            return Err(UploadError::SessionOpenFailed(BackendError::Protocol(
                "backend returned an empty session id".into(),
            )));
        }

        info!(
            session = %opened.session_id,
            file = %file.name(),
            %category,
            bytes = plan.total_size(),
            chunks = plan.chunk_count(),
            "upload session opened"
        );

        let mut session = UploadSession::new(
            opened.session_id.clone(),
            file.name().to_string(),
            category,
            plan,
        );
        session.start();
        emit(
            cancel,
            events_tx,
            UploadEvent::SessionOpened {
                session_id: opened.session_id.clone(),
                chunk_count: plan.chunk_count(),
                chunk_size: plan.chunk_size(),
            },
        )
        .await?;

        let mut progress = ProgressAccountant::new(plan.total_size(), plan.chunk_count());

        match (opened.existing_file_id, &prehashed) {
            (Some(file_id), Some(digest)) => {
                info!(session = %session.id(), file_id = %file_id, "backend already holds this content");
                if let Some(percent) = progress.finish() {
                    emit(cancel, events_tx, progress_event(&progress, percent, 0.0)).await?;
                }
                session.complete();
                return Ok(UploadResult {
                    file_id,
                    file_name: file.name().to_string(),
                    file_size: file.size(),
                    session_id: session.id().to_string(),
                    digest: digest.clone(),
                    deduplicated: true,
                });
            }
            (Some(_), None) => {
                warn!(session = %session.id(), "ignoring existing file id offered without a digest");
            }
            (None, _) => {}
        }

        if let Some(percent) = progress.begin() {
            emit(cancel, events_tx, progress_event(&progress, percent, 0.0)).await?;
        }

        if let Err(e) = self
            .transmit(&mut session, &mut reader, &mut progress, cancel, events_tx)
            .await
        {
            match &e {
                UploadError::Cancelled => session.cancel(),
                other => session.fail(&other.to_string()),
            }
            debug!(session = %session.id(), status = ?session.status(), "transfer stopped");
            return Err(e);
        }

        let streamed = reader.finish_digest()?;
        let digest = match prehashed {
            Some(pre) if pre != streamed => {
                return Err(TransferError::InvalidSource(format!(
                    "{} changed between hashing and transfer",
                    file.name()
                ))
                .into());
            }
            _ => streamed,
        };

        if !session.all_acknowledged() {
            return Err(UploadError::FinalizeFailed {
                attempts: 0,
                source: BackendError::Protocol(format!(
                    "{} of {} chunks unacknowledged",
                    session.plan().chunk_count() as usize - session.count(ChunkState::Acknowledged),
                    session.plan().chunk_count()
                )),
            });
        }
        session.begin_finalize(Some(digest.clone()));
        emit(cancel, events_tx, UploadEvent::Finalizing).await?;
        let file_id = self.finalize(session.id(), &digest, cancel).await?;
        session.complete();

        Ok(UploadResult {
            file_id,
            file_name: file.name().to_string(),
            file_size: file.size(),
            session_id: session.id().to_string(),
            digest,
            deduplicated: false,
        })
    }

    /// Sends every chunk, keeping at most `concurrency` chunks in flight or
    /// waiting out a retry delay.
    ///
    /// `session` tracks each chunk: in flight while a request is out,
    /// pending during a retry delay, then acknowledged or failed. Returning
    /// early drops the outstanding jobs, which aborts their requests.
    async fn transmit(
        &self,
        session: &mut UploadSession,
        reader: &mut ChunkReader,
        progress: &mut ProgressAccountant,
        cancel: &CancellationToken,
        events_tx: &mpsc::Sender<UploadEvent>,
    ) -> Result<(), UploadError> {
        let session_id = session.id().to_string();
        let policy = &self.config.retry;
        let mut speed = SpeedCalculator::default();
        speed.add_sample(0);

        let mut jobs = FuturesUnordered::new();
        let mut exhausted = false;

        loop {
            while !exhausted && jobs.len() < self.config.concurrency {
                check_cancelled(cancel)?;
                match reader.next_chunk().await? {
                    Some(chunk) => {
                        session.mark_in_flight(chunk.index)?;
                        debug!(
                            session = %session_id,
                            chunk = chunk.index,
                            bytes = chunk.len(),
                            "sending chunk"
                        );
                        jobs.push(self.run_job(&session_id, ChunkJob::Send { chunk, attempt: 1 }));
                    }
                    None => exhausted = true,
                }
            }

            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(UploadError::Cancelled),
                step = jobs.next() => step,
            };
            let Some(step) = step else {
                break;
            };

            match step {
                ChunkStep::Due { chunk, attempt } => {
                    session.mark_in_flight(chunk.index)?;
                    debug!(session = %session_id, chunk = chunk.index, attempt, "resending chunk");
                    jobs.push(self.run_job(&session_id, ChunkJob::Send { chunk, attempt }));
                }
                ChunkStep::Sent {
                    outcome: Ok(ack), ..
                } => {
                    let bytes = session.acknowledge(ack.index)?;
                    speed.add_sample(bytes);
                    emit(
                        cancel,
                        events_tx,
                        UploadEvent::ChunkAcknowledged {
                            index: ack.index,
                            bytes,
                        },
                    )
                    .await?;

                    let acknowledged = session.count(ChunkState::Acknowledged) as u32;
                    if let Some(percent) = progress.observe(session.acknowledged_bytes(), acknowledged)
                    {
                        let event = progress_event(progress, percent, speed.bytes_per_second());
                        emit(cancel, events_tx, event).await?;
                    }
                }
                ChunkStep::Sent {
                    chunk,
                    attempt,
                    outcome: Err(error),
                } => {
                    if !error.is_transient() || !policy.allows_retry(attempt) {
                        warn!(
                            session = %session_id,
                            chunk = chunk.index,
                            attempts = attempt,
                            error = %error,
                            "chunk failed"
                        );
                        session.mark_failed(chunk.index)?;
                        return Err(UploadError::ChunkFailed {
                            chunk_index: chunk.index,
                            attempts: attempt,
                            source: error,
                        });
                    }

                    session.mark_pending(chunk.index)?;
                    let delay = policy.delay_for_attempt(attempt);
                    warn!(
                        session = %session_id,
                        chunk = chunk.index,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "chunk failed, retrying"
                    );
                    emit(
                        cancel,
                        events_tx,
                        UploadEvent::ChunkRetry {
                            index: chunk.index,
                            attempt,
                            delay,
                        },
                    )
                    .await?;
                    jobs.push(self.run_job(
                        &session_id,
                        ChunkJob::Backoff {
                            chunk,
                            attempt: attempt + 1,
                            delay,
                        },
                    ));
                }
            }
        }

        Ok(())
    }

    /// Runs one send attempt or one retry delay.
    async fn run_job(&self, session_id: &str, job: ChunkJob) -> ChunkStep {
        match job {
            ChunkJob::Send { chunk, attempt } => {
                let outcome = match self.backend.put_chunk(session_id, &chunk).await {
                    Ok(ack) => check_ack(session_id, &chunk, ack),
                    Err(e) => Err(e),
                };
                ChunkStep::Sent {
                    chunk,
                    attempt,
                    outcome,
                }
            }
            ChunkJob::Backoff {
                chunk,
                attempt,
                delay,
            } => {
                tokio::time::sleep(delay).await;
                ChunkStep::Due { chunk, attempt }
            }
        }
    }

    /// Commits the session, retrying transient failures.
    async fn finalize(
        &self,
        session_id: &str,
        digest: &str,
        cancel: &CancellationToken,
    ) -> Result<String, UploadError> {
        let request = FinalizeRequest {
            digest: Some(digest.to_string()),
        };
        let max_attempts = self.config.finalize_attempts;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(UploadError::Cancelled),
                outcome = self.backend.finalize(session_id, &request) => outcome,
            };

            let error = match outcome {
                Ok(resp) if !resp.file_id.is_empty() => return Ok(resp.file_id),
                Ok(_) => BackendError::Protocol("finalize returned an empty file id".into()),
                Err(e) => e,
            };

            if !error.is_transient() || attempt >= max_attempts {
                return Err(UploadError::FinalizeFailed {
                    attempts: attempt,
                    source: error,
                });
            }

            let delay = self.config.retry.delay_for_attempt(attempt);
            warn!(
                session = %session_id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "finalize failed, retrying"
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(UploadError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

/// Handle to an upload spawned with [`UploadOrchestrator::start`].
pub struct UploadTask {
    events: Option<mpsc::Receiver<UploadEvent>>,
    cancel: CancellationToken,
    guard: DropGuard,
    handle: JoinHandle<Result<UploadResult, UploadError>>,
}

impl UploadTask {
    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<UploadEvent>> {
        self.events.take()
    }

    /// Returns a cancellation token for this upload.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the upload to end.
    ///
    /// An events receiver that was never taken is dropped first so the
    /// upload cannot stall on a full channel.
    pub async fn join(self) -> Result<UploadResult, UploadError> {
        let Self {
            events,
            guard,
            handle,
            ..
        } = self;
        drop(events);

        let joined = handle.await;
        let _ = guard.disarm();
        match joined {
            Ok(result) => result,
            Err(e) => Err(UploadError::Task(e.to_string())),
        }
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), UploadError> {
    if cancel.is_cancelled() {
        Err(UploadError::Cancelled)
    } else {
        Ok(())
    }
}

/// Sends an event unless the upload was cancelled.
async fn emit(
    cancel: &CancellationToken,
    events_tx: &mpsc::Sender<UploadEvent>,
    event: UploadEvent,
) -> Result<(), UploadError> {
    check_cancelled(cancel)?;
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(UploadError::Cancelled),
        _ = events_tx.send(event) => Ok(()),
    }
}

/// Sends the terminal event, without waiting for room once cancelled.
async fn emit_terminal(
    cancel: &CancellationToken,
    events_tx: &mpsc::Sender<UploadEvent>,
    event: UploadEvent,
) {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            let _ = events_tx.try_send(event);
        }
        permit = events_tx.reserve() => {
            if let Ok(permit) = permit {
                permit.send(event);
            }
        }
    }
}

fn progress_event(progress: &ProgressAccountant, percent: u8, bytes_per_second: f64) -> UploadEvent {
    UploadEvent::Progress {
        percent,
        bytes_acknowledged: progress.acknowledged_bytes(),
        total_bytes: progress.total_bytes(),
        bytes_per_second,
    }
}

/// Validates an acknowledgement against the chunk that was sent.
fn check_ack(session_id: &str, chunk: &Chunk, ack: ChunkAck) -> Result<ChunkAck, BackendError> {
    if ack.session_id != session_id || ack.index != chunk.index {
        return Err(BackendError::Protocol(format!(
            "acknowledgement for {}/{} while sending {}/{}",
            ack.session_id, ack.index, session_id, chunk.index
        )));
    }
    if ack.received_bytes != chunk.len() {
        // A truncated body is worth resending.
        return Err(BackendError::Transport(format!(
            "backend received {} of {} bytes for chunk {}",
            ack.received_bytes,
            chunk.len(),
            chunk.index
        )));
    }
    Ok(ack)
}
