// crates/server/src/pipeline/orchestrator.rs
//! The per-job state machine.
//!
//! ```text
//! UPLOADING -> PARTITIONING -> CHUNKING -> VECTORIZING -> COMPLETED
//!      |              |             |             |
//!      +--------------+-------------+-------------+--> FAILED
//! ```
//!
//! Each stage boundary writes the record once. A stage failure marks the job
//! FAILED, reports one error event and stops; later stages never run.

use std::time::Instant;

use docflow_core::{details_from, Chunk, JobStatus, ProgressTracker, Stage, StageError};
use serde::Serialize;
use serde_json::json;

use super::runner::Pipeline;
use super::{JobOutcome, JobRequest, PipelineError};
use crate::metrics;

/// Characters of chunk text kept in a progress preview.
const PREVIEW_CHARS: usize = 500;

/// Stage name used for failures outside any stage.
const ERROR_STAGE: &str = "error";

/// Per-chunk summary reported when chunking completes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkDetail {
    pub id: u32,
    /// First 500 characters, with `...` appended when cut.
    pub text: String,
    pub full_text_length: usize,
    pub has_text: bool,
    pub has_table: bool,
    pub has_image: bool,
    pub table_count: usize,
    pub image_count: usize,
}

pub fn chunk_details(chunks: &[Chunk]) -> Vec<ChunkDetail> {
    chunks
        .iter()
        .map(|c| {
            let length = c.text.chars().count();
            let text = if length > PREVIEW_CHARS {
                let mut preview: String = c.text.chars().take(PREVIEW_CHARS).collect();
                preview.push_str("...");
                preview
            } else {
                c.text.clone()
            };
            ChunkDetail {
                id: c.chunk_id,
                text,
                full_text_length: length,
                has_text: !c.text.is_empty(),
                has_table: !c.tables.is_empty(),
                has_image: !c.images.is_empty(),
                table_count: c.tables.len(),
                image_count: c.images.len(),
            }
        })
        .collect()
}

impl Pipeline {
    pub(super) async fn execute(&self, job: JobRequest) -> JobOutcome {
        let mut tracker = ProgressTracker::new(&job.job_id, &job.session_id, self.sink.clone())
            .with_mode(self.detail_mode)
            .with_details(details_from(json!({
                "filename": job.source.filename,
                "file_size": job.file_size,
            })));

        match self.drive(&job, &mut tracker).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let message = e.to_string();
                tracing::error!(document_id = %job.job_id, error = %e, "Pipeline failed outside a stage");
                let report = match self.db.mark_failed(&job.job_id, &message).await {
                    Ok(changed) => changed,
                    Err(db_err) => {
                        tracing::error!(document_id = %job.job_id, error = %db_err, "Failed to record job failure");
                        true
                    }
                };
                // A missing or already finished record is left as it is and
                // nothing is reported for it.
                if report {
                    tracker.error(ERROR_STAGE, &message);
                    metrics::record_job("failed");
                } else {
                    tracing::warn!(document_id = %job.job_id, "No open job record; failure not reported");
                }
                JobOutcome::Failed {
                    stage: ERROR_STAGE.to_string(),
                    message,
                }
            }
        }
    }

    async fn drive(
        &self,
        job: &JobRequest,
        tracker: &mut ProgressTracker,
    ) -> Result<JobOutcome, PipelineError> {
        let job_id = job.job_id.as_str();
        let record = self
            .db
            .get_document(job_id)
            .await?
            .ok_or_else(|| PipelineError::JobNotFound(job_id.to_string()))?;
        if record.status != JobStatus::Uploading {
            return Err(PipelineError::NotRunnable {
                job_id: job_id.to_string(),
                status: record.status,
            });
        }
        let mut status = record.status;

        // Partition
        let stage = Stage::Partition;
        self.advance(job_id, &mut status, stage.status()).await?;
        tracker.start_stage(stage.name(), Some("Starting document partitioning..."));
        let started = Instant::now();
        let result = self.stages.partitioner.partition(&job.source, tracker).await;
        metrics::record_stage(stage.name(), started.elapsed());
        let partition = match result {
            Ok(partition) => partition,
            Err(e) => return self.fail_stage(job_id, tracker, stage, e).await,
        };
        ensure_written(
            job_id,
            self.db
                .record_partition(job_id, partition.total, &partition.counts)
                .await?,
        )?;
        tracker.complete_stage(
            stage.name(),
            Some(details_from(json!({
                "elements_count": partition.total,
                "element_types": partition.counts,
                "message": format!("Partitioning complete: {} elements extracted", partition.total),
            }))),
        );

        // Chunk
        let stage = Stage::Chunk;
        self.advance(job_id, &mut status, stage.status()).await?;
        tracker.start_stage(stage.name(), Some("Starting chunking..."));
        let started = Instant::now();
        let result = self.stages.chunker.chunk(&partition.elements, tracker).await;
        metrics::record_stage(stage.name(), started.elapsed());
        let chunks = match result {
            Ok(chunks) => chunks,
            Err(e) => return self.fail_stage(job_id, tracker, stage, e).await,
        };
        ensure_written(
            job_id,
            self.db.record_chunks(job_id, chunks.len() as u64).await?,
        )?;
        tracker.complete_stage(
            stage.name(),
            Some(details_from(json!({
                "chunks_count": chunks.len(),
                "chunk_details": chunk_details(&chunks),
                "message": format!("Chunking complete: {} chunks created", chunks.len()),
            }))),
        );

        // Vectorize
        let stage = Stage::Vectorize;
        self.advance(job_id, &mut status, stage.status()).await?;
        tracker.start_stage(stage.name(), Some("Starting vectorization..."));
        let started = Instant::now();
        let result = self
            .stages
            .vectorizer
            .vectorize(
                &chunks,
                &job.session_id,
                job_id,
                &job.source.filename,
                tracker,
            )
            .await;
        metrics::record_stage(stage.name(), started.elapsed());
        let index_handle = match result {
            Ok(handle) => handle,
            Err(e) => return self.fail_stage(job_id, tracker, stage, e).await,
        };
        ensure_written(
            job_id,
            self.db.record_index_handle(job_id, &index_handle).await?,
        )?;
        tracker.complete_stage(
            stage.name(),
            Some(details_from(json!({
                "vectors_stored": chunks.len(),
                "index_handle": index_handle,
                "message": format!("Vectorization complete: {} vectors stored", chunks.len()),
            }))),
        );

        self.advance(job_id, &mut status, JobStatus::Completed).await?;
        tracker.finish(
            "Document processed successfully!",
            Some(details_from(json!({
                "elements_count": partition.total,
                "element_types": partition.counts,
                "chunks_count": chunks.len(),
                "vectors_stored": chunks.len(),
            }))),
        );
        metrics::record_job("completed");
        tracing::info!(
            document_id = %job_id,
            elements = partition.total,
            chunks = chunks.len(),
            index = %index_handle,
            "Document processed"
        );

        Ok(JobOutcome::Completed { index_handle })
    }

    /// Persist the move to `next`, refusing anything but the next legal status.
    async fn advance(
        &self,
        job_id: &str,
        current: &mut JobStatus,
        next: JobStatus,
    ) -> Result<(), PipelineError> {
        if !current.can_transition_to(next) {
            return Err(PipelineError::IllegalTransition {
                from: *current,
                to: next,
            });
        }
        ensure_written(job_id, self.db.set_document_status(job_id, next).await?)?;
        tracing::debug!(document_id = %job_id, from = %*current, to = %next, "Job status advanced");
        *current = next;
        Ok(())
    }

    async fn fail_stage(
        &self,
        job_id: &str,
        tracker: &mut ProgressTracker,
        stage: Stage,
        err: StageError,
    ) -> Result<JobOutcome, PipelineError> {
        let message = err.to_string();
        tracing::error!(document_id = %job_id, stage = stage.name(), error = %err, "Stage failed");

        // The error event goes out even if the record cannot be written.
        let recorded = self.db.mark_failed(job_id, &message).await;
        tracker.error(stage.name(), &message);
        metrics::record_job("failed");
        if let Err(e) = recorded {
            tracing::error!(document_id = %job_id, error = %e, "Failed to record stage failure");
        }

        Ok(JobOutcome::Failed {
            stage: stage.name().to_string(),
            message,
        })
    }
}

fn ensure_written(job_id: &str, changed: bool) -> Result<(), PipelineError> {
    if changed {
        Ok(())
    } else {
        Err(PipelineError::RecordClosed(job_id.to_string()))
    }
}
