// crates/server/src/pipeline/mod.rs
//! Document pipeline: one supervised task per job driving
//! partition → chunk → vectorize and recording every transition.

mod orchestrator;
mod runner;

pub use orchestrator::{chunk_details, ChunkDetail};
pub use runner::Pipeline;

use std::sync::Arc;

use docflow_core::{Chunker, JobStatus, Partitioner, SourceDocument, Vectorizer};
use docflow_db::DbError;
use thiserror::Error;

/// Failures outside any stage. Stage failures are recorded on the job instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("job {0} is already running")]
    AlreadyRunning(String),

    #[error("job {0} not found")]
    JobNotFound(String),

    #[error("job {job_id} is {status}; only uploading jobs can be started")]
    NotRunnable { job_id: String, status: JobStatus },

    #[error("illegal status transition {from} -> {to}")]
    IllegalTransition { from: JobStatus, to: JobStatus },

    #[error("job {0} was finished or removed while running")]
    RecordClosed(String),

    #[error(transparent)]
    Database(#[from] DbError),
}

/// The three stage implementations a pipeline drives.
#[derive(Clone)]
pub struct Stages {
    pub partitioner: Arc<dyn Partitioner>,
    pub chunker: Arc<dyn Chunker>,
    pub vectorizer: Arc<dyn Vectorizer>,
}

/// Everything the intake path hands over for one job.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub job_id: String,
    pub session_id: String,
    pub source: SourceDocument,
    pub file_size: u64,
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { index_handle: String },
    Failed { stage: String, message: String },
}
