// crates/server/src/pipeline/runner.rs
//! Spawns one task per job and refuses a second run for a job still in flight.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use docflow_core::{DetailMode, ProgressSink, Vectorizer};
use docflow_db::Database;
use tokio::task::JoinHandle;

use super::{JobOutcome, JobRequest, PipelineError, Stages};

type ClaimSet = Arc<Mutex<HashSet<String>>>;

fn lock_claims(claims: &Mutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    claims.lock().unwrap_or_else(|poisoned| {
        tracing::error!("Pipeline claim set mutex poisoned; recovering");
        poisoned.into_inner()
    })
}

/// Releases the job id when the task ends, including by panic.
struct Claim {
    claims: ClaimSet,
    job_id: String,
}

impl Drop for Claim {
    fn drop(&mut self) {
        lock_claims(&self.claims).remove(&self.job_id);
    }
}

pub struct Pipeline {
    pub(super) db: Database,
    pub(super) stages: Stages,
    pub(super) sink: Arc<dyn ProgressSink>,
    pub(super) detail_mode: DetailMode,
    running: ClaimSet,
}

impl Pipeline {
    pub fn new(db: Database, stages: Stages, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            db,
            stages,
            sink,
            detail_mode: DetailMode::default(),
            running: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn with_detail_mode(mut self, mode: DetailMode) -> Self {
        self.detail_mode = mode;
        self
    }

    pub fn vectorizer(&self) -> &Arc<dyn Vectorizer> {
        &self.stages.vectorizer
    }

    pub fn is_running(&self, job_id: &str) -> bool {
        lock_claims(&self.running).contains(job_id)
    }

    fn claim(&self, job_id: &str) -> Result<Claim, PipelineError> {
        if !lock_claims(&self.running).insert(job_id.to_string()) {
            return Err(PipelineError::AlreadyRunning(job_id.to_string()));
        }
        Ok(Claim {
            claims: Arc::clone(&self.running),
            job_id: job_id.to_string(),
        })
    }

    /// Run the job on its own task. The outcome is also recorded on the job.
    pub fn spawn(self: &Arc<Self>, job: JobRequest) -> Result<JoinHandle<JobOutcome>, PipelineError> {
        let claim = self.claim(&job.job_id)?;
        let pipeline = Arc::clone(self);
        tracing::info!(document_id = %job.job_id, session_id = %job.session_id, "Spawning pipeline task");
        Ok(tokio::spawn(async move {
            let _claim = claim;
            pipeline.execute(job).await
        }))
    }

    /// Run the job on the current task.
    pub async fn run(&self, job: JobRequest) -> Result<JobOutcome, PipelineError> {
        let _claim = self.claim(&job.job_id)?;
        Ok(self.execute(job).await)
    }
}
