// crates/core/src/types.rs
//! Job status state machine and progress event types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Accumulated key/value payload attached to every progress event.
pub type Details = serde_json::Map<String, Value>;

/// Build a [`Details`] map from a `json!({...})` object literal.
/// Non-object values yield an empty map.
pub fn details_from(value: Value) -> Details {
    match value {
        Value::Object(map) => map,
        _ => Details::new(),
    }
}

/// Lifecycle of one document job.
///
/// Status only moves to its immediate successor, except that any
/// non-terminal status may jump straight to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Uploading,
    Partitioning,
    Chunking,
    Vectorizing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Partitioning => "partitioning",
            Self::Chunking => "chunking",
            Self::Vectorizing => "vectorizing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse the stored lowercase form. Returns `None` for unknown values.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "uploading" => Some(Self::Uploading),
            "partitioning" => Some(Self::Partitioning),
            "chunking" => Some(Self::Chunking),
            "vectorizing" => Some(Self::Vectorizing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Uploading => 0,
            Self::Partitioning => 1,
            Self::Chunking => 2,
            Self::Vectorizing => 3,
            Self::Completed => 4,
            Self::Failed => 5,
        }
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == Self::Failed {
            return true;
        }
        next.rank() == self.rank() + 1
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The ordered pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Partition,
    Chunk,
    Vectorize,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Partition, Stage::Chunk, Stage::Vectorize];

    /// Stage name as it appears in progress events.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Partition => "partitioning",
            Self::Chunk => "chunking",
            Self::Vectorize => "vectorization",
        }
    }

    /// Job status recorded while this stage runs.
    pub fn status(&self) -> JobStatus {
        match self {
            Self::Partition => JobStatus::Partitioning,
            Self::Chunk => JobStatus::Chunking,
            Self::Vectorize => JobStatus::Vectorizing,
        }
    }
}

/// Status carried by a progress event on the live channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Processing,
    Completed,
    Error,
}

/// One progress report for a job. Transient: forwarded live, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(rename = "document_id")]
    pub job_id: String,
    pub stage: String,
    pub status: EventStatus,
    pub progress: u8,
    pub message: String,
    pub details: Details,
    pub timestamp: DateTime<Utc>,
}
