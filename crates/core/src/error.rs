// crates/core/src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Rejected progress report.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProgressError {
    #[error("progress {value} for stage '{stage}' is outside 0..=100")]
    OutOfRange { stage: String, value: i64 },
}

/// Errors raised by a pipeline stage. Any of these terminates the job as failed.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported document type: {0}")]
    UnsupportedType(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Chunking failed: {0}")]
    Chunking(String),

    #[error("Indexing failed: {0}")]
    Indexing(String),

    #[error("Stage task did not complete: {0}")]
    Join(String),

    #[error(transparent)]
    Progress(#[from] ProgressError),
}

impl StageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<tokio::task::JoinError> for StageError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Join(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_error_display() {
        let err = ProgressError::OutOfRange {
            stage: "chunking".to_string(),
            value: 101,
        };
        assert_eq!(
            err.to_string(),
            "progress 101 for stage 'chunking' is outside 0..=100"
        );
    }

    #[test]
    fn test_stage_error_io_display() {
        let err = StageError::io(
            "/tmp/missing.pdf",
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/tmp/missing.pdf"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_progress_error_converts_to_stage_error() {
        let err: StageError = ProgressError::OutOfRange {
            stage: "partitioning".into(),
            value: -1,
        }
        .into();
        assert!(matches!(err, StageError::Progress(_)));
        assert!(err.to_string().contains("-1"));
    }
}
