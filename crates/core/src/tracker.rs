//! Per-job progress reporting.
//!
//! A [`ProgressTracker`] is created for each job and handed to every stage.
//! It validates the reported percentage, merges the reported details into the
//! job's [`DetailAccumulator`], and hands a complete event to the injected
//! [`ProgressSink`]. Delivery is advisory: a sink that reports failure is
//! logged and otherwise ignored.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};

use crate::accumulator::DetailAccumulator;
use crate::error::ProgressError;
use crate::types::{Details, EventStatus, ProgressEvent};

/// Destination for progress events.
///
/// Implementations must not panic; a `false` return means the event was
/// dropped (no subscriber, or the subscriber went away).
pub trait ProgressSink: Send + Sync {
    fn deliver(&self, session_id: &str, event: &ProgressEvent) -> bool;
}

/// Which details an event carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetailMode {
    /// Every event carries the full accumulated map.
    #[default]
    Full,
    /// Events carry only the fields written by that report. The terminal
    /// `completed` event still carries the full map.
    Delta,
}

impl std::str::FromStr for DetailMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(Self::Full),
            "delta" => Ok(Self::Delta),
            other => Err(format!("unknown detail mode '{other}' (expected full or delta)")),
        }
    }
}

pub struct ProgressTracker {
    job_id: String,
    session_id: String,
    sink: Arc<dyn ProgressSink>,
    accumulator: DetailAccumulator,
    mode: DetailMode,
    current_stage: Option<String>,
    current_progress: u8,
}

impl ProgressTracker {
    pub fn new(
        job_id: impl Into<String>,
        session_id: impl Into<String>,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            session_id: session_id.into(),
            sink,
            accumulator: DetailAccumulator::new(),
            mode: DetailMode::Full,
            current_stage: None,
            current_progress: 0,
        }
    }

    pub fn with_mode(mut self, mode: DetailMode) -> Self {
        self.mode = mode;
        self
    }

    /// Seed the accumulated details without emitting an event.
    pub fn with_details(mut self, details: Details) -> Self {
        self.accumulator = DetailAccumulator::with_fields(details);
        self
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn current_stage(&self) -> Option<&str> {
        self.current_stage.as_deref()
    }

    pub fn current_progress(&self) -> u8 {
        self.current_progress
    }

    pub fn snapshot(&self) -> Details {
        self.accumulator.snapshot()
    }

    /// Emit progress 0 for a new stage.
    pub fn start_stage(&mut self, stage: &str, message: Option<&str>) {
        let mut fields = Details::new();
        if let Some(message) = message {
            fields.insert("message".into(), Value::String(message.to_string()));
        }
        self.emit(stage, 0, EventStatus::Processing, fields);
    }

    /// Report `progress` percent for `stage`, merging `details`.
    pub fn update(
        &mut self,
        stage: &str,
        progress: i64,
        details: Option<Details>,
    ) -> Result<(), ProgressError> {
        let progress = u8::try_from(progress)
            .ok()
            .filter(|p| *p <= 100)
            .ok_or_else(|| ProgressError::OutOfRange {
                stage: stage.to_string(),
                value: progress,
            })?;
        self.emit(
            stage,
            progress,
            EventStatus::Processing,
            details.unwrap_or_default(),
        );
        Ok(())
    }

    pub fn complete_stage(&mut self, stage: &str, details: Option<Details>) {
        self.emit(
            stage,
            100,
            EventStatus::Processing,
            details.unwrap_or_default(),
        );
    }

    /// Report an error at the last known progress. Does not decide the job's fate.
    pub fn error(&mut self, stage: &str, message: &str) {
        let fields = match json!({"message": message, "error": true}) {
            Value::Object(map) => map,
            _ => Details::new(),
        };
        let progress = self.current_progress;
        self.emit(stage, progress, EventStatus::Error, fields);
    }

    /// Emit the terminal `completed` event with the full accumulated map.
    pub fn finish(&mut self, message: &str, details: Option<Details>) {
        let mut fields = details.unwrap_or_default();
        fields.insert("message".into(), Value::String(message.to_string()));
        self.accumulator.merge(&fields);
        let snapshot = self.accumulator.snapshot();
        self.send("completed", 100, EventStatus::Completed, message.to_string(), snapshot);
    }

    fn emit(&mut self, stage: &str, progress: u8, status: EventStatus, fields: Details) {
        // The message belongs to this report only, not to the accumulated map.
        let message = fields
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Processing: {stage}"));
        let details = match self.mode {
            DetailMode::Full => self.accumulator.merge(&fields),
            DetailMode::Delta => self.accumulator.merge_delta(&fields),
        };
        self.send(stage, progress, status, message, details);
    }

    fn send(
        &mut self,
        stage: &str,
        progress: u8,
        status: EventStatus,
        message: String,
        details: Details,
    ) {
        self.current_stage = Some(stage.to_string());
        self.current_progress = progress;

        tracing::debug!(
            document_id = %self.job_id,
            stage,
            progress,
            "Progress update"
        );

        let event = ProgressEvent {
            job_id: self.job_id.clone(),
            stage: stage.to_string(),
            status,
            progress,
            message,
            details,
            timestamp: Utc::now(),
        };

        if !self.sink.deliver(&self.session_id, &event) {
            tracing::debug!(
                document_id = %self.job_id,
                session_id = %self.session_id,
                stage,
                "Progress event not delivered (no live subscriber)"
            );
        }
    }
}
