// crates/core/src/stages.rs
//! Contracts for the three pipeline stages.
//!
//! The orchestrator owns stage boundaries (`start_stage` / `complete_stage`);
//! a stage only reports intermediate progress through the tracker it is given
//! and returns its result or a [`StageError`].

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StageError;
use crate::tracker::ProgressTracker;

/// Category counts keyed by category name, e.g. `{"text": 7, "table": 2}`.
pub type ElementCounts = BTreeMap<String, u64>;

/// Identifier of the index collection a job's chunks were written to.
pub type IndexHandle = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementCategory {
    Text,
    Table,
    Image,
    Other,
}

impl ElementCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Table => "table",
            Self::Image => "image",
            Self::Other => "other",
        }
    }
}

/// One structural element extracted from a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub category: ElementCategory,
    pub text: String,
    /// Section heading; chunkers start a new chunk here.
    #[serde(default)]
    pub heading: bool,
}

impl Element {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            category: ElementCategory::Text,
            text: text.into(),
            heading: false,
        }
    }

    pub fn heading(text: impl Into<String>) -> Self {
        Self {
            category: ElementCategory::Text,
            text: text.into(),
            heading: true,
        }
    }

    pub fn table(text: impl Into<String>) -> Self {
        Self {
            category: ElementCategory::Table,
            text: text.into(),
            heading: false,
        }
    }

    pub fn image(text: impl Into<String>) -> Self {
        Self {
            category: ElementCategory::Image,
            text: text.into(),
            heading: false,
        }
    }
}

/// The uploaded file handed to the partition stage.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub filename: String,
}

#[derive(Debug, Clone, Default)]
pub struct PartitionOutput {
    pub elements: Vec<Element>,
    pub counts: ElementCounts,
    pub total: u64,
}

impl PartitionOutput {
    /// Build the output and its per-category counts from `elements`.
    pub fn from_elements(elements: Vec<Element>) -> Self {
        let mut counts = ElementCounts::new();
        for element in &elements {
            *counts.entry(element.category.as_str().to_string()).or_insert(0) += 1;
        }
        Self {
            total: elements.len() as u64,
            elements,
            counts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: u32,
    pub text: String,
    pub tables: Vec<String>,
    pub images: Vec<String>,
}

#[async_trait]
pub trait Partitioner: Send + Sync {
    async fn partition(
        &self,
        source: &SourceDocument,
        tracker: &mut ProgressTracker,
    ) -> Result<PartitionOutput, StageError>;
}

#[async_trait]
pub trait Chunker: Send + Sync {
    async fn chunk(
        &self,
        elements: &[Element],
        tracker: &mut ProgressTracker,
    ) -> Result<Vec<Chunk>, StageError>;
}

#[async_trait]
pub trait Vectorizer: Send + Sync {
    async fn vectorize(
        &self,
        chunks: &[Chunk],
        session_id: &str,
        job_id: &str,
        display_name: &str,
        tracker: &mut ProgressTracker,
    ) -> Result<IndexHandle, StageError>;

    /// Drop everything indexed for `session_id`. Returns whether anything was removed.
    async fn drop_session(&self, _session_id: &str) -> bool {
        false
    }
}
