//! Reference vectorizer: an in-process chunk store, one collection per session.
//!
//! Collections are named `session_{session_id}`. Each stored record carries
//! the text used for indexing (chunk text plus table/image markers) and the
//! original chunk content. Embedding and similarity search are left to a real
//! vector store behind the same [`Vectorizer`] contract.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;

use crate::error::StageError;
use crate::stages::{Chunk, IndexHandle, Vectorizer};
use crate::tracker::ProgressTracker;
use crate::types::{details_from, Stage};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexedChunk {
    pub document_id: String,
    pub document_name: String,
    pub chunk_id: u32,
    /// Text submitted for indexing.
    pub content: String,
    pub raw_text: String,
    pub tables: Vec<String>,
    pub images: Vec<String>,
}

#[derive(Debug, Default)]
pub struct MemoryIndex {
    collections: RwLock<HashMap<String, Vec<IndexedChunk>>>,
}

pub fn collection_name(session_id: &str) -> String {
    format!("session_{session_id}")
}

fn indexed_content(chunk: &Chunk) -> String {
    let mut content = chunk.text.clone();
    if !chunk.tables.is_empty() {
        content.push_str(&format!("\n[Contains {} table(s)]", chunk.tables.len()));
    }
    if !chunk.images.is_empty() {
        content.push_str(&format!("\n[Contains {} image(s)]", chunk.images.len()));
    }
    content
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in a collection (0 when absent).
    pub fn collection_len(&self, handle: &str) -> usize {
        match self.collections.read() {
            Ok(c) => c.get(handle).map_or(0, Vec::len),
            Err(e) => {
                tracing::error!("RwLock poisoned reading index collections: {e}");
                0
            }
        }
    }

    /// Records stored for one document in a collection.
    pub fn document_chunks(&self, handle: &str, document_id: &str) -> Vec<IndexedChunk> {
        match self.collections.read() {
            Ok(c) => c
                .get(handle)
                .map(|records| {
                    records
                        .iter()
                        .filter(|r| r.document_id == document_id)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading index collections: {e}");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl Vectorizer for MemoryIndex {
    async fn vectorize(
        &self,
        chunks: &[Chunk],
        session_id: &str,
        job_id: &str,
        display_name: &str,
        tracker: &mut ProgressTracker,
    ) -> Result<IndexHandle, StageError> {
        let stage = Stage::Vectorize.name();
        let total = chunks.len();
        let mut records = Vec::with_capacity(total);

        // Record preparation covers 10..=50.
        for (i, chunk) in chunks.iter().enumerate() {
            records.push(IndexedChunk {
                document_id: job_id.to_string(),
                document_name: display_name.to_string(),
                chunk_id: chunk.chunk_id,
                content: indexed_content(chunk),
                raw_text: chunk.text.clone(),
                tables: chunk.tables.clone(),
                images: chunk.images.clone(),
            });
            tracker.update(
                stage,
                10 + ((i + 1) * 40 / total) as i64,
                Some(details_from(json!({
                    "vectors_created": i + 1,
                    "total_chunks": total,
                    "message": format!("Preparing document {} of {}...", i + 1, total),
                }))),
            )?;
        }

        tracker.update(
            stage,
            55,
            Some(details_from(json!({"message": "Writing index records..."}))),
        )?;

        let handle = collection_name(session_id);
        {
            let mut collections = self
                .collections
                .write()
                .map_err(|e| StageError::Indexing(format!("index lock poisoned: {e}")))?;
            let collection = collections.entry(handle.clone()).or_default();
            // Re-indexing a document replaces its previous records.
            collection.retain(|r| r.document_id != job_id);
            collection.extend(records);
        }

        tracing::info!(
            document_id = %job_id,
            collection = %handle,
            chunks = total,
            "Indexed document chunks"
        );
        Ok(handle)
    }

    async fn drop_session(&self, session_id: &str) -> bool {
        match self.collections.write() {
            Ok(mut c) => c.remove(&collection_name(session_id)).is_some(),
            Err(e) => {
                tracing::error!("RwLock poisoned dropping index collection: {e}");
                false
            }
        }
    }
}
