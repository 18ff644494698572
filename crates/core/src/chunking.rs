//! Reference chunker: packs elements into title-delimited chunks.

use async_trait::async_trait;
use serde_json::json;

use crate::error::StageError;
use crate::stages::{Chunk, Chunker, Element, ElementCategory};
use crate::tracker::ProgressTracker;
use crate::types::{details_from, Stage};

/// Groups elements into chunks, starting a new chunk at each heading.
///
/// - a chunk never exceeds `max_chars` of text (oversized elements are split)
/// - once a chunk reaches `new_after_chars` the next element starts a new one
/// - a section shorter than `combine_under_chars` is merged into the next
///   section instead of being emitted on its own
#[derive(Debug, Clone)]
pub struct TitleChunker {
    pub max_chars: usize,
    pub new_after_chars: usize,
    pub combine_under_chars: usize,
}

impl Default for TitleChunker {
    fn default() -> Self {
        Self {
            max_chars: 3000,
            new_after_chars: 2400,
            combine_under_chars: 500,
        }
    }
}

#[derive(Default)]
struct Draft {
    text: String,
    tables: Vec<String>,
    images: Vec<String>,
}

impl Draft {
    fn is_empty(&self) -> bool {
        self.text.is_empty() && self.tables.is_empty() && self.images.is_empty()
    }

    fn len(&self) -> usize {
        self.text.chars().count()
    }

    fn push_text(&mut self, text: &str) {
        if !self.text.is_empty() {
            self.text.push_str("\n\n");
        }
        self.text.push_str(text);
    }
}

impl TitleChunker {
    /// Group `elements` into chunk drafts, numbering chunks from 1.
    pub fn plan(&self, elements: &[Element]) -> Vec<Chunk> {
        let max_chars = self.max_chars.max(1);
        let mut drafts: Vec<Draft> = Vec::new();
        let mut current = Draft::default();

        for element in elements {
            let starts_section = element.heading && current.len() >= self.combine_under_chars;
            let full = current.len() >= self.new_after_chars;
            let element_len = element.text.chars().count();
            let overflows = current.len() + element_len > max_chars;

            if !current.is_empty() && (starts_section || full || overflows) {
                drafts.push(std::mem::take(&mut current));
            }

            match element.category {
                ElementCategory::Table => {
                    current.tables.push(element.text.clone());
                    current.push_text(&element.text);
                }
                ElementCategory::Image => current.images.push(element.text.clone()),
                ElementCategory::Text | ElementCategory::Other => {
                    if element_len > max_chars {
                        for piece in split_chars(&element.text, max_chars) {
                            if !current.is_empty() {
                                drafts.push(std::mem::take(&mut current));
                            }
                            current.push_text(&piece);
                        }
                    } else {
                        current.push_text(&element.text);
                    }
                }
            }
        }
        if !current.is_empty() {
            drafts.push(current);
        }

        drafts
            .into_iter()
            .enumerate()
            .map(|(i, d)| Chunk {
                chunk_id: i as u32 + 1,
                text: d.text,
                tables: d.tables,
                images: d.images,
            })
            .collect()
    }
}

fn split_chars(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars)
        .map(|c| c.iter().collect())
        .collect()
}

#[async_trait]
impl Chunker for TitleChunker {
    async fn chunk(
        &self,
        elements: &[Element],
        tracker: &mut ProgressTracker,
    ) -> Result<Vec<Chunk>, StageError> {
        let stage = Stage::Chunk.name();
        let chunks = self.plan(elements);
        let total = chunks.len();

        // Progress runs 10..=90; the orchestrator owns 0 and 100.
        for i in 0..total {
            let progress = 10 + ((i + 1) * 80 / total) as i64;
            tracker.update(
                stage,
                progress,
                Some(details_from(json!({
                    "chunks_processed": i + 1,
                    "total_chunks": total,
                    "message": format!("Processing chunk {} of {}...", i + 1, total),
                }))),
            )?;
        }

        tracing::info!(
            elements = elements.len(),
            chunks = total,
            "Chunking complete"
        );
        Ok(chunks)
    }
}
