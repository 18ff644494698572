//! Reference partitioner: PDF and plain-text documents into structural elements.
//!
//! PDF text comes from `lopdf`; the text is then split on blank lines and each
//! block is classified as heading, text, table or image by simple markers
//! (`#` headings, `|` table rows, `![...]` image references). This is a
//! stand-in for a layout-aware extractor, not a replacement for one.

use std::path::Path;

use async_trait::async_trait;
use serde_json::json;

use crate::error::StageError;
use crate::stages::{Element, ElementCategory, PartitionOutput, Partitioner, SourceDocument};
use crate::tracker::ProgressTracker;
use crate::types::{details_from, Stage};

/// Longest single line still treated as a heading.
const MAX_HEADING_CHARS: usize = 80;

#[derive(Debug, Clone, Default)]
pub struct DocumentPartitioner;

impl DocumentPartitioner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Partitioner for DocumentPartitioner {
    async fn partition(
        &self,
        source: &SourceDocument,
        tracker: &mut ProgressTracker,
    ) -> Result<PartitionOutput, StageError> {
        let stage = Stage::Partition.name();
        tracker.update(
            stage,
            25,
            Some(details_from(json!({"message": "Analyzing document structure..."}))),
        )?;

        let bytes = tokio::fs::read(&source.path)
            .await
            .map_err(|e| StageError::io(&source.path, e))?;

        let text = match extension(&source.path).as_deref() {
            Some("pdf") => tokio::task::spawn_blocking(move || pdf_text(&bytes)).await??,
            Some("txt") | Some("md") => String::from_utf8_lossy(&bytes).into_owned(),
            other => {
                return Err(StageError::UnsupportedType(
                    other.unwrap_or("(none)").to_string(),
                ))
            }
        };

        tracker.update(
            stage,
            75,
            Some(details_from(json!({"message": "Processing extracted elements..."}))),
        )?;

        let output = PartitionOutput::from_elements(split_elements(&text));
        tracing::info!(
            filename = %source.filename,
            total = output.total,
            counts = ?output.counts,
            "Partitioning complete"
        );
        Ok(output)
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Extract text from PDF bytes, page by page in page order.
pub fn pdf_text(bytes: &[u8]) -> Result<String, StageError> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| StageError::Extraction(format!("failed to parse PDF: {e}")))?;

    let mut pages: Vec<u32> = doc.get_pages().keys().cloned().collect();
    pages.sort();

    let mut text = String::new();
    for page in &pages {
        let page_text = doc.extract_text(&[*page]).unwrap_or_default();
        text.push_str(&page_text);
        // Keep page boundaries as block boundaries.
        text.push_str("\n\n");
    }

    tracing::debug!(chars = text.len(), pages = pages.len(), "Extracted PDF text");
    Ok(text)
}

/// Split text on blank lines and classify each block.
pub fn split_elements(text: &str) -> Vec<Element> {
    let mut elements = Vec::new();
    let mut block: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !block.is_empty() {
                elements.push(classify_block(&block));
                block.clear();
            }
        } else {
            block.push(line.trim_end());
        }
    }
    if !block.is_empty() {
        elements.push(classify_block(&block));
    }
    elements
}

fn classify_block(lines: &[&str]) -> Element {
    let first = lines[0].trim_start();

    if lines.iter().all(|l| l.trim_start().starts_with('|')) {
        return Element::table(lines.join("\n"));
    }
    if first.starts_with("![") || first.to_ascii_lowercase().starts_with("<img") {
        return Element::image(lines.join("\n"));
    }
    if lines.len() == 1 {
        if let Some(heading) = first.strip_prefix('#') {
            return Element::heading(heading.trim_start_matches('#').trim());
        }
        if looks_like_heading(first) {
            return Element::heading(first);
        }
    }

    let joined = lines
        .iter()
        .map(|l| l.trim())
        .collect::<Vec<_>>()
        .join(" ");
    if !joined.chars().any(char::is_alphanumeric) {
        return Element {
            category: ElementCategory::Other,
            text: joined,
            heading: false,
        };
    }
    Element::text(joined)
}

fn looks_like_heading(line: &str) -> bool {
    let starts_upper = line.chars().next().is_some_and(char::is_uppercase);
    let ends_open = !line.ends_with(['.', ',', ';', ':', '!', '?']);
    starts_upper && ends_open && line.chars().count() <= MAX_HEADING_CHARS
}
