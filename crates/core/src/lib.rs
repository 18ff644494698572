// crates/core/src/lib.rs
//! Domain core for the docflow ingestion pipeline.
//!
//! - [`DetailAccumulator`] merges per-job progress details
//! - [`ProgressTracker`] turns stage reports into self-contained [`ProgressEvent`]s
//! - [`Partitioner`], [`Chunker`], [`Vectorizer`] are the stage contracts the
//!   orchestrator drives, with simple reference implementations in
//!   [`extract`], [`chunking`] and [`index`]

pub mod accumulator;
pub mod chunking;
pub mod error;
pub mod extract;
pub mod index;
pub mod stages;
pub mod tracker;
pub mod types;

pub use accumulator::{is_empty_value, DetailAccumulator};
pub use chunking::TitleChunker;
pub use error::{ProgressError, StageError};
pub use extract::DocumentPartitioner;
pub use index::{IndexedChunk, MemoryIndex};
pub use stages::{
    Chunk, Chunker, Element, ElementCategory, ElementCounts, IndexHandle, PartitionOutput,
    Partitioner, SourceDocument, Vectorizer,
};
pub use tracker::{DetailMode, ProgressSink, ProgressTracker};
pub use types::{details_from, Details, EventStatus, JobStatus, ProgressEvent, Stage};
