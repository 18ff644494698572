// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::Instant;

use docflow_core::{DocumentPartitioner, MemoryIndex, ProgressSink};
use docflow_db::Database;

use crate::config::Settings;
use crate::pipeline::{Pipeline, Stages};
use crate::registry::SubscriberRegistry;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// Job records and sessions.
    pub db: Database,
    /// Live-update connections, one per session.
    pub registry: Arc<SubscriberRegistry>,
    /// Runs submitted documents through the stages.
    pub pipeline: Arc<Pipeline>,
    pub settings: Settings,
}

impl AppState {
    /// State wired to the built-in stages: text/PDF partitioner, title chunker
    /// and the in-process index.
    pub fn new(db: Database, settings: Settings) -> Arc<Self> {
        let stages = Stages {
            partitioner: Arc::new(DocumentPartitioner::new()),
            chunker: Arc::new(settings.chunker()),
            vectorizer: Arc::new(MemoryIndex::new()),
        };
        Self::with_stages(db, settings, stages)
    }

    pub fn with_stages(db: Database, settings: Settings, stages: Stages) -> Arc<Self> {
        let registry = Arc::new(SubscriberRegistry::new());
        let sink: Arc<dyn ProgressSink> = registry.clone();
        let pipeline =
            Pipeline::new(db.clone(), stages, sink).with_detail_mode(settings.detail_mode);
        Arc::new(Self {
            start_time: Instant::now(),
            db,
            registry,
            pipeline: Arc::new(pipeline),
            settings,
        })
    }

    /// Get server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
