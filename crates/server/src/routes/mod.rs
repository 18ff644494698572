//! API route handlers for the docflow server.

pub mod documents;
pub mod health;
pub mod metrics;
pub mod upload;
pub mod ws;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined API router with all routes under /api prefix.
///
/// Routes:
/// - GET    /api/health - Health check
/// - POST   /api/upload - Upload a document and start processing
/// - GET    /api/upload/progress/{document_id} - Job status and counters
/// - GET    /api/upload/documents/{session_id} - Documents for a session
/// - DELETE /api/documents/{document_id} - Remove one document
/// - DELETE /api/documents/session/{session_id} - Remove a session and its documents
/// - GET    /api/ws/{session_id} - WebSocket live progress
/// - GET    /api/metrics - Prometheus metrics
pub fn api_routes(state: Arc<AppState>) -> Router {
    let max_file_size = state.settings.max_file_size;
    Router::new()
        .nest("/api", health::router())
        .nest("/api", upload::router(max_file_size))
        .nest("/api", documents::router())
        .nest("/api", ws::router())
        .nest("/api", metrics::router())
        .with_state(state)
}
