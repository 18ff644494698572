// crates/server/src/lib.rs
//! Docflow server library.
//!
//! Axum HTTP + WebSocket surface over the document pipeline: uploads start a
//! background job per document, and every stage's progress is pushed to the
//! session's live connection.

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod registry;
pub mod routes;
pub mod state;

pub use config::Settings;
pub use error::*;
pub use pipeline::{JobOutcome, JobRequest, Pipeline, PipelineError, Stages};
pub use registry::{LiveMessage, Outbound, SubscriberRegistry};
pub use routes::api_routes;
pub use state::AppState;

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use axum::Router;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the Axum application with all routes and middleware.
///
/// This sets up:
/// - API routes under `/api`
/// - CORS (any origin unless `allowed_origins` is configured)
/// - Request tracing
/// - The stale-connection reaper
pub fn create_app(state: Arc<AppState>) -> Router {
    spawn_reaper(
        Arc::clone(&state.registry),
        state.settings.reap_interval(),
        state.settings.stale_connection(),
    );

    Router::new()
        .merge(api_routes(Arc::clone(&state)))
        .layer(cors_layer(&state.settings.allowed_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Periodically close live connections older than `threshold`.
pub fn spawn_reaper(
    registry: Arc<SubscriberRegistry>,
    interval: Duration,
    threshold: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let reaped = registry.reap_stale(threshold);
            tracing::debug!(reaped, "Reaper pass");
        }
    })
}
