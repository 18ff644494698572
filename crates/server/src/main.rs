// crates/server/src/main.rs
//! Docflow server binary.
//!
//! Opens the database, then serves the upload API and the live progress
//! channel until interrupted.

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use docflow_db::Database;
use docflow_server::{create_app, metrics::init_metrics, AppState, Settings};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "warn,docflow_server=info,docflow_core=info,docflow_db=info".into()
        }))
        .compact()
        .init();

    let settings = Settings::parse();
    let startup_start = Instant::now();

    init_metrics();

    eprintln!("\n\u{1f4c4} docflow v{}\n", env!("CARGO_PKG_VERSION"));

    let db_path = settings.database_path();
    let db = Database::new(&db_path)
        .await
        .with_context(|| format!("opening database at {}", db_path.display()))?;

    let upload_dir = settings.upload_path();
    tokio::fs::create_dir_all(&upload_dir)
        .await
        .with_context(|| format!("creating upload directory {}", upload_dir.display()))?;

    let addr = settings.socket_addr();
    let state = AppState::new(db, settings);
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    eprintln!(
        "  \u{2713} Ready in {}ms",
        startup_start.elapsed().as_millis()
    );
    eprintln!("  \u{2192} http://{addr}\n");
    tracing::info!(%addr, db = %db_path.display(), uploads = %upload_dir.display(), "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown requested");
        })
        .await?;

    Ok(())
}
