// crates/server/src/routes/documents.rs
//! Administrative removal of documents and whole sessions.

use std::collections::BTreeMap;
use std::path::Path as FsPath;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::delete,
    Json, Router,
};
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct CleanupResponse {
    pub status: String,
    pub message: String,
    pub deleted_items: BTreeMap<String, u64>,
}

/// Remove an uploaded file. A file that is already gone is not an error.
async fn remove_upload(path: &str) {
    match tokio::fs::remove_file(FsPath::new(path)).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::error!(path, error = %e, "Failed to delete uploaded file"),
    }
}

/// DELETE /api/documents/{document_id}
pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
) -> ApiResult<Json<CleanupResponse>> {
    let record = state
        .db
        .delete_document(&document_id)
        .await?
        .ok_or_else(|| ApiError::DocumentNotFound(document_id.clone()))?;
    remove_upload(&record.file_path).await;

    tracing::info!(document_id = %document_id, "Deleted document");
    Ok(Json(CleanupResponse {
        status: "success".into(),
        message: "Document deleted successfully".into(),
        deleted_items: BTreeMap::from([("documents".to_string(), 1)]),
    }))
}

/// DELETE /api/documents/session/{session_id}
pub async fn clear_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<CleanupResponse>> {
    if !state.db.session_exists(&session_id).await? {
        return Err(ApiError::SessionNotFound(session_id));
    }

    let purge = state.db.delete_session(&session_id).await?;
    for record in &purge.documents {
        remove_upload(&record.file_path).await;
    }
    let index_dropped = state.pipeline.vectorizer().drop_session(&session_id).await;

    tracing::info!(
        session_id = %session_id,
        documents = purge.documents.len(),
        index_dropped,
        "Cleared session"
    );
    Ok(Json(CleanupResponse {
        status: "success".into(),
        message: "Session cleared successfully".into(),
        deleted_items: BTreeMap::from([
            ("documents".to_string(), purge.documents.len() as u64),
            ("vector_store".to_string(), u64::from(index_dropped)),
        ]),
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/documents/{document_id}", delete(delete_document))
        .route("/documents/session/{session_id}", delete(clear_session))
}
