// crates/server/src/routes/upload.rs
//! Document intake and job-status queries.
//!
//! - POST /api/upload - multipart `file` (+ optional `session_id`); starts the pipeline
//! - GET  /api/upload/progress/{document_id} - job status and counters
//! - GET  /api/upload/documents/{session_id} - a session's documents, newest first

use std::path::Path as FsPath;
use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use docflow_core::{
    details_from, ElementCounts, EventStatus, JobStatus, ProgressEvent, ProgressSink,
    SourceDocument,
};
use docflow_db::{DocumentRecord, NewDocument};
use serde::Serialize;
use serde_json::json;

use crate::error::{ApiError, ApiResult};
use crate::pipeline::JobRequest;
use crate::state::AppState;

/// Multipart framing allowance on top of the file size limit.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct UploadResponse {
    pub document_id: String,
    pub session_id: String,
    pub filename: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ProgressResponse {
    pub document_id: String,
    pub status: JobStatus,
    pub element_count: u64,
    pub chunk_count: u64,
    pub element_counts: ElementCounts,
    pub error_message: Option<String>,
}

impl From<DocumentRecord> for ProgressResponse {
    fn from(record: DocumentRecord) -> Self {
        Self {
            document_id: record.id,
            status: record.status,
            element_count: record.element_count,
            chunk_count: record.chunk_count,
            element_counts: record.element_counts,
            error_message: record.error_message,
        }
    }
}

struct UploadedFile {
    filename: String,
    bytes: Vec<u8>,
}

fn multipart_error(err: MultipartError, limit: u64) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge { limit }
    } else {
        ApiError::BadRequest(format!("invalid multipart body: {}", err.body_text()))
    }
}

/// Strip any directory components a client put in the filename.
fn sanitize_filename(raw: &str) -> Option<String> {
    let name = FsPath::new(raw.trim()).file_name()?.to_str()?.to_string();
    (!name.is_empty()).then_some(name)
}

/// POST /api/upload
pub async fn upload_document(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let limit = state.settings.max_file_size;
    let mut file: Option<UploadedFile> = None;
    let mut session_id: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let raw_name = field.file_name().unwrap_or_default().to_string();
                let filename = sanitize_filename(&raw_name).ok_or_else(|| {
                    ApiError::BadRequest("file field must carry a filename".into())
                })?;
                let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
                file = Some(UploadedFile {
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
            Some("session_id") => {
                let value = field.text().await.map_err(|e| multipart_error(e, limit))?;
                let value = value.trim();
                if !value.is_empty() {
                    session_id = Some(value.to_string());
                }
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| ApiError::BadRequest("missing 'file' field".into()))?;
    let settings = &state.settings;

    if !settings.accepts_extension(&file.filename) {
        return Err(ApiError::BadRequest(format!(
            "Only {} files are allowed",
            settings.allowed_extensions.join(", ")
        )));
    }
    let file_size = file.bytes.len() as u64;
    if file_size > limit {
        tracing::warn!(filename = %file.filename, file_size, limit, "Upload rejected: too large");
        return Err(ApiError::PayloadTooLarge { limit });
    }

    let session_id = session_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let document_id = uuid::Uuid::new_v4().to_string();

    let upload_dir = settings.upload_path();
    tokio::fs::create_dir_all(&upload_dir)
        .await
        .map_err(|e| ApiError::Internal(format!("create {}: {e}", upload_dir.display())))?;
    let file_path = upload_dir.join(format!("{document_id}_{}", file.filename));
    tokio::fs::write(&file_path, &file.bytes)
        .await
        .map_err(|e| ApiError::Internal(format!("write {}: {e}", file_path.display())))?;

    state.db.ensure_session(&session_id).await?;
    state
        .db
        .insert_document(&NewDocument {
            id: document_id.clone(),
            session_id: session_id.clone(),
            filename: file.filename.clone(),
            file_path: file_path.display().to_string(),
            file_size,
        })
        .await?;

    tracing::info!(
        document_id = %document_id,
        session_id = %session_id,
        filename = %file.filename,
        file_size,
        "Document uploaded"
    );

    let notice = ProgressEvent {
        job_id: document_id.clone(),
        stage: "uploading".into(),
        status: EventStatus::Processing,
        progress: 100,
        message: format!(
            "File '{}' uploaded successfully! Starting processing...",
            file.filename
        ),
        details: details_from(json!({
            "file_size": file_size,
            "filename": file.filename,
        })),
        timestamp: Utc::now(),
    };
    state.registry.deliver(&session_id, &notice);

    state.pipeline.spawn(JobRequest {
        job_id: document_id.clone(),
        session_id: session_id.clone(),
        source: SourceDocument {
            path: file_path,
            filename: file.filename.clone(),
        },
        file_size,
    })?;

    Ok(Json(UploadResponse {
        document_id,
        session_id,
        filename: file.filename,
        status: "processing".into(),
        message: "Document uploaded successfully and processing started".into(),
    }))
}

/// GET /api/upload/progress/{document_id}
pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
) -> ApiResult<Json<ProgressResponse>> {
    let record = state
        .db
        .get_document(&document_id)
        .await?
        .ok_or_else(|| ApiError::DocumentNotFound(document_id.clone()))?;
    Ok(Json(record.into()))
}

/// GET /api/upload/documents/{session_id}
pub async fn list_documents(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Vec<DocumentRecord>>> {
    Ok(Json(state.db.list_documents(&session_id).await?))
}

pub fn router(max_file_size: u64) -> Router<Arc<AppState>> {
    let body_limit = usize::try_from(max_file_size.saturating_add(MULTIPART_OVERHEAD))
        .unwrap_or(usize::MAX);
    Router::new()
        .route(
            "/upload",
            post(upload_document).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/upload/progress/{document_id}", get(get_progress))
        .route("/upload/documents/{session_id}", get(list_documents))
}
