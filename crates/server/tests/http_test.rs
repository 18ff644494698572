//! Integration tests for the upload, progress and cleanup endpoints.
//!
//! Requests go through the full router with `oneshot`; uploaded files land
//! in a per-test temp directory and the built-in stages process them.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use docflow_db::Database;
use docflow_server::{create_app, AppState, Settings};
use pretty_assertions::assert_eq;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "docflow-test-boundary";

async fn test_state(upload_dir: &Path, max_file_size: u64) -> Arc<AppState> {
    let db = Database::new_in_memory().await.expect("in-memory DB for tests");
    let settings = Settings {
        upload_dir: Some(upload_dir.to_path_buf()),
        max_file_size,
        ..Settings::default()
    };
    AppState::new(db, settings)
}

/// Build a multipart/form-data body with a `file` part and an optional `session_id`.
fn multipart_body(filename: &str, content: &[u8], session_id: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(session_id) = session_id {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"session_id\"\r\n\r\n{session_id}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn upload(app: Router, body: Vec<u8>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn delete(app: Router, uri: &str) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

/// Poll the progress endpoint until the job reaches a terminal status.
async fn wait_for_terminal(app: &Router, document_id: &str) -> Value {
    let uri = format!("/api/upload/progress/{document_id}");
    for _ in 0..100 {
        let (status, body) = get(app.clone(), &uri).await;
        assert_eq!(status, StatusCode::OK);
        if body["status"] == "completed" || body["status"] == "failed" {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("job {document_id} did not finish");
}

const NOTES: &[u8] = b"Introduction\n\nThe quarterly numbers are in.\n\n| q1 | q2 |\n| 10 | 12 |\n\nClosing remarks follow here.\n";

#[tokio::test]
async fn test_upload_text_file_runs_to_completion() {
    let dir = TempDir::new().unwrap();
    let app = create_app(test_state(dir.path(), 1024 * 1024).await);

    let (status, body) = upload(app.clone(), multipart_body("notes.txt", NOTES, Some("s-1"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session_id"], "s-1");
    assert_eq!(body["filename"], "notes.txt");
    assert_eq!(body["status"], "processing");
    let document_id = body["document_id"].as_str().unwrap().to_string();

    let stored = dir.path().join(format!("{document_id}_notes.txt"));
    assert_eq!(std::fs::read(&stored).unwrap(), NOTES);

    let progress = wait_for_terminal(&app, &document_id).await;
    assert_eq!(progress["status"], "completed");
    assert_eq!(progress["element_count"], 4);
    assert_eq!(progress["element_counts"]["table"], 1);
    assert!(progress["chunk_count"].as_u64().unwrap() >= 1);
    assert!(progress["error_message"].is_null());
}

#[tokio::test]
async fn test_upload_without_session_gets_a_fresh_one() {
    let dir = TempDir::new().unwrap();
    let app = create_app(test_state(dir.path(), 1024 * 1024).await);

    let (status, first) = upload(app.clone(), multipart_body("a.md", b"# Title\n", None)).await;
    assert_eq!(status, StatusCode::OK);
    let (_, second) = upload(app.clone(), multipart_body("b.md", b"# Title\n", None)).await;

    let first_session = first["session_id"].as_str().unwrap();
    assert!(!first_session.is_empty());
    assert_ne!(first_session, second["session_id"].as_str().unwrap());
    assert_ne!(first["document_id"], second["document_id"]);
}

#[tokio::test]
async fn test_upload_rejects_disallowed_extension() {
    let dir = TempDir::new().unwrap();
    let app = create_app(test_state(dir.path(), 1024 * 1024).await);

    let (status, body) = upload(app, multipart_body("payload.exe", b"MZ", Some("s-1"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Bad request");
    assert!(body["details"].as_str().unwrap().contains("pdf"));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_upload_rejects_oversize_file() {
    let dir = TempDir::new().unwrap();
    let app = create_app(test_state(dir.path(), 64).await);

    let (status, body) = upload(app.clone(), multipart_body("big.txt", &[b'x'; 200], Some("s-1"))).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], "File too large");

    let (_, listing) = get(app, "/api/upload/documents/s-1").await;
    assert_eq!(listing, Value::Array(Vec::new()));
}

#[tokio::test]
async fn test_upload_without_file_field_is_bad_request() {
    let dir = TempDir::new().unwrap();
    let app = create_app(test_state(dir.path(), 1024).await);

    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"session_id\"\r\n\r\ns-1\r\n--{BOUNDARY}--\r\n"
    );
    let (status, _) = upload(app, body.into_bytes()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_progress_for_unknown_document_is_404() {
    let dir = TempDir::new().unwrap();
    let app = create_app(test_state(dir.path(), 1024).await);

    let (status, body) = get(app, "/api/upload/progress/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Document not found");
}

#[tokio::test]
async fn test_documents_listing_is_scoped_to_session() {
    let dir = TempDir::new().unwrap();
    let app = create_app(test_state(dir.path(), 1024 * 1024).await);

    upload(app.clone(), multipart_body("one.txt", b"One\n", Some("s-1"))).await;
    upload(app.clone(), multipart_body("two.txt", b"Two\n", Some("s-1"))).await;
    upload(app.clone(), multipart_body("other.txt", b"Other\n", Some("s-2"))).await;

    let (status, listing) = get(app, "/api/upload/documents/s-1").await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = listing
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["filename"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["two.txt", "one.txt"]);
}

#[tokio::test]
async fn test_delete_document_removes_record_and_file() {
    let dir = TempDir::new().unwrap();
    let app = create_app(test_state(dir.path(), 1024 * 1024).await);

    let (_, body) = upload(app.clone(), multipart_body("gone.txt", NOTES, Some("s-1"))).await;
    let document_id = body["document_id"].as_str().unwrap().to_string();
    wait_for_terminal(&app, &document_id).await;

    let (status, body) = delete(app.clone(), &format!("/api/documents/{document_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["deleted_items"]["documents"], 1);
    assert!(!dir.path().join(format!("{document_id}_gone.txt")).exists());

    let (status, _) = get(app.clone(), &format!("/api/upload/progress/{document_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = delete(app, &format!("/api/documents/{document_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_clear_session_removes_all_documents() {
    let dir = TempDir::new().unwrap();
    let app = create_app(test_state(dir.path(), 1024 * 1024).await);

    let mut ids = Vec::new();
    for name in ["a.txt", "b.txt"] {
        let (_, body) = upload(app.clone(), multipart_body(name, NOTES, Some("s-9"))).await;
        ids.push(body["document_id"].as_str().unwrap().to_string());
    }
    for id in &ids {
        wait_for_terminal(&app, id).await;
    }

    let (status, body) = delete(app.clone(), "/api/documents/session/s-9").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted_items"]["documents"], 2);
    assert_eq!(body["deleted_items"]["vector_store"], 1);

    let (_, listing) = get(app.clone(), "/api/upload/documents/s-9").await;
    assert_eq!(listing, Value::Array(Vec::new()));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

    let (status, body) = delete(app, "/api/documents/session/s-9").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Session not found");
}
