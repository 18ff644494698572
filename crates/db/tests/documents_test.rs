// crates/db/tests/documents_test.rs
//! Integration tests for document job records and sessions.

use docflow_core::{ElementCounts, JobStatus};
use docflow_db::{Database, NewDocument};
use pretty_assertions::assert_eq;

fn new_doc(id: &str, session_id: &str) -> NewDocument {
    NewDocument {
        id: id.to_string(),
        session_id: session_id.to_string(),
        filename: format!("{id}.pdf"),
        file_path: format!("/tmp/uploads/{id}.pdf"),
        file_size: 2048,
    }
}

async fn db_with_doc(id: &str, session_id: &str) -> Database {
    let db = Database::new_in_memory().await.unwrap();
    db.ensure_session(session_id).await.unwrap();
    db.insert_document(&new_doc(id, session_id)).await.unwrap();
    db
}

#[tokio::test]
async fn test_insert_and_get_document() {
    let db = db_with_doc("doc-1", "s-1").await;

    let record = db.get_document("doc-1").await.unwrap().unwrap();
    assert_eq!(record.session_id, "s-1");
    assert_eq!(record.filename, "doc-1.pdf");
    assert_eq!(record.file_size, 2048);
    assert_eq!(record.status, JobStatus::Uploading);
    assert_eq!(record.element_count, 0);
    assert_eq!(record.chunk_count, 0);
    assert!(record.element_counts.is_empty());
    assert!(record.processed_at.is_none());
    assert!(record.error_message.is_none());
    assert!(record.index_handle.is_none());
}

#[tokio::test]
async fn test_get_unknown_document_is_none() {
    let db = Database::new_in_memory().await.unwrap();
    assert!(db.get_document("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn test_insert_requires_session() {
    let db = Database::new_in_memory().await.unwrap();
    let result = db.insert_document(&new_doc("doc-1", "missing")).await;
    assert!(result.is_err(), "foreign key should reject unknown session");
}

#[tokio::test]
async fn test_counters_and_handle_are_stored() {
    let db = db_with_doc("doc-1", "s-1").await;
    let counts = ElementCounts::from([
        ("image".to_string(), 1),
        ("table".to_string(), 2),
        ("text".to_string(), 7),
    ]);

    assert!(db.set_document_status("doc-1", JobStatus::Partitioning).await.unwrap());
    assert!(db.record_partition("doc-1", 10, &counts).await.unwrap());
    assert!(db.set_document_status("doc-1", JobStatus::Chunking).await.unwrap());
    assert!(db.record_chunks("doc-1", 4).await.unwrap());
    assert!(db.set_document_status("doc-1", JobStatus::Vectorizing).await.unwrap());
    assert!(db.record_index_handle("doc-1", "session_s-1").await.unwrap());
    assert!(db.set_document_status("doc-1", JobStatus::Completed).await.unwrap());

    let record = db.get_document("doc-1").await.unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Completed);
    assert_eq!(record.element_count, 10);
    assert_eq!(record.element_counts, counts);
    assert_eq!(record.chunk_count, 4);
    assert_eq!(record.index_handle.as_deref(), Some("session_s-1"));
    assert!(record.processed_at.is_some());
}

#[tokio::test]
async fn test_terminal_records_reject_writes() {
    let db = db_with_doc("doc-1", "s-1").await;
    assert!(db.mark_failed("doc-1", "chunking failed: boom").await.unwrap());

    assert!(!db.set_document_status("doc-1", JobStatus::Chunking).await.unwrap());
    assert!(!db.set_document_status("doc-1", JobStatus::Completed).await.unwrap());
    assert!(!db.record_chunks("doc-1", 9).await.unwrap());
    assert!(!db.record_partition("doc-1", 9, &ElementCounts::new()).await.unwrap());
    assert!(!db.record_index_handle("doc-1", "x").await.unwrap());
    assert!(!db.mark_failed("doc-1", "second failure").await.unwrap());

    let record = db.get_document("doc-1").await.unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.chunk_count, 0);
    assert_eq!(record.error_message.as_deref(), Some("chunking failed: boom"));
}

#[tokio::test]
async fn test_completed_record_cannot_fail() {
    let db = db_with_doc("doc-1", "s-1").await;
    assert!(db.set_document_status("doc-1", JobStatus::Completed).await.unwrap());
    assert!(!db.mark_failed("doc-1", "late error").await.unwrap());

    let record = db.get_document("doc-1").await.unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Completed);
    assert!(record.error_message.is_none());
}

#[tokio::test]
async fn test_updates_on_unknown_document_change_nothing() {
    let db = Database::new_in_memory().await.unwrap();
    assert!(!db.set_document_status("ghost", JobStatus::Partitioning).await.unwrap());
    assert!(!db.mark_failed("ghost", "x").await.unwrap());
}

#[tokio::test]
async fn test_list_documents_is_scoped_to_session() {
    let db = Database::new_in_memory().await.unwrap();
    db.ensure_session("s-1").await.unwrap();
    db.ensure_session("s-2").await.unwrap();
    db.insert_document(&new_doc("a", "s-1")).await.unwrap();
    db.insert_document(&new_doc("b", "s-1")).await.unwrap();
    db.insert_document(&new_doc("c", "s-2")).await.unwrap();

    let ids: Vec<String> = db
        .list_documents("s-1")
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.id)
        .collect();
    // Same-second uploads fall back to insertion order, newest first.
    assert_eq!(ids, vec!["b".to_string(), "a".to_string()]);
    assert!(db.list_documents("s-3").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_document() {
    let db = db_with_doc("doc-1", "s-1").await;

    let removed = db.delete_document("doc-1").await.unwrap().unwrap();
    assert_eq!(removed.file_path, "/tmp/uploads/doc-1.pdf");
    assert!(db.get_document("doc-1").await.unwrap().is_none());
    assert!(db.delete_document("doc-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_session_removes_documents_and_row() {
    let db = Database::new_in_memory().await.unwrap();
    db.ensure_session("s-1").await.unwrap();
    db.insert_document(&new_doc("a", "s-1")).await.unwrap();
    db.insert_document(&new_doc("b", "s-1")).await.unwrap();

    let purge = db.delete_session("s-1").await.unwrap();
    assert_eq!(purge.documents.len(), 2);
    assert!(purge.session_removed);
    assert!(!db.session_exists("s-1").await.unwrap());
    assert!(db.list_documents("s-1").await.unwrap().is_empty());

    let again = db.delete_session("s-1").await.unwrap();
    assert!(again.documents.is_empty());
    assert!(!again.session_removed);
}

#[tokio::test]
async fn test_ensure_session_is_idempotent() {
    let db = Database::new_in_memory().await.unwrap();
    db.ensure_session("s-1").await.unwrap();
    db.ensure_session("s-1").await.unwrap();
    assert!(db.session_exists("s-1").await.unwrap());
}
