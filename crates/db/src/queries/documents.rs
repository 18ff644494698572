// crates/db/src/queries/documents.rs
//! Document job records.
//!
//! Every status or counter write is conditional on the record not being
//! terminal yet; the `bool` returned says whether a row actually changed.

use chrono::Utc;
use docflow_core::{ElementCounts, JobStatus};
use serde::Serialize;

use super::row_types::{DocumentRow, DOCUMENT_COLUMNS};
use crate::{Database, DbResult};

const NOT_TERMINAL: &str = "status NOT IN ('completed', 'failed')";

/// One document's pipeline record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentRecord {
    pub id: String,
    pub session_id: String,
    pub filename: String,
    pub file_path: String,
    pub file_size: u64,
    pub status: JobStatus,
    pub element_count: u64,
    pub chunk_count: u64,
    pub element_counts: ElementCounts,
    /// Unix seconds.
    pub uploaded_at: i64,
    pub processed_at: Option<i64>,
    pub error_message: Option<String>,
    pub index_handle: Option<String>,
}

/// Fields supplied by the intake path when a job is created.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub id: String,
    pub session_id: String,
    pub filename: String,
    pub file_path: String,
    pub file_size: u64,
}

impl Database {
    /// Insert a new record in `uploading` status. The session row must exist.
    pub async fn insert_document(&self, doc: &NewDocument) -> DbResult<()> {
        sqlx::query(
            r#"INSERT INTO documents (id, session_id, filename, file_path, file_size, status, uploaded_at)
               VALUES (?1, ?2, ?3, ?4, ?5, 'uploading', ?6)"#,
        )
        .bind(&doc.id)
        .bind(&doc.session_id)
        .bind(&doc.filename)
        .bind(&doc.file_path)
        .bind(doc.file_size as i64)
        .bind(Utc::now().timestamp())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn get_document(&self, id: &str) -> DbResult<Option<DocumentRecord>> {
        let row: Option<DocumentRow> =
            sqlx::query_as(&format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"))
                .bind(id)
                .fetch_optional(self.pool())
                .await?;
        Ok(row.map(DocumentRow::into_record).transpose()?)
    }

    /// All records for a session, newest upload first.
    pub async fn list_documents(&self, session_id: &str) -> DbResult<Vec<DocumentRecord>> {
        let rows: Vec<DocumentRow> = sqlx::query_as(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE session_id = ?1 \
             ORDER BY uploaded_at DESC, rowid DESC"
        ))
        .bind(session_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows
            .into_iter()
            .map(DocumentRow::into_record)
            .collect::<Result<_, _>>()?)
    }

    /// Move a record to `status`. Reaching a terminal status stamps `processed_at`.
    pub async fn set_document_status(&self, id: &str, status: JobStatus) -> DbResult<bool> {
        let processed_at = status.is_terminal().then(|| Utc::now().timestamp());
        let result = sqlx::query(&format!(
            "UPDATE documents SET status = ?1, processed_at = COALESCE(?2, processed_at) \
             WHERE id = ?3 AND {NOT_TERMINAL}"
        ))
        .bind(status.as_str())
        .bind(processed_at)
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Store the partition stage's element totals.
    pub async fn record_partition(
        &self,
        id: &str,
        element_count: u64,
        element_counts: &ElementCounts,
    ) -> DbResult<bool> {
        let counts_json = serde_json::to_string(element_counts)?;
        let result = sqlx::query(&format!(
            "UPDATE documents SET element_count = ?1, element_counts = ?2 \
             WHERE id = ?3 AND {NOT_TERMINAL}"
        ))
        .bind(element_count as i64)
        .bind(counts_json)
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn record_chunks(&self, id: &str, chunk_count: u64) -> DbResult<bool> {
        let result = sqlx::query(&format!(
            "UPDATE documents SET chunk_count = ?1 WHERE id = ?2 AND {NOT_TERMINAL}"
        ))
        .bind(chunk_count as i64)
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn record_index_handle(&self, id: &str, handle: &str) -> DbResult<bool> {
        let result = sqlx::query(&format!(
            "UPDATE documents SET index_handle = ?1 WHERE id = ?2 AND {NOT_TERMINAL}"
        ))
        .bind(handle)
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a record FAILED with `message`.
    pub async fn mark_failed(&self, id: &str, message: &str) -> DbResult<bool> {
        let result = sqlx::query(&format!(
            "UPDATE documents SET status = 'failed', error_message = ?1, processed_at = ?2 \
             WHERE id = ?3 AND {NOT_TERMINAL}"
        ))
        .bind(message)
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove a record, returning it when it existed.
    pub async fn delete_document(&self, id: &str) -> DbResult<Option<DocumentRecord>> {
        let Some(record) = self.get_document(id).await? else {
            return Ok(None);
        };
        sqlx::query("DELETE FROM documents WHERE id = ?1")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(Some(record))
    }
}
