// crates/db/src/queries/row_types.rs
// Internal row types decoded by hand from SQLite rows.

use docflow_core::{ElementCounts, JobStatus};
use sqlx::Row;

use super::documents::DocumentRecord;

#[derive(Debug)]
pub(crate) struct DocumentRow {
    id: String,
    session_id: String,
    filename: String,
    file_path: String,
    file_size: i64,
    status: String,
    element_count: i64,
    chunk_count: i64,
    element_counts: String,
    uploaded_at: i64,
    processed_at: Option<i64>,
    error_message: Option<String>,
    index_handle: Option<String>,
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for DocumentRow {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            session_id: row.try_get("session_id")?,
            filename: row.try_get("filename")?,
            file_path: row.try_get("file_path")?,
            file_size: row.try_get("file_size")?,
            status: row.try_get("status")?,
            element_count: row.try_get("element_count")?,
            chunk_count: row.try_get("chunk_count")?,
            element_counts: row.try_get("element_counts")?,
            uploaded_at: row.try_get("uploaded_at")?,
            processed_at: row.try_get("processed_at")?,
            error_message: row.try_get("error_message")?,
            index_handle: row.try_get("index_handle")?,
        })
    }
}

impl DocumentRow {
    pub(crate) fn into_record(self) -> Result<DocumentRecord, sqlx::Error> {
        let status = JobStatus::parse(&self.status).ok_or_else(|| sqlx::Error::ColumnDecode {
            index: "status".into(),
            source: format!("unknown job status '{}'", self.status).into(),
        })?;
        let element_counts: ElementCounts =
            serde_json::from_str(&self.element_counts).map_err(|e| sqlx::Error::ColumnDecode {
                index: "element_counts".into(),
                source: Box::new(e),
            })?;

        Ok(DocumentRecord {
            id: self.id,
            session_id: self.session_id,
            filename: self.filename,
            file_path: self.file_path,
            file_size: self.file_size.max(0) as u64,
            status,
            element_count: self.element_count.max(0) as u64,
            chunk_count: self.chunk_count.max(0) as u64,
            element_counts,
            uploaded_at: self.uploaded_at,
            processed_at: self.processed_at,
            error_message: self.error_message,
            index_handle: self.index_handle,
        })
    }
}

/// Columns selected for every document read, in `DocumentRow` order.
pub(crate) const DOCUMENT_COLUMNS: &str = "id, session_id, filename, file_path, file_size, \
     status, element_count, chunk_count, element_counts, uploaded_at, processed_at, \
     error_message, index_handle";
