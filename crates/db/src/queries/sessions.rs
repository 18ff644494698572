// crates/db/src/queries/sessions.rs
// Upload sessions: created on first upload, removed with all their documents.

use chrono::Utc;

use super::documents::DocumentRecord;
use crate::{Database, DbResult};

/// What a session purge removed.
#[derive(Debug, Clone, Default)]
pub struct SessionPurge {
    pub documents: Vec<DocumentRecord>,
    pub session_removed: bool,
}

impl Database {
    /// Create the session row, or bump `last_active` when it already exists.
    pub async fn ensure_session(&self, session_id: &str) -> DbResult<()> {
        let now = Utc::now().timestamp();
        sqlx::query(
            r#"INSERT INTO sessions (session_id, created_at, last_active)
               VALUES (?1, ?2, ?2)
               ON CONFLICT(session_id) DO UPDATE SET last_active = excluded.last_active"#,
        )
        .bind(session_id)
        .bind(now)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn session_exists(&self, session_id: &str) -> DbResult<bool> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT session_id FROM sessions WHERE session_id = ?1")
                .bind(session_id)
                .fetch_optional(self.pool())
                .await?;
        Ok(row.is_some())
    }

    /// Delete every document of a session and then the session row, in one transaction.
    pub async fn delete_session(&self, session_id: &str) -> DbResult<SessionPurge> {
        let documents = self.list_documents(session_id).await?;

        let mut tx = self.pool().begin().await?;
        sqlx::query("DELETE FROM documents WHERE session_id = ?1")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        let removed = sqlx::query("DELETE FROM sessions WHERE session_id = ?1")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(SessionPurge {
            documents,
            session_removed: removed.rows_affected() > 0,
        })
    }
}
