/// Inline SQL migrations for the docflow database schema.
///
/// We use simple inline migrations rather than sqlx migration files
/// because the schema is small and self-contained.

pub const MIGRATIONS: &[&str] = &[
    // Migration 1: sessions table
    r#"
CREATE TABLE IF NOT EXISTS sessions (
    session_id  TEXT PRIMARY KEY,
    created_at  INTEGER NOT NULL,
    last_active INTEGER NOT NULL
);
"#,
    // Migration 2: documents table (one row per pipeline job)
    r#"
CREATE TABLE IF NOT EXISTS documents (
    id             TEXT PRIMARY KEY,
    session_id     TEXT NOT NULL REFERENCES sessions(session_id),
    filename       TEXT NOT NULL,
    file_path      TEXT NOT NULL,
    file_size      INTEGER NOT NULL,
    status         TEXT NOT NULL DEFAULT 'uploading',
    element_count  INTEGER NOT NULL DEFAULT 0,
    chunk_count    INTEGER NOT NULL DEFAULT 0,
    element_counts TEXT NOT NULL DEFAULT '{}',
    uploaded_at    INTEGER NOT NULL,
    processed_at   INTEGER,
    error_message  TEXT
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_documents_session ON documents(session_id);"#,
    r#"CREATE INDEX IF NOT EXISTS idx_documents_uploaded ON documents(uploaded_at DESC);"#,
    // Migration 3: index handle returned by the vectorize stage
    r#"ALTER TABLE documents ADD COLUMN index_handle TEXT;"#,
];
