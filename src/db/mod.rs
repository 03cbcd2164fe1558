pub mod models;

use crate::embedding::{bytes_to_embedding, embedding_to_bytes};
use chrono::{SecondsFormat, Utc};
use models::{
    Category, Conversation, Document, DocumentFilter, DocumentSummary, Message, MessageRole,
    NewDocument, Report, ReportDraft, ReportFilter, ReportStats, ReportStatus, Role,
    SearchableChunk, User,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("database connection lock poisoned")]
    Poisoned,
}

impl DbError {
    /// True when the statement violated a UNIQUE / CHECK / FK constraint.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            DbError::Sqlite(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation
        )
    }
}

pub type Result<T> = std::result::Result<T, DbError>;

pub struct Database {
    conn: Mutex<Connection>,
}

/// RFC 3339 UTC with millisecond precision; sorts lexicographically.
pub fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

const USER_COLUMNS: &str =
    "id, name, email, password_hash, role, is_active, created_at, updated_at";

const DOCUMENT_SELECT: &str = "
    SELECT d.id, d.title, d.content, d.category, d.tags, d.file_name, d.file_type,
           d.file_size, d.uploaded_by, u.name, d.is_public, d.view_count,
           (SELECT COUNT(*) FROM chunks c WHERE c.document_id = d.id),
           (SELECT COUNT(*) FROM chunks c WHERE c.document_id = d.id AND c.embedding IS NOT NULL),
           d.created_at, d.updated_at
    FROM documents d
    LEFT JOIN users u ON u.id = d.uploaded_by";

const REPORT_COLUMNS: &str = "id, reference, user_id, kind, category, location, description, \
                              priority, status, created_at, updated_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        role: row.get(4)?,
        is_active: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn tags_from_json(raw: String) -> Vec<String> {
    serde_json::from_str(&raw).unwrap_or_default()
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        category: row.get(3)?,
        tags: tags_from_json(row.get(4)?),
        file_name: row.get(5)?,
        file_type: row.get(6)?,
        file_size: row.get(7)?,
        uploaded_by: row.get(8)?,
        uploader_name: row.get(9)?,
        is_public: row.get(10)?,
        view_count: row.get(11)?,
        chunk_count: row.get(12)?,
        embedded_chunks: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        last_message: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        user_id: row.get(2)?,
        role: row.get(3)?,
        text: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn report_from_row(row: &Row<'_>) -> rusqlite::Result<Report> {
    Ok(Report {
        id: row.get(0)?,
        reference: row.get(1)?,
        user_id: row.get(2)?,
        kind: row.get(3)?,
        category: row.get(4)?,
        location: row.get(5)?,
        description: row.get(6)?,
        priority: row.get(7)?,
        status: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// Human-facing report number, e.g. `CS-48213`.
fn new_report_reference() -> String {
    let n = uuid::Uuid::new_v4().as_u128() % 90_000 + 10_000;
    format!("CS-{}", n)
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).ok();
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA foreign_keys=ON;

            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'student' CHECK (role IN ('student', 'admin', 'staff')),
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                category TEXT NOT NULL DEFAULT 'other',
                tags TEXT NOT NULL DEFAULT '[]',
                file_name TEXT,
                file_type TEXT,
                file_size INTEGER,
                uploaded_by TEXT NOT NULL,
                is_public INTEGER NOT NULL DEFAULT 1,
                view_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (uploaded_by) REFERENCES users(id)
            );
            CREATE INDEX IF NOT EXISTS idx_documents_category ON documents(category, is_public);

            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                content TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                embedding BLOB,
                created_at TEXT NOT NULL,
                FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id);

            CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL DEFAULT 'New Chat',
                last_message TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id)
            );
            CREATE INDEX IF NOT EXISTS idx_conversations_user ON conversations(user_id, updated_at);

            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                role TEXT NOT NULL CHECK (role IN ('user', 'model')),
                text TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, created_at);

            CREATE TABLE IF NOT EXISTS reports (
                id TEXT PRIMARY KEY,
                reference TEXT NOT NULL UNIQUE,
                user_id TEXT NOT NULL,
                kind TEXT NOT NULL CHECK (kind IN ('security', 'maintenance')),
                category TEXT NOT NULL,
                location TEXT NOT NULL,
                description TEXT NOT NULL,
                priority TEXT NOT NULL DEFAULT 'medium',
                status TEXT NOT NULL DEFAULT 'open',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id)
            );
            CREATE INDEX IF NOT EXISTS idx_reports_user ON reports(user_id, created_at);
            ",
        )?;
        Ok(())
    }

    pub fn ping(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    // ── Users ──

    pub fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User> {
        let conn = self.conn()?;
        let id = new_id();
        let ts = now();
        conn.execute(
            "INSERT INTO users (id, name, email, password_hash, role, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)",
            params![id, name, email, password_hash, role, ts],
        )?;
        let user = conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            user_from_row,
        )?;
        Ok(user)
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn find_user_by_id(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn email_taken(&self, email: &str, except_id: Option<&str>) -> Result<bool> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE email = ?1 AND id != COALESCE(?2, '')",
            params![email, except_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn update_profile(
        &self,
        id: &str,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>> {
        {
            let conn = self.conn()?;
            conn.execute(
                "UPDATE users SET name = COALESCE(?1, name), email = COALESCE(?2, email),
                 updated_at = ?3 WHERE id = ?4",
                params![name, email, now(), id],
            )?;
        }
        self.find_user_by_id(id)
    }

    pub fn set_user_active(&self, id: &str, active: bool) -> Result<Option<User>> {
        {
            let conn = self.conn()?;
            conn.execute(
                "UPDATE users SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
                params![active, now(), id],
            )?;
        }
        self.find_user_by_id(id)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map([], user_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // ── Documents ──

    /// Stores a document and its chunks in one transaction.
    /// Returns the document and the `(chunk_id, text)` pairs still awaiting embeddings.
    pub fn insert_document_with_chunks(
        &self,
        doc: &NewDocument,
        chunks: &[String],
    ) -> Result<(Document, Vec<(String, String)>)> {
        let doc_id = new_id();
        let tags = serde_json::to_string(&doc.tags)?;
        let ts = now();
        let mut saved = Vec::with_capacity(chunks.len());
        {
            let mut conn = self.conn()?;
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO documents (id, title, content, category, tags, file_name, file_type,
                 file_size, uploaded_by, is_public, view_count, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, 0, ?10, ?10)",
                params![
                    doc_id,
                    doc.title,
                    doc.content,
                    doc.category,
                    tags,
                    doc.file_name,
                    doc.file_type,
                    doc.file_size,
                    doc.uploaded_by,
                    ts
                ],
            )?;
            for (i, text) in chunks.iter().enumerate() {
                let chunk_id = new_id();
                tx.execute(
                    "INSERT INTO chunks (id, document_id, content, chunk_index, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![chunk_id, doc_id, text, i as i32, ts],
                )?;
                saved.push((chunk_id, text.clone()));
            }
            tx.commit()?;
        }
        let document = self
            .get_document(&doc_id)?
            .ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))?;
        Ok((document, saved))
    }

    pub fn set_chunk_embedding(&self, chunk_id: &str, embedding: &[f32]) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE chunks SET embedding = ?1 WHERE id = ?2",
            params![embedding_to_bytes(embedding), chunk_id],
        )?;
        Ok(())
    }

    pub fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let conn = self.conn()?;
        let doc = conn
            .query_row(
                &format!("{DOCUMENT_SELECT} WHERE d.id = ?1"),
                params![id],
                document_from_row,
            )
            .optional()?;
        Ok(doc)
    }

    pub fn increment_view_count(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE documents SET view_count = view_count + 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(n > 0)
    }

    /// Public documents, newest first. `page` is 1-based.
    pub fn list_documents(
        &self,
        filter: &DocumentFilter,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<DocumentSummary>, i64)> {
        let mut clauses = vec!["d.is_public = 1".to_string()];
        let mut args: Vec<Value> = Vec::new();
        if let Some(category) = filter.category {
            args.push(Value::Text(category.as_str().to_string()));
            clauses.push(format!("d.category = ?{}", args.len()));
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            args.push(Value::Text(format!("%{}%", search.to_lowercase())));
            let n = args.len();
            clauses.push(format!(
                "(lower(d.title) LIKE ?{n} OR lower(d.content) LIKE ?{n} OR lower(d.tags) LIKE ?{n})"
            ));
        }
        let where_sql = clauses.join(" AND ");

        let conn = self.conn()?;
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM documents d WHERE {where_sql}"),
            params_from_iter(args.iter()),
            |row| row.get(0),
        )?;

        let offset = i64::from(page.max(1) - 1) * i64::from(limit);
        args.push(Value::Integer(i64::from(limit)));
        args.push(Value::Integer(offset));
        let sql = format!(
            "{DOCUMENT_SELECT} WHERE {where_sql}
             ORDER BY d.created_at DESC, d.rowid DESC LIMIT ?{} OFFSET ?{}",
            args.len() - 1,
            args.len()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
            let d = document_from_row(row)?;
            Ok(DocumentSummary {
                id: d.id,
                title: d.title,
                category: d.category,
                tags: d.tags,
                file_name: d.file_name,
                file_type: d.file_type,
                file_size: d.file_size,
                uploaded_by: d.uploaded_by,
                uploader_name: d.uploader_name,
                view_count: d.view_count,
                chunk_count: d.chunk_count,
                embedded_chunks: d.embedded_chunks,
                created_at: d.created_at,
            })
        })?;
        let docs = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((docs, total))
    }

    pub fn delete_document(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let n = conn.execute("DELETE FROM documents WHERE id = ?1", params![id])?;
        Ok(n > 0)
    }

    /// Every chunk of every public document, with embeddings decoded.
    pub fn load_public_chunks(&self) -> Result<Vec<SearchableChunk>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT c.id, c.document_id, d.title, d.category, d.tags, c.content, c.embedding
             FROM chunks c JOIN documents d ON d.id = c.document_id
             WHERE d.is_public = 1
             ORDER BY d.created_at DESC, c.chunk_index ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let category: Category = row.get(3)?;
            let bytes: Option<Vec<u8>> = row.get(6)?;
            Ok(SearchableChunk {
                id: row.get(0)?,
                document_id: row.get(1)?,
                title: row.get(2)?,
                category,
                tags: tags_from_json(row.get(4)?),
                content: row.get(5)?,
                embedding: bytes.map(|b| bytes_to_embedding(&b)),
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // ── Conversations ──

    pub fn get_conversation(&self, id: &str) -> Result<Option<Conversation>> {
        let conn = self.conn()?;
        let conv = conn
            .query_row(
                "SELECT id, user_id, title, last_message, created_at, updated_at
                 FROM conversations WHERE id = ?1",
                params![id],
                conversation_from_row,
            )
            .optional()?;
        Ok(conv)
    }

    pub fn list_conversations(&self, user_id: &str) -> Result<Vec<Conversation>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, title, last_message, created_at, updated_at
             FROM conversations WHERE user_id = ?1 ORDER BY updated_at DESC, rowid DESC",
        )?;
        let rows = stmt.query_map(params![user_id], conversation_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn delete_conversation(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let n = conn.execute("DELETE FROM conversations WHERE id = ?1", params![id])?;
        Ok(n > 0)
    }

    // ── Messages ──

    pub fn get_messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, conversation_id, user_id, role, text, created_at FROM messages
             WHERE conversation_id = ?1 ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt.query_map(params![conversation_id], message_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Store one question/answer pair in a single transaction. Without a
    /// `conversation_id` a new conversation titled `title` is created first.
    /// Returns the conversation id.
    pub fn record_exchange(
        &self,
        conversation_id: Option<&str>,
        user_id: &str,
        title: &str,
        question: &str,
        answer: &str,
        preview: &str,
    ) -> Result<String> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let ts = now();
        let conversation_id = match conversation_id {
            Some(id) => id.to_string(),
            None => {
                let id = new_id();
                tx.execute(
                    "INSERT INTO conversations (id, user_id, title, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?4)",
                    params![id, user_id, title, ts],
                )?;
                id
            }
        };
        for (role, text) in [(MessageRole::User, question), (MessageRole::Model, answer)] {
            tx.execute(
                "INSERT INTO messages (id, conversation_id, user_id, role, text, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![new_id(), conversation_id, user_id, role, text, ts],
            )?;
        }
        tx.execute(
            "UPDATE conversations SET last_message = ?1, updated_at = ?2 WHERE id = ?3",
            params![preview, ts, conversation_id],
        )?;
        tx.commit()?;
        Ok(conversation_id)
    }

    /// The last `limit` messages of a conversation, oldest first.
    pub fn recent_messages(&self, conversation_id: &str, limit: usize) -> Result<Vec<Message>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, conversation_id, user_id, role, text, created_at FROM messages
             WHERE conversation_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![conversation_id, limit as i64], message_from_row)?;
        let mut messages = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        messages.reverse();
        Ok(messages)
    }

    // ── Reports ──

    pub fn create_report(&self, user_id: &str, draft: &ReportDraft) -> Result<Report> {
        let conn = self.conn()?;
        let id = new_id();
        let ts = now();
        let mut attempts = 0;
        loop {
            let inserted = conn.execute(
                "INSERT INTO reports (id, reference, user_id, kind, category, location, description,
                 priority, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
                params![
                    id,
                    new_report_reference(),
                    user_id,
                    draft.kind,
                    draft.category,
                    draft.location,
                    draft.description,
                    draft.priority,
                    ReportStatus::Open,
                    ts
                ],
            );
            match inserted.map_err(DbError::from) {
                Ok(_) => break,
                // reference collision; draw another number
                Err(e) if e.is_constraint_violation() && attempts < 5 => attempts += 1,
                Err(e) => return Err(e),
            }
        }
        let report = conn.query_row(
            &format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = ?1"),
            params![id],
            report_from_row,
        )?;
        Ok(report)
    }

    pub fn get_report(&self, id: &str) -> Result<Option<Report>> {
        let conn = self.conn()?;
        let report = conn
            .query_row(
                &format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = ?1 OR reference = ?1"),
                params![id],
                report_from_row,
            )
            .optional()?;
        Ok(report)
    }

    pub fn list_reports(&self, filter: &ReportFilter) -> Result<Vec<Report>> {
        let mut clauses = vec!["1 = 1".to_string()];
        let mut args: Vec<Value> = Vec::new();
        if let Some(user_id) = &filter.user_id {
            args.push(Value::Text(user_id.clone()));
            clauses.push(format!("user_id = ?{}", args.len()));
        }
        if let Some(status) = filter.status {
            args.push(Value::Text(status.as_str().to_string()));
            clauses.push(format!("status = ?{}", args.len()));
        }
        if let Some(kind) = filter.kind {
            args.push(Value::Text(kind.as_str().to_string()));
            clauses.push(format!("kind = ?{}", args.len()));
        }
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports WHERE {} ORDER BY created_at DESC, rowid DESC",
            clauses.join(" AND ")
        ))?;
        let rows = stmt.query_map(params_from_iter(args.iter()), report_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn update_report_status(&self, id: &str, status: ReportStatus) -> Result<Option<Report>> {
        {
            let conn = self.conn()?;
            conn.execute(
                "UPDATE reports SET status = ?1, updated_at = ?2 WHERE id = ?3 OR reference = ?3",
                params![status, now(), id],
            )?;
        }
        self.get_report(id)
    }

    pub fn report_stats(&self) -> Result<ReportStats> {
        let conn = self.conn()?;
        let stats = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(status = 'open'), 0),
                    COALESCE(SUM(status = 'in_review'), 0),
                    COALESCE(SUM(status = 'resolved'), 0),
                    COALESCE(SUM(status != 'resolved' AND priority IN ('high', 'critical')), 0)
             FROM reports",
            [],
            |row| {
                Ok(ReportStats {
                    total: row.get(0)?,
                    open: row.get(1)?,
                    in_review: row.get(2)?,
                    resolved: row.get(3)?,
                    urgent: row.get(4)?,
                })
            },
        )?;
        Ok(stats)
    }
}
