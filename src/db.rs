use crate::error::StoreResult;
use crate::session::Session;
use crate::types::{Category, ChatRole, ChatTurn, DocumentRecord};
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_SESSION: &str = "default";

/// SQLite file holding named sessions so a session survives between CLI invocations.
pub struct Db {
    conn: Connection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub name: String,
    pub documents: usize,
    pub chat_messages: usize,
}

impl Db {
    pub fn new(db_path: &Path) -> StoreResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        Self::init(conn)
    }

    pub fn in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT DEFAULT CURRENT_TIMESTAMP
            );
            INSERT INTO schema_version (version) SELECT 1 WHERE NOT EXISTS (SELECT 1 FROM schema_version LIMIT 1);
            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session TEXT NOT NULL,
                filename TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                raw_text TEXT NOT NULL,
                category TEXT NOT NULL,
                extracted_fields TEXT NOT NULL,
                summary TEXT,
                key_value_narrative TEXT
            );
            CREATE TABLE IF NOT EXISTS chat_turns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_documents_session ON documents(session);
            CREATE INDEX IF NOT EXISTS idx_chat_turns_session ON chat_turns(session);
            ",
        )?;
        Ok(Db { conn })
    }

    /// Load a session in insertion order. Unknown names give an empty session.
    pub fn load_session(&self, session: &str) -> StoreResult<Session> {
        let mut stmt = self.conn.prepare(
            "SELECT filename, timestamp, raw_text, category, extracted_fields, summary, key_value_narrative
             FROM documents WHERE session = ? ORDER BY id",
        )?;
        let rows = stmt.query_map(params![session], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<String>>(6)?,
            ))
        })?;
        let mut documents = Vec::new();
        for row in rows {
            let (filename, timestamp, raw_text, category, fields_json, summary, key_value_narrative) = row?;
            let extracted_fields: BTreeMap<String, String> = serde_json::from_str(&fields_json)?;
            documents.push(DocumentRecord {
                filename,
                timestamp,
                raw_text,
                category: Category::from_name(&category),
                extracted_fields,
                summary,
                key_value_narrative,
            });
        }

        let mut stmt = self
            .conn
            .prepare("SELECT role, content FROM chat_turns WHERE session = ? ORDER BY id")?;
        let rows = stmt.query_map(params![session], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut chat = Vec::new();
        for row in rows {
            let (role, content) = row?;
            let role = if role == "assistant" {
                ChatRole::Assistant
            } else {
                ChatRole::User
            };
            chat.push(ChatTurn { role, content });
        }

        Ok(Session::from_parts(documents, chat))
    }

    pub fn add_document(&self, session: &str, record: &DocumentRecord) -> StoreResult<i64> {
        let fields = serde_json::to_string(&record.extracted_fields)?;
        self.conn.execute(
            "INSERT INTO documents (session, filename, timestamp, raw_text, category, extracted_fields, summary, key_value_narrative)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                session,
                record.filename,
                record.timestamp,
                record.raw_text,
                record.category.as_str(),
                fields,
                record.summary,
                record.key_value_narrative
            ],
        )?;
        tracing::debug!(session, filename = %record.filename, "document stored");
        Ok(self.conn.last_insert_rowid())
    }

    pub fn add_chat_turn(&self, session: &str, turn: &ChatTurn) -> StoreResult<i64> {
        let created_at = chrono::Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO chat_turns (session, role, content, created_at) VALUES (?, ?, ?, ?)",
            params![session, turn.role.as_str(), turn.content, created_at],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Remove every document and chat turn of `session`. Returns the number of rows deleted.
    pub fn clear_session(&self, session: &str) -> StoreResult<u64> {
        let docs = self
            .conn
            .execute("DELETE FROM documents WHERE session = ?", params![session])?;
        let turns = self.clear_chat(session)?;
        tracing::info!(session, documents = docs, "session cleared");
        Ok(docs as u64 + turns)
    }

    pub fn clear_chat(&self, session: &str) -> StoreResult<u64> {
        let n = self
            .conn
            .execute("DELETE FROM chat_turns WHERE session = ?", params![session])?;
        Ok(n as u64)
    }

    /// Sessions with at least one document or chat turn, by name.
    pub fn list_sessions(&self) -> StoreResult<Vec<SessionSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.session,
                    (SELECT COUNT(*) FROM documents d WHERE d.session = s.session),
                    (SELECT COUNT(*) FROM chat_turns c WHERE c.session = s.session)
             FROM (SELECT session FROM documents UNION SELECT session FROM chat_turns) s
             ORDER BY s.session",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SessionSummary {
                name: row.get(0)?,
                documents: row.get::<_, i64>(1)? as usize,
                chat_messages: row.get::<_, i64>(2)? as usize,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, category: Category) -> DocumentRecord {
        let mut extracted_fields = BTreeMap::new();
        extracted_fields.insert("name".to_string(), "Jo".to_string());
        DocumentRecord {
            filename: name.to_string(),
            timestamp: "2024-02-03 04:05:06".to_string(),
            raw_text: "Name: Jo\nTotal: 5".to_string(),
            category,
            extracted_fields,
            summary: Some("short".to_string()),
            key_value_narrative: None,
        }
    }

    #[test]
    fn documents_round_trip_in_order() {
        let db = Db::in_memory().unwrap();
        db.add_document("s", &record("a.png", Category::Invoice)).unwrap();
        db.add_document("s", &record("b.png", Category::Tax)).unwrap();
        db.add_document("other", &record("c.png", Category::General)).unwrap();

        let session = db.load_session("s").unwrap();
        assert_eq!(session.documents().len(), 2);
        assert_eq!(session.documents()[0], record("a.png", Category::Invoice));
        assert_eq!(session.documents()[1].category, Category::Tax);
    }

    #[test]
    fn chat_turns_round_trip() {
        let db = Db::in_memory().unwrap();
        db.add_chat_turn("s", &ChatTurn::user("q")).unwrap();
        db.add_chat_turn("s", &ChatTurn::assistant("a")).unwrap();
        let session = db.load_session("s").unwrap();
        assert_eq!(
            session.chat_history(),
            &[ChatTurn::user("q"), ChatTurn::assistant("a")]
        );
    }

    #[test]
    fn clear_only_touches_one_session() {
        let db = Db::in_memory().unwrap();
        db.add_document("s", &record("a.png", Category::Invoice)).unwrap();
        db.add_chat_turn("s", &ChatTurn::user("q")).unwrap();
        db.add_document("keep", &record("b.png", Category::Invoice)).unwrap();

        assert_eq!(db.clear_session("s").unwrap(), 2);
        assert!(db.load_session("s").unwrap().is_empty());
        assert_eq!(db.load_session("keep").unwrap().documents().len(), 1);
    }

    #[test]
    fn clear_chat_keeps_documents() {
        let db = Db::in_memory().unwrap();
        db.add_document("s", &record("a.png", Category::Invoice)).unwrap();
        db.add_chat_turn("s", &ChatTurn::user("q")).unwrap();
        db.clear_chat("s").unwrap();
        let session = db.load_session("s").unwrap();
        assert_eq!(session.documents().len(), 1);
        assert!(session.chat_history().is_empty());
    }

    #[test]
    fn lists_sessions_with_counts() {
        let db = Db::in_memory().unwrap();
        db.add_document("b", &record("a.png", Category::Invoice)).unwrap();
        db.add_chat_turn("a", &ChatTurn::user("q")).unwrap();
        let sessions = db.list_sessions().unwrap();
        assert_eq!(
            sessions,
            vec![
                SessionSummary {
                    name: "a".to_string(),
                    documents: 0,
                    chat_messages: 1
                },
                SessionSummary {
                    name: "b".to_string(),
                    documents: 1,
                    chat_messages: 0
                },
            ]
        );
    }

    #[test]
    fn unknown_session_is_empty() {
        let db = Db::in_memory().unwrap();
        let session = db.load_session("nope").unwrap();
        assert!(session.is_empty());
        assert!(session.chat_history().is_empty());
    }
}
