pub mod models;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};

use crate::config::Settings;
use crate::error::Result;
use models::{ChatMessage, Document};

const SETTINGS_KEY: &str = "settings";
const DOCUMENTS_KEY: &str = "documents";
const CHAT_HISTORY_KEY: &str = "chat_history";

/// Maximum retained transcript entries; oldest are evicted first.
pub const MAX_HISTORY: usize = 100;

/// Local persistence: a SQLite-backed key-value store of serialized JSON
/// blobs (settings, document list, chat transcript). Values are
/// read-modify-written whole under the connection mutex; the surrounding
/// application is single-user, single-session.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn new(app_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(app_dir).ok();
        let db_path = app_dir.join("docchat.db");
        let conn = Connection::open(db_path)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// In-memory database, used by tests.
    pub fn in_memory() -> Result<Self> {
        let db = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    fn get_value(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let result = conn.query_row(
            "SELECT value FROM store WHERE key = ?1",
            params![key],
            |row| row.get(0),
        );
        match result {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_value(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO store (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    // ── Settings ──

    pub fn load_settings(&self) -> Result<Settings> {
        match self.get_value(SETTINGS_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Settings::default()),
        }
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.set_value(SETTINGS_KEY, &serde_json::to_string(settings)?)
    }

    // ── Documents ──

    pub fn list_documents(&self) -> Result<Vec<Document>> {
        match self.get_value(DOCUMENTS_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn get_document(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.list_documents()?.into_iter().find(|d| d.id == id))
    }

    pub fn insert_document(&self, document: &Document) -> Result<()> {
        let mut documents = self.list_documents()?;
        documents.push(document.clone());
        self.set_value(DOCUMENTS_KEY, &serde_json::to_string(&documents)?)
    }

    /// Replace the stored record with the same id, if any.
    pub fn update_document(&self, document: &Document) -> Result<()> {
        let mut documents = self.list_documents()?;
        if let Some(slot) = documents.iter_mut().find(|d| d.id == document.id) {
            *slot = document.clone();
        }
        self.set_value(DOCUMENTS_KEY, &serde_json::to_string(&documents)?)
    }

    pub fn remove_document(&self, id: &str) -> Result<()> {
        let mut documents = self.list_documents()?;
        documents.retain(|d| d.id != id);
        self.set_value(DOCUMENTS_KEY, &serde_json::to_string(&documents)?)
    }

    // ── Chat history ──

    pub fn load_history(&self) -> Result<Vec<ChatMessage>> {
        match self.get_value(CHAT_HISTORY_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// Append a message, evicting the oldest entries beyond [`MAX_HISTORY`].
    pub fn append_message(&self, message: &ChatMessage) -> Result<()> {
        let mut history = self.load_history()?;
        history.push(message.clone());
        if history.len() > MAX_HISTORY {
            let excess = history.len() - MAX_HISTORY;
            history.drain(..excess);
        }
        self.set_value(CHAT_HISTORY_KEY, &serde_json::to_string(&history)?)
    }

    pub fn clear_history(&self) -> Result<()> {
        self.set_value(CHAT_HISTORY_KEY, "[]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_document(id: &str) -> Document {
        Document {
            id: id.to_string(),
            filename: format!("{id}.txt"),
            text: "sample text".into(),
            uploaded_at: Utc::now(),
            processed: false,
            chunk_count: 0,
            file_type: "txt".into(),
            file_size: 11,
        }
    }

    #[test]
    fn settings_roundtrip() {
        let db = Database::in_memory().unwrap();
        assert!(!db.load_settings().unwrap().ready());

        let settings = Settings {
            ai_api_key: Some("sk-test".into()),
            vector_api_key: Some("pc-test".into()),
            ..Default::default()
        };
        db.save_settings(&settings).unwrap();
        let loaded = db.load_settings().unwrap();
        assert!(loaded.ready());
        assert_eq!(loaded.ai_api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn document_insert_update_remove() {
        let db = Database::in_memory().unwrap();
        db.insert_document(&sample_document("a")).unwrap();
        db.insert_document(&sample_document("b")).unwrap();
        assert_eq!(db.list_documents().unwrap().len(), 2);

        let mut doc = db.get_document("a").unwrap().unwrap();
        doc.processed = true;
        doc.chunk_count = 3;
        db.update_document(&doc).unwrap();
        let reloaded = db.get_document("a").unwrap().unwrap();
        assert!(reloaded.processed);
        assert_eq!(reloaded.chunk_count, 3);

        db.remove_document("a").unwrap();
        assert!(db.get_document("a").unwrap().is_none());
        assert_eq!(db.list_documents().unwrap().len(), 1);
    }

    #[test]
    fn history_is_capped_fifo() {
        let db = Database::in_memory().unwrap();
        for i in 0..(MAX_HISTORY + 20) {
            let mut msg = ChatMessage::user(format!("message {i}"));
            msg.id = format!("msg_{i}");
            db.append_message(&msg).unwrap();
        }
        let history = db.load_history().unwrap();
        assert_eq!(history.len(), MAX_HISTORY);
        // Oldest 20 evicted first.
        assert_eq!(history[0].text, "message 20");
        assert_eq!(history.last().unwrap().text, format!("message {}", MAX_HISTORY + 19));
    }

    #[test]
    fn on_disk_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        {
            let db = Database::new(dir.path()).unwrap();
            db.insert_document(&sample_document("persisted")).unwrap();
        }
        let db = Database::new(dir.path()).unwrap();
        assert!(db.get_document("persisted").unwrap().is_some());
    }
}
