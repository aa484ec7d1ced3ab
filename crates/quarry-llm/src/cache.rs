//! Sqlite-backed chat response cache.

use crate::{LlmError, LlmResult};
use quarry_core::chunk_hash;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

/// Response cache keyed by `(prompt hash, backend name)`.
///
/// Extraction re-runs the same prompts on every rebuild; caching makes a
/// rebuild over an unchanged corpus close to free.
pub struct ChatCache {
    conn: Mutex<Connection>,
}

impl ChatCache {
    pub fn open(path: impl AsRef<Path>) -> LlmResult<Self> {
        let conn =
            Connection::open(path.as_ref()).map_err(|e| LlmError::Cache(e.to_string()))?;
        Self::init(conn)
    }

    pub fn in_memory() -> LlmResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| LlmError::Cache(e.to_string()))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> LlmResult<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS chat (
                hash TEXT NOT NULL,
                backend TEXT NOT NULL,
                prompt TEXT NOT NULL,
                response TEXT NOT NULL,
                PRIMARY KEY (hash, backend)
            )",
            [],
        )
        .map_err(|e| LlmError::Cache(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Store a response; an existing entry for the same key is kept.
    pub fn add(&self, prompt: &str, backend: &str, response: &str) -> LlmResult<()> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "INSERT OR IGNORE INTO chat (hash, backend, prompt, response)
             VALUES (?1, ?2, ?3, ?4)",
            params![chunk_hash(prompt), backend, prompt, response],
        )
        .map_err(|e| LlmError::Cache(e.to_string()))?;
        Ok(())
    }

    /// Look up a cached response.
    pub fn get(&self, prompt: &str, backend: &str) -> LlmResult<Option<String>> {
        if prompt.is_empty() {
            return Ok(None);
        }
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.query_row(
            "SELECT response FROM chat WHERE hash = ?1 AND backend = ?2",
            params![chunk_hash(prompt), backend],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| LlmError::Cache(e.to_string()))
    }
}
