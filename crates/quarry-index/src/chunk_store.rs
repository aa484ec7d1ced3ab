//! Content-addressed chunk store on sqlite.

use crate::IndexResult;
use quarry_core::{Chunk, Modality};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

/// Sqlite-backed chunk store keyed by content hash.
///
/// Insertion is idempotent: storing the same content twice leaves exactly
/// one row.
pub struct ChunkStore {
    conn: Mutex<Connection>,
}

impl ChunkStore {
    /// Open (or create) the store under `dir`.
    pub fn open(dir: impl AsRef<Path>) -> IndexResult<Self> {
        std::fs::create_dir_all(dir.as_ref())?;
        let conn = Connection::open(dir.as_ref().join("chunks.sqlite"))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS chunks (
                hash TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                metadata TEXT NOT NULL,
                modality TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store for tests and ephemeral sessions.
    pub fn in_memory() -> IndexResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS chunks (
                hash TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                metadata TEXT NOT NULL,
                modality TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert chunks, ignoring hashes already present.
    pub fn add(&self, chunks: &[Chunk]) -> IndexResult<()> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        for chunk in chunks {
            let metadata = serde_json::to_string(&chunk.metadata)
                .map_err(|e| crate::IndexError::Serialization(e.to_string()))?;
            let modality = serde_json::to_string(&chunk.modality)
                .map_err(|e| crate::IndexError::Serialization(e.to_string()))?;
            conn.execute(
                "INSERT OR IGNORE INTO chunks (hash, content, metadata, modality)
                 VALUES (?1, ?2, ?3, ?4)",
                params![chunk.hash, chunk.content, metadata, modality],
            )?;
        }
        Ok(())
    }

    /// Fetch a chunk by hash.
    pub fn get(&self, hash: &str) -> IndexResult<Option<Chunk>> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let row: Option<(String, String, String, String)> = conn
            .query_row(
                "SELECT hash, content, metadata, modality FROM chunks WHERE hash = ?1",
                params![hash],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                    ))
                },
            )
            .optional()?;
        let Some((hash, content, metadata, modality)) = row else {
            return Ok(None);
        };
        let metadata = serde_json::from_str(&metadata)
            .map_err(|e| crate::IndexError::Serialization(e.to_string()))?;
        let modality: Modality = serde_json::from_str(&modality)
            .map_err(|e| crate::IndexError::Serialization(e.to_string()))?;
        Ok(Some(Chunk {
            hash,
            content,
            metadata,
            modality,
        }))
    }

    /// Whether a hash is stored.
    pub fn exist(&self, hash: &str) -> IndexResult<bool> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let count: i64 = conn.query_row(
            "SELECT count(*) FROM chunks WHERE hash = ?1",
            params![hash],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Remove a chunk by hash.
    pub fn delete(&self, hash: &str) -> IndexResult<()> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute("DELETE FROM chunks WHERE hash = ?1", params![hash])?;
        Ok(())
    }

    /// Total stored chunks.
    pub fn count(&self) -> IndexResult<usize> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let count: i64 = conn.query_row("SELECT count(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_insert_keeps_one_row() {
        let store = ChunkStore::in_memory().unwrap();
        let chunk = Chunk::new("deduplicated content");
        store.add(&[chunk.clone()]).unwrap();
        store.add(&[chunk.clone()]).unwrap();
        assert_eq!(store.count().unwrap(), 1);
        assert!(store.exist(&chunk.hash).unwrap());
    }

    #[test]
    fn roundtrips_metadata_and_modality() {
        let store = ChunkStore::in_memory().unwrap();
        let chunk = Chunk::new("with metadata").with_metadata("source", "doc.md");
        store.add(&[chunk.clone()]).unwrap();
        let back = store.get(&chunk.hash).unwrap().unwrap();
        assert_eq!(back, chunk);
    }

    #[test]
    fn hash_stable_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let chunk = Chunk::new("persistent content");
        {
            let store = ChunkStore::open(dir.path()).unwrap();
            store.add(&[chunk.clone()]).unwrap();
        }
        let store = ChunkStore::open(dir.path()).unwrap();
        let again = Chunk::new("persistent content");
        assert_eq!(again.hash, chunk.hash);
        assert!(store.exist(&again.hash).unwrap());
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn delete_removes_row() {
        let store = ChunkStore::in_memory().unwrap();
        let chunk = Chunk::new("to be deleted");
        store.add(&[chunk.clone()]).unwrap();
        store.delete(&chunk.hash).unwrap();
        assert!(store.get(&chunk.hash).unwrap().is_none());
    }
}
