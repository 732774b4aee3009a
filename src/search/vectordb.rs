//! Vector database using SQLite
//!
//! Stores chunk embeddings as BLOBs (little-endian `f64`) and computes
//! similarity in Rust. Each indexed document has a row in `documents`;
//! its embeddings reference it with `ON DELETE CASCADE`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use tracing::debug;

use super::store::{
    check_owner, EmbeddingRecord, NewRecord, RecordId, RecordStore, StoreError, StoreStats,
};
use crate::core::document::{ParentRef, SourceType};

/// SQLite-backed record store.
pub struct VectorDB {
    conn: Mutex<Connection>,
}

const SELECT_RECORD: &str = "SELECT id, parent_key, chunk_index, chunk_text, embedding, created_at FROM embeddings";

impl VectorDB {
    /// Open or create database at path
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        Self::init(conn)
    }

    /// Open in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- Indexed parent documents
            CREATE TABLE IF NOT EXISTS documents (
                parent_key TEXT PRIMARY KEY,
                source_type TEXT NOT NULL,
                mtime INTEGER,
                indexed_at INTEGER NOT NULL
            );

            -- One row per embedded chunk
            CREATE TABLE IF NOT EXISTS embeddings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                parent_key TEXT NOT NULL,
                source_type TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                chunk_text TEXT NOT NULL,
                embedding BLOB NOT NULL,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (parent_key) REFERENCES documents(parent_key) ON DELETE CASCADE
            );

            -- Index metadata
            CREATE TABLE IF NOT EXISTS index_meta (
                key TEXT PRIMARY KEY,
                value TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_embeddings_parent ON embeddings(parent_key);
            CREATE INDEX IF NOT EXISTS idx_embeddings_source ON embeddings(source_type);
            "#,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }

    fn query_records(
        conn: &Connection,
        sql: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<EmbeddingRecord>, StoreError> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(args, RawRecord::from_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }
        Ok(records)
    }

    /// Source mtimes of indexed documents, for incremental indexing.
    pub fn document_mtimes(&self) -> Result<HashMap<ParentRef, i64>, StoreError> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT parent_key, mtime FROM documents WHERE mtime IS NOT NULL")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;

        let mut result = HashMap::new();
        for row in rows {
            let (key, mtime) = row?;
            result.insert(parse_parent(&key)?, mtime);
        }
        Ok(result)
    }

    /// Records the source mtime a parent was indexed from.
    pub fn set_document_mtime(&self, parent: &ParentRef, mtime: i64) -> Result<(), StoreError> {
        self.conn()?.execute(
            "UPDATE documents SET mtime = ?2 WHERE parent_key = ?1",
            params![parent.key(), mtime],
        )?;
        Ok(())
    }

    /// Set index metadata
    pub fn set_meta(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT INTO index_meta (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Get index metadata
    pub fn get_meta(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.conn()?
            .query_row(
                "SELECT value FROM index_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| e.into())
    }
}

fn register_parent(tx: &Transaction<'_>, parent: &ParentRef) -> rusqlite::Result<()> {
    tx.execute(
        r#"
        INSERT INTO documents (parent_key, source_type, indexed_at)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(parent_key) DO UPDATE SET indexed_at = excluded.indexed_at
        "#,
        params![parent.key(), parent.source_type.as_str(), Utc::now().timestamp()],
    )?;
    Ok(())
}

fn insert_row(tx: &Transaction<'_>, record: &NewRecord) -> rusqlite::Result<RecordId> {
    tx.execute(
        r#"
        INSERT INTO embeddings (parent_key, source_type, chunk_index, chunk_text, embedding, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![
            record.parent.key(),
            record.source_type().as_str(),
            record.chunk_index as i64,
            record.chunk_text,
            vector_to_blob(&record.vector),
            Utc::now().timestamp_millis(),
        ],
    )?;
    Ok(tx.last_insert_rowid() as RecordId)
}

fn count_owned(tx: &Transaction<'_>, parent: &ParentRef) -> rusqlite::Result<usize> {
    let count: i64 = tx.query_row(
        "SELECT COUNT(*) FROM embeddings WHERE parent_key = ?1",
        params![parent.key()],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

impl RecordStore for VectorDB {
    fn fetch_all(&self) -> Result<Vec<EmbeddingRecord>, StoreError> {
        let conn = self.conn()?;
        Self::query_records(&conn, &format!("{} ORDER BY id", SELECT_RECORD), &[])
    }

    fn fetch_by_source(&self, source: SourceType) -> Result<Vec<EmbeddingRecord>, StoreError> {
        let conn = self.conn()?;
        Self::query_records(
            &conn,
            &format!("{} WHERE source_type = ?1 ORDER BY id", SELECT_RECORD),
            &[&source.as_str()],
        )
    }

    fn fetch_by_parent(&self, parent: &ParentRef) -> Result<Vec<EmbeddingRecord>, StoreError> {
        let conn = self.conn()?;
        Self::query_records(
            &conn,
            &format!("{} WHERE parent_key = ?1 ORDER BY id", SELECT_RECORD),
            &[&parent.key()],
        )
    }

    fn insert(&self, record: NewRecord) -> Result<RecordId, StoreError> {
        record.validate()?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO documents (parent_key, source_type, indexed_at) VALUES (?1, ?2, ?3)",
            params![
                record.parent.key(),
                record.source_type().as_str(),
                Utc::now().timestamp()
            ],
        )?;
        let id = insert_row(&tx, &record)?;
        tx.commit()?;
        Ok(id)
    }

    fn delete(&self, id: RecordId) -> Result<bool, StoreError> {
        let changed = self
            .conn()?
            .execute("DELETE FROM embeddings WHERE id = ?1", params![id as i64])?;
        Ok(changed > 0)
    }

    fn delete_parent(&self, parent: &ParentRef) -> Result<usize, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let removed = count_owned(&tx, parent)?;
        tx.execute(
            "DELETE FROM documents WHERE parent_key = ?1",
            params![parent.key()],
        )?;
        tx.commit()?;
        debug!(parent = %parent, removed, "Deleted parent and its records");
        Ok(removed)
    }

    /// Runs in one transaction, so readers see either the old or the new set.
    fn replace_parent(
        &self,
        parent: &ParentRef,
        records: Vec<NewRecord>,
    ) -> Result<usize, StoreError> {
        check_owner(parent, &records)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        register_parent(&tx, parent)?;
        let removed = count_owned(&tx, parent)?;
        tx.execute(
            "DELETE FROM embeddings WHERE parent_key = ?1",
            params![parent.key()],
        )?;
        for record in &records {
            insert_row(&tx, record)?;
        }
        tx.commit()?;
        Ok(removed)
    }

    fn indexed_parents(&self) -> Result<Vec<ParentRef>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT parent_key FROM documents ORDER BY parent_key")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut parents = Vec::new();
        for row in rows {
            parents.push(parse_parent(&row?)?);
        }
        Ok(parents)
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        let conn = self.conn()?;
        let mut stats = StoreStats::default();

        let mut stmt =
            conn.prepare("SELECT source_type, COUNT(*) FROM embeddings GROUP BY source_type")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
        for row in rows {
            let (source, count) = row?;
            let count = count as usize;
            stats.record_count += count;
            match source.parse::<SourceType>() {
                Ok(SourceType::Meeting) => stats.meeting_records += count,
                Ok(SourceType::Note) => stats.note_records += count,
                Err(_) => {}
            }
        }

        let parent_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        stats.parent_count = parent_count as usize;

        let last_indexed: Option<i64> = conn
            .query_row("SELECT MAX(indexed_at) FROM documents", [], |row| row.get(0))
            .optional()?
            .flatten();
        stats.last_indexed = last_indexed.and_then(|ts| DateTime::from_timestamp(ts, 0));

        Ok(stats)
    }
}

/// Row as read from SQLite, before blob and key decoding.
struct RawRecord {
    id: i64,
    parent_key: String,
    chunk_index: i64,
    chunk_text: String,
    embedding: Vec<u8>,
    created_at: i64,
}

impl RawRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            parent_key: row.get(1)?,
            chunk_index: row.get(2)?,
            chunk_text: row.get(3)?,
            embedding: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn into_record(self) -> Result<EmbeddingRecord, StoreError> {
        let id = self.id as RecordId;
        let parent = parse_parent(&self.parent_key)?;
        let vector = blob_to_vector(&self.embedding).ok_or(StoreError::CorruptVector {
            id,
            len: self.embedding.len(),
        })?;

        Ok(EmbeddingRecord {
            id,
            chunk_text: self.chunk_text,
            vector,
            source_type: parent.source_type,
            chunk_index: self.chunk_index.max(0) as usize,
            parent,
            created_at: DateTime::from_timestamp_millis(self.created_at).unwrap_or_default(),
        })
    }
}

fn parse_parent(key: &str) -> Result<ParentRef, StoreError> {
    key.parse().map_err(StoreError::CorruptParent)
}

/// Convert f64 vector to BLOB
fn vector_to_blob(vector: &[f64]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(vector.len() * 8);
    for &val in vector {
        blob.extend_from_slice(&val.to_le_bytes());
    }
    blob
}

/// Convert BLOB to f64 vector; `None` when the length is not a multiple of 8.
fn blob_to_vector(blob: &[u8]) -> Option<Vec<f64>> {
    if blob.len() % 8 != 0 {
        return None;
    }
    Some(
        blob.chunks_exact(8)
            .map(|chunk| {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(chunk);
                f64::from_le_bytes(bytes)
            })
            .collect(),
    )
}
