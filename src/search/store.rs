//! Embedding record model and the record store capability.
//!
//! A store holds chunk text, vector and provenance for every indexed chunk.
//! Records are owned by exactly one parent document: deleting the parent
//! deletes its records, and re-indexing replaces the parent's whole set.

use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::core::document::{ParentRef, SourceType};

/// Store-assigned record identifier. Ascending ids define store order.
pub type RecordId = u64;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Store lock poisoned: {0}")]
    Lock(String),

    #[error("Corrupt vector for record {id}: {len} bytes")]
    CorruptVector { id: RecordId, len: usize },

    #[error("Corrupt parent reference: {0}")]
    CorruptParent(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

/// One embedded chunk of a parent document.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRecord {
    pub id: RecordId,
    pub chunk_text: String,
    pub vector: Vec<f64>,
    pub source_type: SourceType,
    pub chunk_index: usize,
    pub parent: ParentRef,
    pub created_at: DateTime<Utc>,
}

impl EmbeddingRecord {
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// Insert payload. The source type is taken from the parent.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub parent: ParentRef,
    pub chunk_index: usize,
    pub chunk_text: String,
    pub vector: Vec<f64>,
}

impl NewRecord {
    pub fn new(
        parent: ParentRef,
        chunk_index: usize,
        chunk_text: impl Into<String>,
        vector: Vec<f64>,
    ) -> Self {
        Self {
            parent,
            chunk_index,
            chunk_text: chunk_text.into(),
            vector,
        }
    }

    pub fn source_type(&self) -> SourceType {
        self.parent.source_type
    }

    pub(crate) fn validate(&self) -> Result<(), StoreError> {
        if self.chunk_text.trim().is_empty() {
            return Err(StoreError::InvalidRecord(format!(
                "empty chunk text for {} #{}",
                self.parent, self.chunk_index
            )));
        }
        if self.vector.is_empty() {
            return Err(StoreError::InvalidRecord(format!(
                "empty vector for {} #{}",
                self.parent, self.chunk_index
            )));
        }
        Ok(())
    }
}

/// Record counts for status output.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreStats {
    pub record_count: usize,
    pub meeting_records: usize,
    pub note_records: usize,
    pub parent_count: usize,
    pub last_indexed: Option<DateTime<Utc>>,
}

/// Storage capability consumed by the indexer and search engine.
///
/// The indexer is the only writer; the search engine only reads. Calls for
/// different parents may run concurrently.
pub trait RecordStore: Send + Sync {
    /// Every record, in store order.
    fn fetch_all(&self) -> Result<Vec<EmbeddingRecord>, StoreError>;

    fn fetch_by_source(&self, source: SourceType) -> Result<Vec<EmbeddingRecord>, StoreError> {
        Ok(self
            .fetch_all()?
            .into_iter()
            .filter(|r| r.source_type == source)
            .collect())
    }

    fn fetch_by_parent(&self, parent: &ParentRef) -> Result<Vec<EmbeddingRecord>, StoreError>;

    fn insert(&self, record: NewRecord) -> Result<RecordId, StoreError>;

    /// Returns false when no record had that id.
    fn delete(&self, id: RecordId) -> Result<bool, StoreError>;

    /// Forgets the parent and cascades to all its records. Returns the number
    /// of records removed.
    fn delete_parent(&self, parent: &ParentRef) -> Result<usize, StoreError>;

    /// Deletes every record owned by `parent`, then inserts `records` and
    /// saves. The parent stays registered even when `records` is empty.
    /// Returns the number of records removed.
    fn replace_parent(
        &self,
        parent: &ParentRef,
        records: Vec<NewRecord>,
    ) -> Result<usize, StoreError>;

    /// Parents the store has indexed, including ones with no records.
    fn indexed_parents(&self) -> Result<Vec<ParentRef>, StoreError>;

    fn stats(&self) -> Result<StoreStats, StoreError>;
}

pub(crate) fn check_owner(parent: &ParentRef, records: &[NewRecord]) -> Result<(), StoreError> {
    for record in records {
        if &record.parent != parent {
            return Err(StoreError::InvalidRecord(format!(
                "record for {} passed while replacing {}",
                record.parent, parent
            )));
        }
        record.validate()?;
    }
    Ok(())
}

#[derive(Debug, Default)]
struct Arena {
    records: BTreeMap<RecordId, EmbeddingRecord>,
    owners: BTreeMap<ParentRef, Vec<RecordId>>,
    next_id: RecordId,
}

impl Arena {
    fn push(&mut self, record: NewRecord) -> RecordId {
        let id = self.next_id;
        self.next_id += 1;
        self.owners.entry(record.parent.clone()).or_default().push(id);
        self.records.insert(
            id,
            EmbeddingRecord {
                id,
                source_type: record.source_type(),
                chunk_text: record.chunk_text,
                vector: record.vector,
                chunk_index: record.chunk_index,
                parent: record.parent,
                created_at: Utc::now(),
            },
        );
        id
    }

    fn remove_owned(&mut self, parent: &ParentRef) -> usize {
        let ids = self.owners.get_mut(parent).map(std::mem::take).unwrap_or_default();
        ids.iter()
            .filter(|&&id| self.records.remove(&id).is_some())
            .count()
    }

    fn live(&self) -> impl Iterator<Item = &EmbeddingRecord> {
        self.records.values()
    }
}

/// In-memory arena store.
///
/// Records are keyed by id, which never repeats, so iteration follows insertion
/// order. Each parent holds the list of ids it owns; deleting a parent walks
/// that list and drops those records.
#[derive(Debug, Default)]
pub struct MemoryStore {
    arena: RwLock<Arena>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Arena>, StoreError> {
        self.arena
            .read()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Arena>, StoreError> {
        self.arena
            .write()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }
}

impl RecordStore for MemoryStore {
    fn fetch_all(&self) -> Result<Vec<EmbeddingRecord>, StoreError> {
        Ok(self.read()?.live().cloned().collect())
    }

    fn fetch_by_parent(&self, parent: &ParentRef) -> Result<Vec<EmbeddingRecord>, StoreError> {
        let arena = self.read()?;
        let ids = arena.owners.get(parent).cloned().unwrap_or_default();
        Ok(ids
            .into_iter()
            .filter_map(|id| arena.records.get(&id).cloned())
            .collect())
    }

    fn insert(&self, record: NewRecord) -> Result<RecordId, StoreError> {
        record.validate()?;
        Ok(self.write()?.push(record))
    }

    fn delete(&self, id: RecordId) -> Result<bool, StoreError> {
        let mut arena = self.write()?;
        let Some(record) = arena.records.remove(&id) else {
            return Ok(false);
        };
        if let Some(owned) = arena.owners.get_mut(&record.parent) {
            owned.retain(|&owned_id| owned_id != id);
        }
        Ok(true)
    }

    fn delete_parent(&self, parent: &ParentRef) -> Result<usize, StoreError> {
        let mut arena = self.write()?;
        let removed = arena.remove_owned(parent);
        arena.owners.remove(parent);
        Ok(removed)
    }

    fn replace_parent(
        &self,
        parent: &ParentRef,
        records: Vec<NewRecord>,
    ) -> Result<usize, StoreError> {
        check_owner(parent, &records)?;
        let mut arena = self.write()?;
        let removed = arena.remove_owned(parent);
        arena.owners.entry(parent.clone()).or_default();
        for record in records {
            arena.push(record);
        }
        Ok(removed)
    }

    fn indexed_parents(&self) -> Result<Vec<ParentRef>, StoreError> {
        Ok(self.read()?.owners.keys().cloned().collect())
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        let arena = self.read()?;
        let mut stats = StoreStats {
            parent_count: arena.owners.len(),
            ..StoreStats::default()
        };
        for record in arena.live() {
            stats.record_count += 1;
            match record.source_type {
                SourceType::Meeting => stats.meeting_records += 1,
                SourceType::Note => stats.note_records += 1,
            }
            stats.last_indexed = stats.last_indexed.max(Some(record.created_at));
        }
        Ok(stats)
    }
}
