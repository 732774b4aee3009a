//! Indexer - chunk, embed and store documents
//!
//! Re-indexing a document replaces its whole record set. Concurrent calls for
//! different documents do not interfere. Concurrent calls for the same
//! document are not serialized here: the last writer's set wins, so callers
//! that may race on one document should serialize those calls themselves.

use std::collections::HashSet;
use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::chunker::chunk_document;
use super::embedding::EmbeddingProvider;
use super::store::{NewRecord, RecordStore, StoreError};
use crate::core::document::{Document, ParentRef};

/// Result of indexing one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexOutcome {
    pub parent: ParentRef,
    /// Chunks produced by the chunker.
    pub chunks: usize,
    /// Records written.
    pub stored: usize,
    /// Chunks the provider returned no vector for.
    pub skipped: usize,
    /// Records of the previous index that were replaced.
    pub removed: usize,
}

/// Indexing statistics for a backlog pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexingStats {
    pub indexed: usize,
    pub empty: usize,
    pub failed: usize,
    pub records: usize,
    pub skipped_chunks: usize,
    pub cancelled: bool,
    pub duration_ms: u128,
}

pub struct Indexer<'a> {
    provider: &'a dyn EmbeddingProvider,
}

impl<'a> Indexer<'a> {
    pub fn new(provider: &'a dyn EmbeddingProvider) -> Self {
        Self { provider }
    }

    /// Rebuilds every record owned by `document`.
    ///
    /// Chunks the provider cannot embed are skipped; with the provider
    /// unavailable the document ends up with no records. Only storage
    /// failures are errors.
    pub fn index_document(
        &self,
        store: &dyn RecordStore,
        document: &Document,
    ) -> Result<IndexOutcome, StoreError> {
        let parent = document.parent_ref();
        self.index_chunks(store, &parent, chunk_document(document))
    }

    /// Same as [`index_document`](Self::index_document) for pre-chunked text.
    pub fn index_chunks(
        &self,
        store: &dyn RecordStore,
        parent: &ParentRef,
        chunks: Vec<String>,
    ) -> Result<IndexOutcome, StoreError> {
        let chunk_count = chunks.len();

        let vectors = if chunks.is_empty() {
            Vec::new()
        } else if !self.provider.is_available() {
            debug!(parent = %parent, "Embedding provider unavailable, clearing records");
            Vec::new()
        } else {
            let texts: Vec<&str> = chunks.iter().map(String::as_str).collect();
            self.provider.generate_vectors(&texts)
        };

        let mut vectors = vectors.into_iter();
        let mut records = Vec::with_capacity(chunk_count);
        for (index, chunk) in chunks.into_iter().enumerate() {
            match vectors.next().flatten() {
                Some(vector) if !vector.is_empty() => {
                    records.push(NewRecord::new(parent.clone(), index, chunk, vector));
                }
                _ => debug!(parent = %parent, chunk_index = index, "No vector for chunk, skipping"),
            }
        }

        let stored = records.len();
        let removed = store.replace_parent(parent, records)?;

        debug!(
            parent = %parent,
            chunks = chunk_count,
            stored,
            removed,
            "Indexed document"
        );

        Ok(IndexOutcome {
            parent: parent.clone(),
            chunks: chunk_count,
            stored,
            skipped: chunk_count - stored,
            removed,
        })
    }

    /// Indexes a backlog of documents, checking `cancel` between documents.
    pub fn index_all<'d, I>(
        &self,
        store: &dyn RecordStore,
        documents: I,
        cancel: &CancellationToken,
    ) -> IndexingStats
    where
        I: IntoIterator<Item = &'d Document>,
    {
        self.index_all_with(store, documents, cancel, |_, _| {})
    }

    /// Like [`index_all`](Self::index_all), calling `on_indexed` after each
    /// document is stored.
    ///
    /// A cancelled pass stops before the next document: documents already
    /// processed keep their new records, the rest keep their old ones.
    /// Storage failures are counted and logged, and the pass moves on.
    pub fn index_all_with<'d, I, F>(
        &self,
        store: &dyn RecordStore,
        documents: I,
        cancel: &CancellationToken,
        mut on_indexed: F,
    ) -> IndexingStats
    where
        I: IntoIterator<Item = &'d Document>,
        F: FnMut(&Document, &IndexOutcome),
    {
        let start = Instant::now();
        let mut stats = IndexingStats::default();

        for document in documents {
            if cancel.is_cancelled() {
                info!(indexed = stats.indexed, "Indexing pass cancelled");
                stats.cancelled = true;
                break;
            }

            match self.index_document(store, document) {
                Ok(outcome) => {
                    if outcome.chunks == 0 {
                        stats.empty += 1;
                    } else {
                        stats.indexed += 1;
                    }
                    stats.records += outcome.stored;
                    stats.skipped_chunks += outcome.skipped;
                    on_indexed(document, &outcome);
                }
                Err(e) => {
                    warn!(parent = %document.parent_ref(), error = %e, "Failed to index document");
                    stats.failed += 1;
                }
            }
        }

        stats.duration_ms = start.elapsed().as_millis();
        stats
    }
}

/// Deletes a document's records (cascade). Returns the number removed.
pub fn remove_document(store: &dyn RecordStore, parent: &ParentRef) -> Result<usize, StoreError> {
    store.delete_parent(parent)
}

/// Deletes every indexed parent that is not in `live`. Returns the number of
/// parents removed.
pub fn prune_missing(
    store: &dyn RecordStore,
    live: &HashSet<ParentRef>,
) -> Result<usize, StoreError> {
    let mut pruned = 0;
    for parent in store.indexed_parents()? {
        if !live.contains(&parent) {
            let removed = store.delete_parent(&parent)?;
            debug!(parent = %parent, removed, "Pruned missing document");
            pruned += 1;
        }
    }
    Ok(pruned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::document::{Meeting, Note};
    use crate::search::embedding::{DisabledProvider, HarmonicEmbedder};
    use crate::search::store::{EmbeddingRecord, MemoryStore, RecordId, StoreStats};
    use chrono::Local;

    /// Provider that refuses chunks containing a marker word.
    struct PickyProvider;

    impl EmbeddingProvider for PickyProvider {
        fn is_available(&self) -> bool {
            true
        }

        fn dimension(&self) -> usize {
            2
        }

        fn generate_vector(&self, text: &str) -> Option<Vec<f64>> {
            if text.contains("unembeddable") {
                None
            } else {
                Some(vec![1.0, text.len() as f64])
            }
        }
    }

    /// Store that refuses to write one parent's records.
    struct FailingStore {
        inner: MemoryStore,
        broken: ParentRef,
    }

    impl RecordStore for FailingStore {
        fn fetch_all(&self) -> Result<Vec<EmbeddingRecord>, StoreError> {
            self.inner.fetch_all()
        }

        fn fetch_by_parent(&self, parent: &ParentRef) -> Result<Vec<EmbeddingRecord>, StoreError> {
            self.inner.fetch_by_parent(parent)
        }

        fn insert(&self, record: NewRecord) -> Result<RecordId, StoreError> {
            self.inner.insert(record)
        }

        fn delete(&self, id: RecordId) -> Result<bool, StoreError> {
            self.inner.delete(id)
        }

        fn delete_parent(&self, parent: &ParentRef) -> Result<usize, StoreError> {
            self.inner.delete_parent(parent)
        }

        fn replace_parent(
            &self,
            parent: &ParentRef,
            records: Vec<NewRecord>,
        ) -> Result<usize, StoreError> {
            if *parent == self.broken {
                return Err(StoreError::Lock("store unavailable".into()));
            }
            self.inner.replace_parent(parent, records)
        }

        fn indexed_parents(&self) -> Result<Vec<ParentRef>, StoreError> {
            self.inner.indexed_parents()
        }

        fn stats(&self) -> Result<StoreStats, StoreError> {
            self.inner.stats()
        }
    }

    fn meeting() -> Document {
        let mut m = Meeting::new("m1", "Budget Review", Local::now());
        m.attendees = vec!["Dana".into()];
        m.location = Some("HQ".into());
        m.notes = Some("We went over the Q3 numbers in detail.".into());
        m.purpose = Some("Approve the budget".into());
        m.action_items = Some("Dana sends the final sheet".into());
        Document::Meeting(m)
    }

    #[test]
    fn test_index_meeting_creates_records() {
        let store = MemoryStore::new();
        let provider = HarmonicEmbedder::new();
        let outcome = Indexer::new(&provider)
            .index_document(&store, &meeting())
            .unwrap();

        assert_eq!(outcome.chunks, 4);
        assert_eq!(outcome.stored, 4);
        assert_eq!(outcome.removed, 0);

        let records = store.fetch_by_parent(&ParentRef::meeting("m1")).unwrap();
        let indexes: Vec<usize> = records.iter().map(|r| r.chunk_index).collect();
        assert_eq!(indexes, vec![0, 1, 2, 3]);
        assert!(records.iter().all(|r| r.vector.len() == 512));
    }

    #[test]
    fn test_reindex_is_idempotent() {
        let store = MemoryStore::new();
        let provider = HarmonicEmbedder::new();
        let indexer = Indexer::new(&provider);
        let doc = meeting();

        indexer.index_document(&store, &doc).unwrap();
        let first = store.fetch_all().unwrap();
        let outcome = indexer.index_document(&store, &doc).unwrap();
        let second = store.fetch_all().unwrap();

        assert_eq!(outcome.removed, first.len());
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.chunk_text, b.chunk_text);
            assert_eq!(a.vector, b.vector);
            assert_eq!(a.chunk_index, b.chunk_index);
        }
    }

    #[test]
    fn test_partial_indexing_skips_missing_vectors() {
        let store = MemoryStore::new();
        let parent = ParentRef::note("n");
        let chunks = vec![
            "first chunk".to_string(),
            "an unembeddable chunk".to_string(),
            "third chunk".to_string(),
        ];
        let outcome = Indexer::new(&PickyProvider)
            .index_chunks(&store, &parent, chunks)
            .unwrap();

        assert_eq!(outcome.stored, 2);
        assert_eq!(outcome.skipped, 1);
        let indexes: Vec<usize> = store
            .fetch_by_parent(&parent)
            .unwrap()
            .iter()
            .map(|r| r.chunk_index)
            .collect();
        assert_eq!(indexes, vec![0, 2]);
    }

    #[test]
    fn test_empty_note_produces_no_records() {
        let store = MemoryStore::new();
        let provider = HarmonicEmbedder::new();
        let indexer = Indexer::new(&provider);
        for (id, body) in [("empty", ""), ("blank", "  \n\t ")] {
            let doc = Document::Note(Note::new(id, "Empty", body));
            let outcome = indexer.index_document(&store, &doc).unwrap();
            assert_eq!(outcome.chunks, 0);
        }

        assert_eq!(store.stats().unwrap().record_count, 0);
        assert_eq!(store.indexed_parents().unwrap().len(), 2);
    }

    #[test]
    fn test_unavailable_provider_produces_no_records() {
        let store = MemoryStore::new();
        let provider = DisabledProvider::new(512);
        let outcome = Indexer::new(&provider)
            .index_document(&store, &meeting())
            .unwrap();

        assert_eq!(outcome.stored, 0);
        assert_eq!(outcome.skipped, outcome.chunks);
        assert!(store.fetch_all().unwrap().is_empty());
    }

    #[test]
    fn test_index_all_counts() {
        let store = MemoryStore::new();
        let provider = HarmonicEmbedder::new();
        let docs = vec![
            meeting(),
            Document::Note(Note::new("a", "A", "alpha beta gamma")),
            Document::Note(Note::new("b", "B", "")),
        ];

        let mut seen = Vec::new();
        let stats = Indexer::new(&provider).index_all_with(
            &store,
            &docs,
            &CancellationToken::new(),
            |doc, _| seen.push(doc.parent_ref()),
        );

        assert_eq!(stats.indexed, 2);
        assert_eq!(stats.empty, 1);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.records, 5);
        assert!(!stats.cancelled);
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_index_all_stops_when_cancelled() {
        let store = MemoryStore::new();
        let provider = HarmonicEmbedder::new();
        let docs: Vec<Document> = (0..5)
            .map(|i| Document::Note(Note::new(format!("n{}", i), "N", "some words here")))
            .collect();

        let cancel = CancellationToken::new();
        let stats = Indexer::new(&provider).index_all_with(&store, &docs, &cancel, |doc, _| {
            if doc.parent_ref() == ParentRef::note("n1") {
                cancel.cancel();
            }
        });

        assert!(stats.cancelled);
        assert_eq!(stats.indexed, 2);
        assert_eq!(store.indexed_parents().unwrap().len(), 2);
        assert_eq!(store.fetch_by_parent(&ParentRef::note("n0")).unwrap().len(), 1);
    }

    #[test]
    fn test_index_document_propagates_store_failure() {
        let store = FailingStore {
            inner: MemoryStore::new(),
            broken: ParentRef::meeting("m1"),
        };
        let provider = HarmonicEmbedder::new();

        let err = Indexer::new(&provider)
            .index_document(&store, &meeting())
            .unwrap_err();
        assert!(matches!(err, StoreError::Lock(_)));
        assert!(store.indexed_parents().unwrap().is_empty());
    }

    #[test]
    fn test_index_all_continues_after_store_failure() {
        let store = FailingStore {
            inner: MemoryStore::new(),
            broken: ParentRef::note("a"),
        };
        let provider = HarmonicEmbedder::new();
        let docs = vec![
            Document::Note(Note::new("a", "A", "alpha beta gamma")),
            Document::Note(Note::new("b", "B", "delta epsilon zeta")),
        ];

        let mut seen = Vec::new();
        let stats = Indexer::new(&provider).index_all_with(
            &store,
            &docs,
            &CancellationToken::new(),
            |doc, _| seen.push(doc.parent_ref()),
        );

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.indexed, 1);
        assert_eq!(stats.records, 1);
        assert_eq!(seen, vec![ParentRef::note("b")]);
        assert!(store.fetch_by_parent(&ParentRef::note("a")).unwrap().is_empty());
        assert_eq!(store.fetch_by_parent(&ParentRef::note("b")).unwrap().len(), 1);
    }

    #[test]
    fn test_remove_document_cascades() {
        let store = MemoryStore::new();
        let provider = HarmonicEmbedder::new();
        Indexer::new(&provider)
            .index_document(&store, &meeting())
            .unwrap();

        let parent = ParentRef::meeting("m1");
        assert_eq!(remove_document(&store, &parent).unwrap(), 4);
        assert!(store.fetch_by_parent(&parent).unwrap().is_empty());
    }

    #[test]
    fn test_prune_missing() {
        let store = MemoryStore::new();
        let provider = HarmonicEmbedder::new();
        let indexer = Indexer::new(&provider);
        indexer.index_document(&store, &meeting()).unwrap();
        indexer
            .index_document(&store, &Document::Note(Note::new("keep", "Keep", "kept text")))
            .unwrap();

        let live: HashSet<ParentRef> = [ParentRef::note("keep")].into_iter().collect();
        assert_eq!(prune_missing(&store, &live).unwrap(), 1);
        assert_eq!(store.indexed_parents().unwrap(), vec![ParentRef::note("keep")]);
    }
}
