//! Search Engine - hybrid semantic + keyword ranking over the record store
//!
//! The engine is stateless: every call is a pure function of the current
//! store contents and the query.

use serde::Serialize;
use tracing::debug;

use super::embedding::{cosine_similarity, EmbeddingProvider};
use super::keywords::{extract_keywords, StopWords};
use super::store::{EmbeddingRecord, RecordStore, StoreError};
use crate::core::document::{ParentRef, SourceType};

/// Results scoring below this are dropped (inclusive bound).
pub const SIMILARITY_THRESHOLD: f64 = 0.3;

/// Boost per matched keyword, divided by the keyword count.
pub const KEYWORD_MATCH_WEIGHT: f64 = 0.15;

/// Extra boost per keyword found near the start of a chunk.
pub const EARLY_MATCH_BONUS: f64 = 0.1;

/// "Near the start" means within this many characters.
pub const EARLY_MATCH_WINDOW: usize = 100;

pub const MAX_KEYWORD_BOOST: f64 = 0.5;

pub const MAX_COMBINED_SCORE: f64 = 1.0;

pub const DEFAULT_TOP_K: usize = 5;

/// A ranked chunk.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub chunk_text: String,
    pub source_type: SourceType,
    pub score: f64,
    pub parent: ParentRef,
    pub chunk_index: usize,
    #[serde(skip)]
    pub record: EmbeddingRecord,
}

impl SearchResult {
    fn new(record: EmbeddingRecord, score: f64) -> Self {
        Self {
            chunk_text: record.chunk_text.clone(),
            source_type: record.source_type,
            score,
            parent: record.parent.clone(),
            chunk_index: record.chunk_index,
            record,
        }
    }
}

/// Search engine combining an embedding provider with lexical boosting
pub struct SearchEngine<'a> {
    provider: &'a dyn EmbeddingProvider,
    stop_words: StopWords,
}

impl<'a> SearchEngine<'a> {
    pub fn new(provider: &'a dyn EmbeddingProvider) -> Self {
        Self::with_stop_words(provider, StopWords::english())
    }

    pub fn with_stop_words(provider: &'a dyn EmbeddingProvider, stop_words: StopWords) -> Self {
        Self {
            provider,
            stop_words,
        }
    }

    /// Ranks every stored chunk against `query` and returns the best `top_k`.
    ///
    /// An unavailable provider, a blank query or `top_k == 0` give an empty
    /// result rather than an error.
    pub fn search(
        &self,
        store: &dyn RecordStore,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, StoreError> {
        self.search_filtered(store, query, top_k, None)
    }

    /// Like [`search`](Self::search), restricted to one source type.
    ///
    /// The restriction is applied before truncation, so a note-only query
    /// still returns up to `top_k` notes.
    pub fn search_filtered(
        &self,
        store: &dyn RecordStore,
        query: &str,
        top_k: usize,
        source: Option<SourceType>,
    ) -> Result<Vec<SearchResult>, StoreError> {
        if top_k == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = match self.query_vector(query) {
            Some(v) => v,
            None => {
                debug!("No query vector, returning no results");
                return Ok(Vec::new());
            }
        };

        let records = match source {
            Some(source) => store.fetch_by_source(source)?,
            None => store.fetch_all()?,
        };

        Ok(self.rank(&query_vector, query, records, top_k))
    }

    fn query_vector(&self, query: &str) -> Option<Vec<f64>> {
        if !self.provider.is_available() {
            return None;
        }
        self.provider.generate_vector(query).filter(|v| !v.is_empty())
    }

    /// Scores, filters, sorts and truncates. `records` must be in store order.
    fn rank(
        &self,
        query_vector: &[f64],
        query: &str,
        records: Vec<EmbeddingRecord>,
        top_k: usize,
    ) -> Vec<SearchResult> {
        let keywords = extract_keywords(query, &self.stop_words);
        let total = records.len();
        let mut mismatched = 0;

        let mut results: Vec<SearchResult> = records
            .into_iter()
            .filter_map(|record| {
                if record.dimension() != query_vector.len() {
                    mismatched += 1;
                    return None;
                }
                let semantic = cosine_similarity(query_vector, &record.vector);
                let boost = keyword_boost(&keywords, &record.chunk_text);
                let score = combined_score(semantic, boost);
                (score >= SIMILARITY_THRESHOLD).then(|| SearchResult::new(record, score))
            })
            .collect();

        if mismatched > 0 {
            debug!(mismatched, "Skipped records with a different vector dimension");
        }

        // sort_by is stable: equal scores keep store order
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(top_k);

        debug!(
            candidates = total,
            returned = results.len(),
            keywords = keywords.len(),
            "Search complete"
        );
        results
    }
}

/// Lexical boost for `text`, in `[0, MAX_KEYWORD_BOOST]`.
pub fn keyword_boost(keywords: &[String], text: &str) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }

    let lowered = text.to_lowercase();
    let early: String = lowered.chars().take(EARLY_MATCH_WINDOW).collect();

    let mut matches = 0usize;
    let mut early_bonus = 0.0;
    for keyword in keywords {
        if lowered.contains(keyword.as_str()) {
            matches += 1;
        }
        if early.contains(keyword.as_str()) {
            early_bonus += EARLY_MATCH_BONUS;
        }
    }

    let base = matches as f64 * KEYWORD_MATCH_WEIGHT / keywords.len() as f64;
    (base + early_bonus).min(MAX_KEYWORD_BOOST)
}

pub fn combined_score(semantic: f64, boost: f64) -> f64 {
    (semantic + boost).min(MAX_COMBINED_SCORE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::embedding::{DisabledProvider, HarmonicEmbedder};
    use crate::search::store::{MemoryStore, NewRecord};

    /// Maps every query to a fixed vector.
    struct FixedProvider(Vec<f64>);

    impl EmbeddingProvider for FixedProvider {
        fn is_available(&self) -> bool {
            true
        }

        fn dimension(&self) -> usize {
            self.0.len()
        }

        fn generate_vector(&self, _text: &str) -> Option<Vec<f64>> {
            Some(self.0.clone())
        }
    }

    fn axis() -> FixedProvider {
        FixedProvider(vec![1.0, 0.0, 0.0, 0.0])
    }

    fn insert(store: &MemoryStore, parent: ParentRef, text: &str, vector: Vec<f64>) {
        store.insert(NewRecord::new(parent, 0, text, vector)).unwrap();
    }

    fn keywords(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_keyword_boost_empty_keywords() {
        assert_eq!(keyword_boost(&[], "anything at all"), 0.0);
    }

    #[test]
    fn test_keyword_boost_early_and_late_matches() {
        let kw = keywords(&["budget"]);
        // one match out of one keyword, inside the early window
        assert!((keyword_boost(&kw, "Budget review") - 0.25).abs() < 1e-12);

        // match past the early window only gets the base boost
        let late = format!("{} budget", "x".repeat(120));
        assert!((keyword_boost(&kw, &late) - 0.15).abs() < 1e-12);

        assert_eq!(keyword_boost(&kw, "nothing relevant"), 0.0);
    }

    #[test]
    fn test_keyword_boost_is_capped() {
        let kw = keywords(&["alpha", "beta", "gamma", "delta", "epsilon", "zeta"]);
        let boost = keyword_boost(&kw, "alpha beta gamma delta epsilon zeta");
        assert_eq!(boost, MAX_KEYWORD_BOOST);
    }

    #[test]
    fn test_combined_score_is_capped() {
        assert_eq!(combined_score(0.9, 0.5), 1.0);
        assert!((combined_score(0.2, 0.1) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let store = MemoryStore::new();
        // cosine with [1,0,0,0] is 3/10 = 0.3 exactly
        insert(&store, ParentRef::note("edge"), "edge", vec![3.0, 9.0, 3.0, 1.0]);
        // cosine 0.2
        insert(&store, ParentRef::note("below"), "below", vec![2.0, 8.0, 4.0, 4.0]);

        let provider = axis();
        let engine = SearchEngine::new(&provider);
        // only stop words, so no keyword boost
        let results = engine.search(&store, "the", 10).unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk_text, "edge");
        assert!((results[0].score - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_keyword_boost_lifts_record_over_threshold() {
        let store = MemoryStore::new();
        insert(
            &store,
            ParentRef::note("n"),
            "Budget planning notes",
            vec![2.0, 8.0, 4.0, 4.0],
        );

        let provider = axis();
        let engine = SearchEngine::new(&provider);
        assert_eq!(engine.search(&store, "roadmap", 5).unwrap().len(), 0);

        let results = engine.search(&store, "budget", 5).unwrap();
        assert_eq!(results.len(), 1);
        assert!((results[0].score - 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_results_sorted_and_truncated() {
        let store = MemoryStore::new();
        insert(&store, ParentRef::note("a"), "a", vec![1.0, 1.0, 0.0, 0.0]);
        insert(&store, ParentRef::note("b"), "b", vec![1.0, 0.0, 0.0, 0.0]);
        insert(&store, ParentRef::note("c"), "c", vec![1.0, 1.0, 1.0, 0.0]);
        insert(&store, ParentRef::note("d"), "d", vec![0.0, 1.0, 0.0, 0.0]);

        let provider = axis();
        let engine = SearchEngine::new(&provider);

        let all = engine.search(&store, "the", 10).unwrap();
        let order: Vec<&str> = all.iter().map(|r| r.chunk_text.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
        assert!(all.windows(2).all(|w| w[0].score >= w[1].score));

        let top = engine.search(&store, "the", 2).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].chunk_text, "b");
    }

    #[test]
    fn test_ties_keep_store_order() {
        let store = MemoryStore::new();
        for name in ["first", "second", "third"] {
            insert(&store, ParentRef::note(name), name, vec![1.0, 0.0, 0.0, 0.0]);
        }

        let provider = axis();
        let results = SearchEngine::new(&provider)
            .search(&store, "the", 3)
            .unwrap();
        let order: Vec<&str> = results.iter().map(|r| r.chunk_text.as_str()).collect();
        assert_eq!(order, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_dimension_mismatch_is_skipped() {
        let store = MemoryStore::new();
        insert(&store, ParentRef::note("short"), "short", vec![1.0, 0.0]);
        insert(&store, ParentRef::note("ok"), "ok", vec![1.0, 0.0, 0.0, 0.0]);

        let provider = axis();
        let results = SearchEngine::new(&provider)
            .search(&store, "the", 5)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk_text, "ok");
    }

    #[test]
    fn test_unavailable_provider_and_degenerate_queries() {
        let store = MemoryStore::new();
        insert(&store, ParentRef::note("n"), "text", vec![1.0, 0.0, 0.0, 0.0]);

        let disabled = DisabledProvider::new(4);
        assert!(SearchEngine::new(&disabled)
            .search(&store, "text", 5)
            .unwrap()
            .is_empty());

        let provider = axis();
        let engine = SearchEngine::new(&provider);
        assert!(engine.search(&store, "text", 0).unwrap().is_empty());
        assert!(engine.search(&store, "   ", 5).unwrap().is_empty());
    }

    #[test]
    fn test_search_filtered_by_source() {
        let store = MemoryStore::new();
        insert(&store, ParentRef::meeting("m"), "meeting", vec![1.0, 0.0, 0.0, 0.0]);
        insert(&store, ParentRef::note("n1"), "note one", vec![1.0, 0.1, 0.0, 0.0]);
        insert(&store, ParentRef::note("n2"), "note two", vec![1.0, 0.2, 0.0, 0.0]);

        let provider = axis();
        let engine = SearchEngine::new(&provider);

        let notes = engine
            .search_filtered(&store, "the", 2, Some(SourceType::Note))
            .unwrap();
        assert_eq!(notes.len(), 2);
        assert!(notes.iter().all(|r| r.source_type == SourceType::Note));

        let meetings = engine
            .search_filtered(&store, "the", 5, Some(SourceType::Meeting))
            .unwrap();
        assert_eq!(meetings.len(), 1);
        assert_eq!(meetings[0].parent, ParentRef::meeting("m"));
    }

    #[test]
    fn test_harmonic_search_finds_matching_text() {
        let store = MemoryStore::new();
        let provider = HarmonicEmbedder::new();
        for (id, text) in [
            ("budget", "Note 'Budget': quarterly budget review and spending plan"),
            ("garden", "Note 'Garden': plant tomatoes and water the roses"),
        ] {
            let vector = provider.generate_vector(text).unwrap();
            insert(&store, ParentRef::note(id), text, vector);
        }

        let results = SearchEngine::new(&provider)
            .search(&store, "budget review", 5)
            .unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].parent, ParentRef::note("budget"));
        assert!(results.iter().all(|r| r.score <= 1.0));
    }
}
