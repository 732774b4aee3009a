//! Query keyword extraction for lexical boosting.

use std::collections::HashSet;

/// Tokens shorter than this never become keywords.
pub const MIN_KEYWORD_LEN: usize = 3;

/// Articles, auxiliaries, pronouns, prepositions and common query verbs.
pub const ENGLISH_STOP_WORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "could", "should", "may", "might", "can", "to", "of",
    "in", "for", "on", "with", "at", "by", "from", "as", "into", "about", "what", "which", "who",
    "whom", "this", "that", "these", "those", "am", "my", "me", "i", "you", "your", "tell",
    "show", "find", "get", "give",
];

/// A named set of words ignored when extracting keywords.
#[derive(Debug, Clone)]
pub struct StopWords {
    words: HashSet<String>,
}

impl StopWords {
    pub fn english() -> Self {
        Self::from_words(ENGLISH_STOP_WORDS.iter().copied())
    }

    pub fn none() -> Self {
        Self {
            words: HashSet::new(),
        }
    }

    /// Words are compared lowercased.
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            words: words.into_iter().map(|w| w.as_ref().to_lowercase()).collect(),
        }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl Default for StopWords {
    fn default() -> Self {
        Self::english()
    }
}

/// Lowercases the query, splits on non-alphanumeric characters and keeps
/// tokens of at least [`MIN_KEYWORD_LEN`] characters that are not stop words.
///
/// Duplicates are kept: a repeated query word counts once per occurrence.
pub fn extract_keywords(query: &str, stop_words: &StopWords) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() >= MIN_KEYWORD_LEN && !stop_words.contains(token))
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_drops_stop_words_and_short_tokens() {
        let keywords = extract_keywords("What is the budget for Q3?", &StopWords::english());
        assert_eq!(keywords, vec!["budget"]);
    }

    #[test]
    fn test_extract_splits_on_punctuation() {
        let keywords = extract_keywords("show me roadmap-planning, launch!", &StopWords::english());
        assert_eq!(keywords, vec!["roadmap", "planning", "launch"]);
    }

    #[test]
    fn test_extract_only_stop_words() {
        assert!(extract_keywords("tell me what you have", &StopWords::english()).is_empty());
        assert!(extract_keywords("", &StopWords::english()).is_empty());
    }

    #[test]
    fn test_custom_stop_words() {
        let stop = StopWords::from_words(["Budget"]);
        assert!(stop.contains("budget"));
        assert_eq!(extract_keywords("the budget", &stop), vec!["the"]);
        assert_eq!(
            extract_keywords("the budget", &StopWords::none()),
            vec!["the", "budget"]
        );
    }
}
