use regex::Regex;
use std::collections::{BTreeSet, HashSet};

use crate::error::{MnemoError, Result};

/// Keyword extraction: a pure function from text to a keyword set.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> BTreeSet<String>;
}

impl<F> Tokenizer for F
where
    F: Fn(&str) -> BTreeSet<String> + Send + Sync,
{
    fn tokenize(&self, text: &str) -> BTreeSet<String> {
        self(text)
    }
}

const STOP_WORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "am", "an", "and", "any", "are", "as", "at", "be",
    "been", "before", "but", "by", "can", "could", "did", "do", "does", "for", "from", "had",
    "has", "have", "he", "her", "his", "how", "i", "if", "in", "into", "is", "it", "its", "just",
    "me", "my", "no", "not", "of", "on", "or", "our", "she", "so", "than", "that", "the", "their",
    "them", "then", "there", "these", "they", "this", "to", "up", "us", "was", "we", "were",
    "what", "when", "where", "which", "who", "why", "will", "with", "would", "you", "your",
];

/// Lowercasing word splitter with a stop-word filter.
///
/// Words are alphanumeric runs by default; `with_pattern` swaps in a regex
/// whose matches are the words.
#[derive(Debug, Clone)]
pub struct StopWordTokenizer {
    stop_words: HashSet<String>,
    min_len: usize,
    pattern: Option<Regex>,
}

impl Default for StopWordTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl StopWordTokenizer {
    pub fn new() -> Self {
        Self {
            stop_words: STOP_WORDS.iter().map(|w| w.to_string()).collect(),
            min_len: 2,
            pattern: None,
        }
    }

    /// Use a custom word pattern (matched against the lowercased text).
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self> {
        let re = Regex::new(pattern)
            .map_err(|e| MnemoError::Config(format!("invalid token pattern '{pattern}': {e}")))?;
        self.pattern = Some(re);
        Ok(self)
    }

    /// Minimum word length (in chars) to keep.
    pub fn with_min_len(mut self, min_len: usize) -> Self {
        self.min_len = min_len;
        self
    }

    /// Add extra stop words.
    pub fn with_stop_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.stop_words
            .extend(words.into_iter().map(|w| w.as_ref().to_lowercase()));
        self
    }

    fn keep(&self, word: &str) -> bool {
        word.chars().count() >= self.min_len && !self.stop_words.contains(word)
    }
}

impl Tokenizer for StopWordTokenizer {
    fn tokenize(&self, text: &str) -> BTreeSet<String> {
        let lower = text.to_lowercase();
        match &self.pattern {
            Some(re) => re
                .find_iter(&lower)
                .map(|m| m.as_str())
                .filter(|w| self.keep(w))
                .map(String::from)
                .collect(),
            None => lower
                .split(|c: char| !c.is_alphanumeric())
                .filter(|w| self.keep(w))
                .map(String::from)
                .collect(),
        }
    }
}
