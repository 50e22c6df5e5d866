//! Text Parser (C1): tokenizes a [`crate::text::Text`] into paragraphs,
//! sentences, and words; counts long words; memoizes on the text
//! fingerprint.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

/// Words of length greater than this are "long".
pub const LONG_WORD_THRESHOLD: usize = 6;
/// Words of length greater than this are "very long".
pub const VERY_LONG_WORD_THRESHOLD: usize = 9;

static SENTENCE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?:[.!?]+['"\u{201d}\u{2019}]?\s+|\n\s*\n)"#).unwrap());
static WORD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\p{L}\p{N}]+").unwrap());
static PARAGRAPH_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());

/// The memoized breakdown of one piece of text.
///
/// Invariant: `word_count` equals the sum of each sentence's word count;
/// every sentence and word token is a substring drawn from the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedText {
    pub paragraphs: Vec<String>,
    pub sentences: Vec<String>,
    pub words: Vec<String>,
    pub long_word_count: usize,
    pub very_long_word_count: usize,
}

impl ParsedText {
    pub fn empty() -> Self {
        Self {
            paragraphs: Vec::new(),
            sentences: Vec::new(),
            words: Vec::new(),
            long_word_count: 0,
            very_long_word_count: 0,
        }
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    pub fn sentence_count(&self) -> usize {
        self.sentences.len()
    }

    pub fn paragraph_count(&self) -> usize {
        self.paragraphs.len()
    }

    /// Words belonging to sentence `index`, derived by re-splitting that
    /// sentence on the same word pattern used for the whole text. Used by
    /// the sentence/word analyzers, which need a per-sentence word slice.
    pub fn words_in_sentence(&self, index: usize) -> Vec<String> {
        match self.sentences.get(index) {
            Some(sentence) => WORD_PATTERN
                .find_iter(sentence)
                .map(|m| m.as_str().to_string())
                .collect(),
            None => Vec::new(),
        }
    }
}

fn is_long(word: &str) -> bool {
    word.chars().count() > LONG_WORD_THRESHOLD
}

fn is_very_long(word: &str) -> bool {
    word.chars().count() > VERY_LONG_WORD_THRESHOLD
}

struct MemoCache {
    map: HashMap<u64, Arc<ParsedText>>,
    order: VecDeque<u64>,
    capacity: usize,
}

impl MemoCache {
    fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    fn get(&self, key: u64) -> Option<Arc<ParsedText>> {
        self.map.get(&key).cloned()
    }

    fn insert(&mut self, key: u64, value: Arc<ParsedText>) {
        if self.map.contains_key(&key) {
            return;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.map.remove(&oldest);
            }
        }
        self.order.push_back(key);
        self.map.insert(key, value);
    }
}

/// Parses text into paragraphs/sentences/words with a bounded memoization
/// table keyed on the text's content hash.
pub struct TextParser {
    cache: Mutex<MemoCache>,
}

impl TextParser {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: Mutex::new(MemoCache::new(capacity)),
        }
    }

    /// Parse is total: any input, including empty or whitespace-only text,
    /// yields a `ParsedText` (empty text yields an empty one with zero
    /// counts). There is no error case.
    pub fn parse(&self, normalized_text: &str) -> Arc<ParsedText> {
        if normalized_text.is_empty() {
            return Arc::new(ParsedText::empty());
        }

        let key = content_hash(normalized_text);
        if let Some(hit) = self.cache.lock().unwrap().get(key) {
            return hit;
        }

        let parsed = Arc::new(self.parse_uncached(normalized_text));
        self.cache.lock().unwrap().insert(key, parsed.clone());
        parsed
    }

    fn parse_uncached(&self, text: &str) -> ParsedText {
        let paragraphs = split_paragraphs(text);
        let sentences = split_sentences(text);
        let words: Vec<String> = WORD_PATTERN
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect();

        let mut long_word_count = 0;
        let mut very_long_word_count = 0;
        for word in &words {
            if is_long(word) {
                long_word_count += 1;
            }
            if is_very_long(word) {
                very_long_word_count += 1;
            }
        }

        ParsedText {
            paragraphs,
            sentences,
            words,
            long_word_count,
            very_long_word_count,
        }
    }
}

impl Default for TextParser {
    fn default() -> Self {
        Self::new()
    }
}

fn content_hash(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

/// Split on runs of `. ! ?` (one or more), optionally followed by a closing
/// quote, or on a blank line. Empty fragments are discarded. A non-empty
/// text always yields at least one sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let pieces: Vec<&str> = SENTENCE_PATTERN.split(text).collect();
    let sentences: Vec<String> = pieces
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if sentences.is_empty() && !text.trim().is_empty() {
        return vec![text.trim().to_string()];
    }
    sentences
}

/// Split on maximal runs of alphanumeric characters (including {æ, ø, å}).
pub fn split_words(text: &str) -> Vec<String> {
    WORD_PATTERN.find_iter(text).map(|m| m.as_str().to_string()).collect()
}

/// Split on blank-line runs.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    PARAGRAPH_PATTERN
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Count words with length greater than `min_length`, in a single pass.
pub fn count_long_words(words: &[String], min_length: usize) -> usize {
    words.iter().filter(|w| w.chars().count() > min_length).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_total_and_empty() {
        let parser = TextParser::new();
        let parsed = parser.parse("");
        assert_eq!(parsed.word_count(), 0);
        assert_eq!(parsed.sentence_count(), 0);
        assert_eq!(parsed.long_word_count, 0);
    }

    #[test]
    fn scenario_s1_hei_dette_er_en_test() {
        let parser = TextParser::new();
        let parsed = parser.parse("Hei. Dette er en test.");
        assert_eq!(parsed.word_count(), 5);
        assert_eq!(parsed.sentence_count(), 2);
        assert_eq!(parsed.long_word_count, 0);
    }

    #[test]
    fn scenario_s2_long_words_in_one_sentence() {
        let parser = TextParser::new();
        let parsed =
            parser.parse("Implementeringen av funksjonaliteten krever omfattende dokumentasjon.");
        assert_eq!(parsed.sentence_count(), 1);
        assert_eq!(parsed.word_count(), 6);
        assert_eq!(parsed.long_word_count, 6);
    }

    #[test]
    fn paragraphs_split_on_blank_lines() {
        let parsed = split_paragraphs("Først avsnitt.\n\nAndre avsnitt her.");
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn norwegian_letters_count_as_word_characters() {
        let words = split_words("Blåbærsyltetøy er godt på brødskive.");
        assert!(words.contains(&"Blåbærsyltetøy".to_string()));
    }

    #[test]
    fn memoization_hits_on_repeat_parse() {
        let parser = TextParser::with_capacity(4);
        let first = parser.parse("Gjentatt setning.");
        let second = parser.parse("Gjentatt setning.");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn memoization_evicts_oldest_beyond_capacity() {
        let parser = TextParser::with_capacity(2);
        let a = parser.parse("Tekst A.");
        let _b = parser.parse("Tekst B.");
        let _c = parser.parse("Tekst C.");
        let a_again = parser.parse("Tekst A.");
        assert!(!Arc::ptr_eq(&a, &a_again));
    }

    #[test]
    fn long_word_counting_single_pass() {
        let words = vec!["kort".to_string(), "implementere".to_string()];
        assert_eq!(count_long_words(&words, 6), 1);
    }
}
