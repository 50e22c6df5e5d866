//! Word analyzer (C3): per-word length, frequency, position, style, and
//! complexity, capped at the first 200 tokens for wire size.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::alternatives;
use crate::parser::ParsedText;

/// Output is capped at the first this-many analyses per request.
pub const MAX_WORD_ANALYSES: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordAnalysis {
    pub word: String,
    pub length: usize,
    pub is_long: bool,
    pub is_very_long: bool,
    pub frequency: usize,
    pub relative_frequency: f64,
    pub frequency_rank: usize,
    pub global_index: usize,
    pub sentence_index: usize,
    pub position_in_sentence: usize,
    pub relative_position: f64,
    pub style: String,
    pub complexity: String,
    pub significance: f64,
    pub alternatives: Vec<String>,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn style_label(len: usize) -> &'static str {
    if len <= 3 {
        "kort"
    } else if len > 9 {
        "svært lang"
    } else if len > 6 {
        "lang"
    } else {
        "vanlig"
    }
}

fn complexity_label(is_very_long: bool, is_long: bool, frequency: usize) -> &'static str {
    if is_very_long && frequency <= 1 {
        "kompleks"
    } else if is_long && frequency <= 2 {
        "moderat"
    } else {
        "enkel"
    }
}

/// Analyze every word token in `parsed`, in source order, capped at
/// [`MAX_WORD_ANALYSES`].
pub fn analyze_words(parsed: &ParsedText) -> Vec<WordAnalysis> {
    if parsed.words.is_empty() {
        return Vec::new();
    }

    let mut frequency: HashMap<String, usize> = HashMap::new();
    for word in &parsed.words {
        *frequency.entry(word.to_lowercase()).or_insert(0) += 1;
    }
    let total_words = parsed.words.len();

    let mut ranked: Vec<(&String, usize)> = frequency.iter().map(|(w, c)| (w, *c)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    let unique_words = ranked.len();
    let mut rank_of: HashMap<&str, usize> = HashMap::new();
    for (i, (word, _)) in ranked.iter().enumerate() {
        rank_of.insert(word.as_str(), i + 1);
    }

    let mut sentence_lengths = Vec::with_capacity(parsed.sentence_count());
    for i in 0..parsed.sentence_count() {
        sentence_lengths.push(parsed.words_in_sentence(i).len().max(1));
    }

    let mut results = Vec::new();
    let mut global_index = 0usize;
    'outer: for sentence_index in 0..parsed.sentence_count() {
        let sentence_words = parsed.words_in_sentence(sentence_index);
        let sentence_len = sentence_lengths[sentence_index];
        for (position_in_sentence, word) in sentence_words.iter().enumerate() {
            if results.len() >= MAX_WORD_ANALYSES {
                break 'outer;
            }
            let lower = word.to_lowercase();
            let length = word.chars().count();
            let is_long = length > 6;
            let is_very_long = length > 9;
            let freq = *frequency.get(&lower).unwrap_or(&0);
            let rank = *rank_of.get(lower.as_str()).unwrap_or(&unique_words);
            let relative_frequency = round2(freq as f64 / total_words as f64);
            let relative_position = round2(position_in_sentence as f64 / sentence_len as f64);
            let significance = round2(
                0.4 * (1.0 - rank as f64 / unique_words.max(1) as f64)
                    + 0.3 * (length.min(12) as f64 / 12.0)
                    + 0.3 * if is_long { 1.0 } else { 0.5 },
            );

            results.push(WordAnalysis {
                word: word.clone(),
                length,
                is_long,
                is_very_long,
                frequency: freq,
                relative_frequency,
                frequency_rank: rank,
                global_index,
                sentence_index,
                position_in_sentence,
                relative_position,
                style: style_label(length).to_string(),
                complexity: complexity_label(is_very_long, is_long, freq).to_string(),
                significance,
                alternatives: alternatives::alternatives_for(word),
            });
            global_index += 1;
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::TextParser;

    #[test]
    fn empty_text_has_no_word_analyses() {
        let parser = TextParser::new();
        let parsed = parser.parse("");
        assert!(analyze_words(&parsed).is_empty());
    }

    #[test]
    fn style_labels_match_length_bands() {
        assert_eq!(style_label(2), "kort");
        assert_eq!(style_label(5), "vanlig");
        assert_eq!(style_label(8), "lang");
        assert_eq!(style_label(12), "svært lang");
    }

    #[test]
    fn output_is_capped_at_200() {
        let text = (0..500).map(|i| format!("ord{i}")).collect::<Vec<_>>().join(". ");
        let parser = TextParser::new();
        let parsed = parser.parse(&text);
        let analyses = analyze_words(&parsed);
        assert_eq!(analyses.len(), MAX_WORD_ANALYSES);
    }

    #[test]
    fn known_hard_word_carries_alternatives() {
        let parser = TextParser::new();
        let parsed = parser.parse("Vi må implementere dette raskt.");
        let analyses = analyze_words(&parsed);
        let hit = analyses.iter().find(|w| w.word.to_lowercase() == "implementere").unwrap();
        assert_eq!(hit.alternatives, vec!["bruke", "innføre"]);
    }

    #[test]
    fn positions_track_sentence_and_global_index() {
        let parser = TextParser::new();
        let parsed = parser.parse("Hei. Dette er en test.");
        let analyses = analyze_words(&parsed);
        assert_eq!(analyses[0].sentence_index, 0);
        assert_eq!(analyses[1].sentence_index, 1);
        assert_eq!(analyses[1].position_in_sentence, 0);
        assert_eq!(analyses[1].global_index, 1);
    }
}
