//! Sentence analyzer (C3): per-sentence complexity, issues, and tips.
//!
//! The per-sentence complexity score computed here (`word_count +
//! 100*long_ratio`) is numerically the LIX formula specialized to a single
//! sentence, but it is not named LIX on the wire: it is a distinct,
//! coarser complexity signal.

use serde::{Deserialize, Serialize};

use crate::parser::ParsedText;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub issue_type: String,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentenceAnalysis {
    pub index: usize,
    pub word_count: usize,
    pub long_word_count: usize,
    pub very_long_word_count: usize,
    pub avg_word_length: f64,
    /// Per-sentence complexity score (word count + 100 × long-word ratio).
    /// NOT the canonical LIX metric; see module docs.
    pub complexity_score: f64,
    pub complexity_label: String,
    pub issues: Vec<Issue>,
    pub improvement_tips: Vec<String>,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn complexity_label(score: f64) -> &'static str {
    if score < 30.0 {
        "enkel"
    } else if score < 45.0 {
        "moderat"
    } else if score < 55.0 {
        "kompleks"
    } else {
        "svært kompleks"
    }
}

fn analyze_one(index: usize, words: &[String]) -> SentenceAnalysis {
    let word_count = words.len();
    if word_count == 0 {
        return SentenceAnalysis {
            index,
            word_count: 0,
            long_word_count: 0,
            very_long_word_count: 0,
            avg_word_length: 0.0,
            complexity_score: 0.0,
            complexity_label: "N/A".to_string(),
            issues: Vec::new(),
            improvement_tips: Vec::new(),
        };
    }

    let long_word_count = words.iter().filter(|w| w.chars().count() > 6).count();
    let very_long_word_count = words.iter().filter(|w| w.chars().count() > 9).count();
    let total_len: usize = words.iter().map(|w| w.chars().count()).sum();
    let avg_word_length = round2(total_len as f64 / word_count as f64);
    let long_ratio = long_word_count as f64 / word_count as f64;
    let complexity_score = round2(word_count as f64 + 100.0 * long_ratio);
    let long_word_pct = long_ratio * 100.0;

    let mut issues = Vec::new();
    if word_count > 30 {
        issues.push(Issue {
            issue_type: "long_sentence".to_string(),
            severity: Severity::High,
            message: "Setningen er svært lang.".to_string(),
        });
    } else if word_count > 20 {
        issues.push(Issue {
            issue_type: "long_sentence".to_string(),
            severity: Severity::Medium,
            message: "Setningen er noe lang.".to_string(),
        });
    }
    if long_word_pct > 50.0 {
        issues.push(Issue {
            issue_type: "long_words".to_string(),
            severity: Severity::High,
            message: "Setningen har svært mange lange ord.".to_string(),
        });
    } else if long_word_pct > 35.0 {
        issues.push(Issue {
            issue_type: "long_words".to_string(),
            severity: Severity::Medium,
            message: "Setningen har mange lange ord.".to_string(),
        });
    }

    let mut improvement_tips = Vec::new();
    if word_count > 20 {
        improvement_tips.push("Del setningen opp i flere, kortere setninger.".to_string());
    }
    if long_word_pct > 35.0 {
        let mut very_long_words: Vec<&str> = words
            .iter()
            .filter(|w| w.chars().count() > 9)
            .map(|s| s.as_str())
            .collect();
        very_long_words.truncate(3);
        if very_long_words.is_empty() {
            improvement_tips.push("Erstatt lange ord med enklere alternativer.".to_string());
        } else {
            improvement_tips.push(format!(
                "Erstatt lange ord som «{}» med enklere alternativer.",
                very_long_words.join("», «")
            ));
        }
    }

    SentenceAnalysis {
        index,
        word_count,
        long_word_count,
        very_long_word_count,
        avg_word_length,
        complexity_score,
        complexity_label: complexity_label(complexity_score).to_string(),
        issues,
        improvement_tips,
    }
}

/// Analyze every sentence in `parsed`.
pub fn analyze_sentences(parsed: &ParsedText) -> Vec<SentenceAnalysis> {
    (0..parsed.sentence_count())
        .map(|i| analyze_one(i, &parsed.words_in_sentence(i)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::TextParser;

    #[test]
    fn empty_sentence_is_a_zero_stub() {
        let analysis = analyze_one(0, &[]);
        assert_eq!(analysis.word_count, 0);
        assert_eq!(analysis.complexity_label, "N/A");
    }

    #[test]
    fn long_sentence_flags_high_severity_issue() {
        let words: Vec<String> = (0..35).map(|i| format!("ord{i}")).collect();
        let analysis = analyze_one(0, &words);
        assert!(analysis
            .issues
            .iter()
            .any(|i| i.issue_type == "long_sentence" && i.severity == Severity::High));
    }

    #[test]
    fn many_long_words_flags_issue_and_tip() {
        let words: Vec<String> = vec![
            "implementeringsstrategien".to_string(),
            "funksjonalitetskravene".to_string(),
            "dokumentasjonskvaliteten".to_string(),
            "ja".to_string(),
        ];
        let analysis = analyze_one(0, &words);
        assert!(analysis.issues.iter().any(|i| i.issue_type == "long_words"));
        assert!(!analysis.improvement_tips.is_empty());
    }

    #[test]
    fn analyze_sentences_covers_every_sentence() {
        let parser = TextParser::new();
        let parsed = parser.parse("Hei. Dette er en test.");
        let analyses = analyze_sentences(&parsed);
        assert_eq!(analyses.len(), 2);
        assert_eq!(analyses[0].word_count, 1);
        assert_eq!(analyses[1].word_count, 4);
    }
}
