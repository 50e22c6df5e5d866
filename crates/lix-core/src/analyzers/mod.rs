//! Word & Sentence Analyzers (C3): per-unit complexity, frequency,
//! position, and issue detection.

pub mod sentence;
pub mod word;

pub use sentence::{analyze_sentences, Issue, Severity, SentenceAnalysis};
pub use word::{analyze_words, WordAnalysis};
