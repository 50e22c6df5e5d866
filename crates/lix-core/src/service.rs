//! Readability Service (C5): orchestrates C1→C4 into one call producing a
//! complete Analysis Record, plus a cheaper statistics-only fast path used
//! by the streaming typing surface.

use std::collections::HashMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::analyzers::{self, SentenceAnalysis, WordAnalysis};
use crate::metrics::{self, Band, MetricBundle};
use crate::parser::TextParser;
use crate::recommend::{self, Recommendation, RecommenderInput, UserContext};
use crate::text::Text;

/// Options controlling which sub-analyses run. Defaults: word analysis
/// off, sentence analysis on.
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    pub include_word_analysis: bool,
    pub include_sentence_analysis: bool,
    pub user_context: Option<UserContext>,
    /// Suppresses recommendation examples (used by the streaming path's
    /// simplified-mode recommendations).
    pub simplified_recommendations: bool,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            include_word_analysis: false,
            include_sentence_analysis: true,
            user_context: None,
            simplified_recommendations: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statistics {
    pub word_count: usize,
    pub sentence_count: usize,
    pub paragraph_count: usize,
    pub avg_sentence_length: f64,
    pub avg_word_length: f64,
    pub long_words_count: usize,
    pub long_words_percentage: f64,
    pub very_long_words_count: usize,
    pub unique_words_count: usize,
    pub unique_words_percentage: f64,
    pub most_common_words: Vec<(String, usize)>,
    pub word_length_distribution: HashMap<usize, usize>,
    pub sentence_length_distribution: HashMap<usize, usize>,
}

impl Statistics {
    fn zero() -> Self {
        Self {
            word_count: 0,
            sentence_count: 0,
            paragraph_count: 0,
            avg_sentence_length: 0.0,
            avg_word_length: 0.0,
            long_words_count: 0,
            long_words_percentage: 0.0,
            very_long_words_count: 0,
            unique_words_count: 0,
            unique_words_percentage: 0.0,
            most_common_words: Vec::new(),
            word_length_distribution: HashMap::new(),
            sentence_length_distribution: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    pub processing_time_ms: u64,
    pub cached: bool,
    pub partial: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub metrics: MetricBundle,
    pub sentence_analysis: Vec<SentenceAnalysis>,
    pub word_analysis: Vec<WordAnalysis>,
    pub statistics: Statistics,
    pub combined_description: String,
    pub recommendations: Vec<Recommendation>,
    pub provenance: Provenance,
}

/// The statistics-only fast path result for the streaming typing surface:
/// metrics and basic counts, no per-sentence/per-word analyses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicResult {
    pub metrics: MetricBundle,
    pub statistics: Statistics,
    pub provenance: Provenance,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Compare LIX and RIX bands and produce the human-readable combined
/// description.
fn combined_description(lix_band: Band, rix_band: Band, lix_score: f64, rix_score: f64) -> String {
    if lix_band == Band::Unavailable || rix_band == Band::Unavailable {
        return "Teksten er for kort for analyse.".to_string();
    }

    if lix_band == rix_band {
        return match lix_band {
            Band::VeryEasy => "Teksten er svært lettlest både når det gjelder setningslengde og ordvalg.",
            Band::Easy => "Teksten er lettlest, med korte setninger og enkle ord.",
            Band::Medium => "Teksten har middels vanskelighetsgrad både i setningslengde og ordvalg.",
            Band::Difficult => "Teksten er vanskelig å lese, med lange setninger og mange lange ord.",
            Band::VeryDifficult => "Teksten er svært vanskelig å lese, både i setningslengde og ordvalg.",
            Band::Unavailable => unreachable!(),
        }
        .to_string();
    }

    let lix_level = lix_band.index().unwrap_or(0) as i32;
    let rix_level = rix_band.index().unwrap_or(0) as i32;
    let diff = (lix_level - rix_level).abs();

    if diff <= 1 {
        format!(
            "Teksten er i hovedsak {} til {}, med en balansert vanskelighetsgrad.",
            lix_band.category_label(),
            rix_band.category_label()
        )
    } else if lix_score > 40.0 && rix_score < 2.5 {
        "Teksten har korte setninger, men inneholder mange lange eller komplekse ord.".to_string()
    } else if lix_score < 30.0 && rix_score > 3.5 {
        "Teksten bruker stort sett enkle ord, men setningene er lange.".to_string()
    } else {
        "Teksten gir et blandet signal om vanskelighetsgrad mellom setningslengde og ordvalg.".to_string()
    }
}

/// Orchestrates text parsing, metric computation, analyzers, and
/// recommendation generation into one Analysis Record.
pub struct ReadabilityService {
    parser: TextParser,
}

impl ReadabilityService {
    pub fn new() -> Self {
        Self { parser: TextParser::new() }
    }

    /// Full analysis: parses, computes metrics, runs the analyzers and
    /// recommender, and assembles one outward-facing record.
    pub fn analyze(&self, text: &Text, options: &AnalyzeOptions) -> AnalysisRecord {
        let started = Instant::now();

        if text.is_empty() {
            return AnalysisRecord {
                metrics: metrics::compute(&crate::parser::ParsedText::empty()),
                sentence_analysis: Vec::new(),
                word_analysis: Vec::new(),
                statistics: Statistics::zero(),
                combined_description: "Teksten er for kort for analyse.".to_string(),
                recommendations: recommend::generate(
                    &RecommenderInput {
                        lix_score: 0.0,
                        rix_score: 0.0,
                        avg_sentence_length: 0.0,
                        long_word_percentage: 0.0,
                        user_context: options.user_context.clone(),
                    },
                    true,
                ),
                provenance: Provenance {
                    processing_time_ms: elapsed_ms(started),
                    cached: false,
                    partial: false,
                },
            };
        }

        let parsed = self.parser.parse(text.normalized());
        let bundle = metrics::compute(&parsed);

        let sentence_analysis = if options.include_sentence_analysis {
            analyzers::analyze_sentences(&parsed)
        } else {
            Vec::new()
        };
        let word_analysis = if options.include_word_analysis {
            analyzers::analyze_words(&parsed)
        } else {
            Vec::new()
        };

        let statistics = build_statistics(&parsed, true);
        let combined = combined_description(bundle.lix.band, bundle.rix.band, bundle.lix.score, bundle.rix.score);

        let recommendations = recommend::generate(
            &RecommenderInput {
                lix_score: bundle.lix.score,
                rix_score: bundle.rix.score,
                avg_sentence_length: statistics.avg_sentence_length,
                long_word_percentage: statistics.long_words_percentage,
                user_context: options.user_context.clone(),
            },
            options.simplified_recommendations,
        );

        AnalysisRecord {
            metrics: bundle,
            sentence_analysis,
            word_analysis,
            statistics,
            combined_description: combined,
            recommendations,
            provenance: Provenance {
                processing_time_ms: elapsed_ms(started),
                cached: false,
                partial: false,
            },
        }
    }

    /// Statistics-only fast path: metrics plus basic counts, no analyzer
    /// passes.
    pub fn analyze_basic(&self, text: &Text) -> BasicResult {
        let started = Instant::now();
        if text.is_empty() {
            return BasicResult {
                metrics: metrics::compute(&crate::parser::ParsedText::empty()),
                statistics: Statistics::zero(),
                provenance: Provenance { processing_time_ms: elapsed_ms(started), cached: false, partial: true },
            };
        }
        let parsed = self.parser.parse(text.normalized());
        let bundle = metrics::compute(&parsed);
        let statistics = build_statistics(&parsed, false);
        BasicResult {
            metrics: bundle,
            statistics,
            provenance: Provenance { processing_time_ms: elapsed_ms(started), cached: false, partial: true },
        }
    }
}

impl Default for ReadabilityService {
    fn default() -> Self {
        Self::new()
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn build_statistics(parsed: &crate::parser::ParsedText, detailed: bool) -> Statistics {
    let word_count = parsed.word_count();
    let sentence_count = parsed.sentence_count();
    let avg_sentence_length = if sentence_count > 0 { round2(word_count as f64 / sentence_count as f64) } else { 0.0 };
    let total_len: usize = parsed.words.iter().map(|w| w.chars().count()).sum();
    let avg_word_length = if word_count > 0 { round2(total_len as f64 / word_count as f64) } else { 0.0 };
    let long_words_percentage =
        if word_count > 0 { round1(parsed.long_word_count as f64 / word_count as f64 * 100.0) } else { 0.0 };

    let mut stats = Statistics {
        word_count,
        sentence_count,
        paragraph_count: parsed.paragraph_count(),
        avg_sentence_length,
        avg_word_length,
        long_words_count: parsed.long_word_count,
        long_words_percentage,
        very_long_words_count: parsed.very_long_word_count,
        unique_words_count: 0,
        unique_words_percentage: 0.0,
        most_common_words: Vec::new(),
        word_length_distribution: HashMap::new(),
        sentence_length_distribution: HashMap::new(),
    };

    if !detailed {
        return stats;
    }

    let mut frequency: HashMap<String, usize> = HashMap::new();
    let mut word_len_dist: HashMap<usize, usize> = HashMap::new();
    for word in &parsed.words {
        *frequency.entry(word.to_lowercase()).or_insert(0) += 1;
        *word_len_dist.entry(word.chars().count()).or_insert(0) += 1;
    }
    let mut sentence_len_dist: HashMap<usize, usize> = HashMap::new();
    for i in 0..sentence_count {
        let len = parsed.words_in_sentence(i).len();
        *sentence_len_dist.entry(len).or_insert(0) += 1;
    }

    let mut ranked: Vec<(String, usize)> = frequency.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    let unique_words_count = ranked.len();

    stats.unique_words_count = unique_words_count;
    stats.unique_words_percentage =
        if word_count > 0 { round1(unique_words_count as f64 / word_count as f64 * 100.0) } else { 0.0 };
    stats.most_common_words = ranked.into_iter().take(15).collect();
    stats.word_length_distribution = word_len_dist;
    stats.sentence_length_distribution = sentence_len_dist;

    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_invariant() {
        let service = ReadabilityService::new();
        let record = service.analyze(&Text::new("   "), &AnalyzeOptions::default());
        assert_eq!(record.metrics.lix.score, 0.0);
        assert_eq!(record.metrics.lix.band, Band::Unavailable);
        assert_eq!(record.recommendations.len(), 1);
        assert_eq!(record.recommendations[0].rec_type, "positive_feedback");
    }

    #[test]
    fn scenario_s1_full_record() {
        let service = ReadabilityService::new();
        let record = service.analyze(&Text::new("Hei. Dette er en test."), &AnalyzeOptions::default());
        assert_eq!(record.metrics.lix.score, 2.5);
        assert_eq!(record.statistics.word_count, 5);
        assert_eq!(record.statistics.sentence_count, 2);
    }

    #[test]
    fn scenario_s2_word_complexity_recommendation_present() {
        let service = ReadabilityService::new();
        let record = service.analyze(
            &Text::new("Implementeringen av funksjonaliteten krever omfattende dokumentasjon."),
            &AnalyzeOptions::default(),
        );
        assert!(record
            .recommendations
            .iter()
            .any(|r| r.rec_type == "word_complexity" && r.impact == crate::recommend::Impact::High));
    }

    #[test]
    fn determinism_ignoring_provenance() {
        let service = ReadabilityService::new();
        let opts = AnalyzeOptions::default();
        let a = service.analyze(&Text::new("Dette er en test av determinisme."), &opts);
        let b = service.analyze(&Text::new("Dette er en test av determinisme."), &opts);
        assert_eq!(a.metrics.lix.score, b.metrics.lix.score);
        assert_eq!(a.combined_description, b.combined_description);
        assert_eq!(a.statistics.word_count, b.statistics.word_count);
    }

    #[test]
    fn basic_result_has_no_analyzer_output_but_has_metrics() {
        let service = ReadabilityService::new();
        let basic = service.analyze_basic(&Text::new("Hei. Dette er en test."));
        assert_eq!(basic.metrics.lix.score, 2.5);
        assert!(basic.provenance.partial);
    }

    #[test]
    fn identical_bands_use_canned_combined_description() {
        let desc = combined_description(Band::VeryEasy, Band::VeryEasy, 5.0, 0.5);
        assert!(desc.contains("svært lettlest"));
    }
}
