//! Cross-module scenario tests: a request travels from raw text through
//! parsing, metrics, analyzers, and the recommender exactly as the daemon's
//! HTTP/WebSocket/bus surfaces would drive it, without any of their I/O.

use lix_core::{AnalyzeOptions, Band, Fingerprint, ReadabilityService, SessionCache, SizeClass, Text};

#[test]
fn scenario_full_pipeline_on_a_medium_norwegian_text() {
    let service = ReadabilityService::new();
    let text = Text::new(
        "Den norske regjeringen har i dag offentliggjort en ny rapport om klimatiltak. \
         Rapporten beskriver flere omfattende tiltak for å redusere klimagassutslippene \
         innen 2030. Miljøvernorganisasjoner har tatt imot rapporten med blandede reaksjoner.",
    );

    let record = service.analyze(&text, &AnalyzeOptions::default());

    assert!(record.statistics.word_count > 0);
    assert!(record.statistics.sentence_count >= 3);
    assert_ne!(record.metrics.lix.band, Band::Unavailable);
    assert!(!record.combined_description.is_empty());
    // Sentence analysis defaults on, word analysis defaults off.
    assert!(!record.sentence_analysis.is_empty());
    assert!(record.word_analysis.is_empty());
}

#[test]
fn scenario_huge_text_is_classified_for_background_processing() {
    let paragraph = "Dette er en test av et stort dokument med mange ord i seg. ".repeat(400);
    let text = Text::new(paragraph);
    assert_eq!(text.size_class(1_000, 10_000, 20_000), SizeClass::Huge);
}

#[test]
fn scenario_identical_requests_share_a_fingerprint() {
    let text = Text::new("Hei på deg, gamle venn.");
    let options = AnalyzeOptions::default();
    let a = Fingerprint::compute(text.normalized(), options.include_word_analysis, options.include_sentence_analysis);
    let b = Fingerprint::compute(text.normalized(), options.include_word_analysis, options.include_sentence_analysis);
    assert_eq!(a, b);

    let with_words =
        Fingerprint::compute(text.normalized(), true, options.include_sentence_analysis);
    assert_ne!(a, with_words);
}

#[test]
fn scenario_batch_of_mixed_quality_texts_gets_distinct_bands() {
    let service = ReadabilityService::new();
    let easy = service.analyze(&Text::new("Katten sover. Hunden løper. Sola skinner."), &AnalyzeOptions::default());
    let hard = service.analyze(
        &Text::new(
            "Implementeringen av den omfattende reguleringsrammen nødvendiggjør en \
             tverrfaglig tilnærming til institusjonaliseringsprosessen.",
        ),
        &AnalyzeOptions::default(),
    );

    assert!(easy.metrics.lix.score < hard.metrics.lix.score);
}

#[test]
fn scenario_session_cache_stays_bounded_across_many_fingerprints() {
    let mut cache = SessionCache::new(20);
    for i in 0..100 {
        let key = Fingerprint::compute(&format!("text number {i}"), false, false);
        let value = Fingerprint::compute(&format!("result for {i}"), false, false);
        cache.insert(key, value);
    }
    assert!(cache.len() <= 20);
}

#[test]
fn scenario_empty_input_never_panics_across_the_pipeline() {
    let service = ReadabilityService::new();
    let record = service.analyze(&Text::new(""), &AnalyzeOptions::default());
    assert_eq!(record.metrics.lix.band, Band::Unavailable);

    let basic = service.analyze_basic(&Text::new("   \n\t  "));
    assert!(basic.provenance.partial);
}
