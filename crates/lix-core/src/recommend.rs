//! Recommender (C4): derives prioritized, typed improvement suggestions
//! from metrics plus optional user context. Rules fire independently and
//! are sorted by impact.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::alternatives;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Low,
    Medium,
    High,
}

/// Small, open, typed context supplied by the caller. Only `purpose` is
/// interpreted by the recommender; anything else travels through as an
/// opaque map, per the "keep the edges typed, the middle typed" design
/// note.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserContext {
    pub purpose: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub rec_type: String,
    pub title: String,
    pub description: String,
    pub suggestion: String,
    pub impact: Impact,
    pub examples: Vec<String>,
}

/// Build a recommendation carrying its examples unconditionally. Only
/// `sentence_structure` gates its examples on `simplified` (see
/// `sentence_structure_examples`). Every other type always carries its
/// examples, matching `ReadabilityRecommender.generate`'s per-type bodies.
fn rec(rec_type: &str, title: &str, description: &str, suggestion: &str, impact: Impact, examples: &[&str]) -> Recommendation {
    Recommendation {
        rec_type: rec_type.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        suggestion: suggestion.to_string(),
        impact,
        examples: examples.iter().map(|s| s.to_string()).collect(),
    }
}

/// `word_complexity`'s examples, drawn from the shared alternatives table
/// rather than duplicated as literal strings.
fn word_complexity_examples() -> Vec<String> {
    let mut examples = Vec::new();
    if let Some(alt) = alternatives::alternatives_for("implementere").first() {
        examples.push(format!("Erstatt «implementere» med «{alt}»"));
    }
    if let Some(alt) = alternatives::alternatives_for("signifikant").first() {
        examples.push(format!("Erstatt «signifikant» med «{alt}»"));
    }
    if let Some(alt) = alternatives::alternatives_for("kommunisere").get(1) {
        examples.push(format!("Erstatt «kommunisere» med «{alt}»"));
    }
    examples.push("Erstatt «funksjoner» med «egenskaper»".to_string());
    examples
}

/// Input metrics the recommender rules fire on.
#[derive(Debug, Clone)]
pub struct RecommenderInput {
    pub lix_score: f64,
    pub rix_score: f64,
    pub avg_sentence_length: f64,
    pub long_word_percentage: f64,
    pub user_context: Option<UserContext>,
}

/// Run every rule in documented order and return the recommendations that
/// fired. When none fire, exactly one `positive_feedback` item is emitted.
/// `simplified` only suppresses `sentence_structure`'s examples. Every
/// other type carries its examples unconditionally, matching
/// `ReadabilityRecommender.generate`.
pub fn generate(input: &RecommenderInput, simplified: bool) -> Vec<Recommendation> {
    let mut out = Vec::new();

    if input.avg_sentence_length > 18.0 {
        let impact = if input.avg_sentence_length > 25.0 { Impact::High } else { Impact::Medium };
        let examples: &[&str] = if simplified {
            &[]
        } else {
            &["«Vi gjennomførte møtet, og deretter sendte vi referatet til alle deltakerne.» → «Vi gjennomførte møtet. Deretter sendte vi referatet til alle deltakerne.»"]
        };
        out.push(rec(
            "sentence_structure",
            "Korte ned setningene",
            "Gjennomsnittlig setningslengde er høyere enn anbefalt for lett lesbarhet.",
            "Del lange setninger i flere korte setninger med ett hovedbudskap hver.",
            impact,
            examples,
        ));
    }

    if input.long_word_percentage > 25.0 {
        let impact = if input.long_word_percentage > 35.0 { Impact::High } else { Impact::Medium };
        let examples = word_complexity_examples();
        out.push(Recommendation {
            rec_type: "word_complexity".to_string(),
            title: "Bruk enklere ord".to_string(),
            description: "Andelen lange ord i teksten er høyere enn anbefalt.".to_string(),
            suggestion: "Erstatt lange, sjeldne ord med kortere, mer vanlige synonymer der det er mulig.".to_string(),
            impact,
            examples,
        });
    }

    if input.lix_score > 40.0 {
        out.push(rec(
            "writing_style",
            "Skriv mer aktivt",
            "Teksten har en LIX-verdi som tyder på en tung skrivestil.",
            "Bytt passive konstruksjoner ut med aktiv form der det passer.",
            Impact::Medium,
            &[
                "Passiv: «Beslutningen ble tatt av styret.»",
                "Aktiv: «Styret tok beslutningen.»",
            ],
        ));
        out.push(rec(
            "flow_improvement",
            "Bedre flyt mellom setninger",
            "Teksten kan dra nytte av tydeligere overgangsord.",
            "Bruk bindeord som «derfor», «imidlertid» og «i tillegg» for å knytte setninger sammen.",
            Impact::Medium,
            &[
                "Legg til: «derfor», «fordi», «likevel», «dessuten»",
                "«Vi fikk tilbakemeldinger. Vi endret planen.» → «Vi fikk tilbakemeldinger, og derfor endret vi planen.»",
            ],
        ));
    }

    if input.lix_score > 50.0 {
        out.push(rec(
            "technical_language",
            "Reduser fagspråk",
            "Teksten inneholder mye fagspråk eller sjargong.",
            "Forklar fagbegreper første gang de brukes, eller erstatt dem med vanlige ord.",
            Impact::High,
            &[
                "Forklar begreper når de introduseres: «Kognitiv dissonans (følelsen av ubehag når man holder motstridende overbevisninger) er et vanlig psykologisk fenomen.»",
                "Bruk enklere synonymer når mulig",
            ],
        ));
        out.push(rec(
            "structure_improvement",
            "Forbedre strukturen",
            "Teksten er krevende nok til at strukturen bør forsterkes.",
            "Bruk overskrifter, punktlister og korte avsnitt for å lette navigasjonen.",
            Impact::High,
            &[
                "Bruk overskrifter for å dele opp lange tekster",
                "Bruk punktlister for å presentere relatert informasjon",
                "Hold avsnitt under 4-5 setninger",
            ],
        ));
    }

    if input.lix_score > 45.0 {
        out.push(rec(
            "visual_aids",
            "Vurder visuelle hjelpemidler",
            "En tekst på dette vanskelighetsnivået kan ha nytte av støtte utover ren tekst.",
            "Legg til figurer, tabeller eller punktlister for å illustrere innholdet.",
            Impact::Medium,
            &[
                "Bruk diagrammer for å vise sammenhenger",
                "Bruk tabeller for å organisere data",
                "Legg til illustrasjoner for å forklare prosesser",
            ],
        ));
    }

    let purpose = input.user_context.as_ref().and_then(|c| c.purpose.as_deref());

    if purpose == Some("education") && input.lix_score > 35.0 {
        out.push(rec(
            "educational_content",
            "Tilpass for læringsformål",
            "Teksten er ment for undervisning, men vanskelighetsgraden er høy.",
            "Legg til eksempler, sammendrag og kontrollspørsmål for å støtte læring.",
            Impact::High,
            &[
                "Legg til: «For eksempel...» for å illustrere komplekse konsepter",
                "Bruk oppsummeringspunkter etter lengre avsnitt",
                "Inkluder visuelle hjelpemidler for å støtte teksten",
            ],
        ));
    }

    if purpose == Some("business") && input.lix_score > 45.0 {
        out.push(rec(
            "business_communication",
            "Tilpass for forretningskommunikasjon",
            "Teksten er ment for forretningsbruk, men er tyngre enn anbefalt.",
            "Prioriter korte, konkrete setninger og et tydelig hovedbudskap i starten.",
            Impact::Medium,
            &[
                "Start med hovedpoenget i hvert avsnitt",
                "Bruk kulepunkter for viktige elementer",
                "Unngå passive formuleringer: «Rapporten ble utarbeidet» → «Vi utarbeidet rapporten»",
            ],
        ));
    }

    if input.rix_score > 4.0 {
        out.push(rec(
            "rix_recommendation",
            "Reduser antall lange ord per setning",
            "RIX-verdien viser at setningene i snitt inneholder mange lange ord.",
            "Fordel lange ord over flere setninger, eller erstatt dem med kortere alternativer.",
            Impact::Medium,
            &[
                "Bruk kortere alternativer: «anvende» → «bruke»",
                "Varier mellom korte og lange ord for bedre rytme",
            ],
        ));
    }

    if out.is_empty() {
        let (title, description) = if input.lix_score < 30.0 {
            ("Utmerket lesbarhet", "Teksten er svært lettlest slik den er.")
        } else {
            ("God lesbarhet", "Teksten har god lesbarhet slik den er.")
        };
        out.push(rec(
            "positive_feedback",
            title,
            description,
            "Fortsett med denne skrivestilen.",
            Impact::Low,
            &[],
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(lix: f64, rix: f64, avg_len: f64, long_pct: f64) -> RecommenderInput {
        RecommenderInput {
            lix_score: lix,
            rix_score: rix,
            avg_sentence_length: avg_len,
            long_word_percentage: long_pct,
            user_context: None,
        }
    }

    #[test]
    fn no_rules_fire_yields_single_positive_feedback() {
        let recs = generate(&input(10.0, 0.5, 8.0, 5.0), false);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].rec_type, "positive_feedback");
        assert_eq!(recs[0].title, "Utmerket lesbarhet");
    }

    #[test]
    fn scenario_s2_word_complexity_high_impact() {
        // six words, six long words -> 100% long -> LIX 106
        let recs = generate(&input(106.0, 3.0, 6.0, 100.0), false);
        let wc = recs.iter().find(|r| r.rec_type == "word_complexity").unwrap();
        assert_eq!(wc.impact, Impact::High);
        assert!(!wc.examples.is_empty());
    }

    #[test]
    fn simplified_mode_only_suppresses_sentence_structure_examples() {
        let recs = generate(&input(106.0, 5.0, 30.0, 100.0), true);
        let sentence_structure = recs.iter().find(|r| r.rec_type == "sentence_structure").unwrap();
        assert!(sentence_structure.examples.is_empty());

        // Every other type that fired still carries its examples.
        for r in recs.iter().filter(|r| r.rec_type != "sentence_structure" && r.rec_type != "positive_feedback") {
            assert!(!r.examples.is_empty(), "{} unexpectedly has no examples", r.rec_type);
        }
    }

    #[test]
    fn word_complexity_examples_are_drawn_from_alternatives_table() {
        let recs = generate(&input(106.0, 3.0, 6.0, 100.0), false);
        let wc = recs.iter().find(|r| r.rec_type == "word_complexity").unwrap();
        assert!(wc.examples.iter().any(|e| e.contains("implementere") && e.contains("bruke")));
    }

    #[test]
    fn education_purpose_adds_educational_recommendation() {
        let mut i = input(40.0, 1.0, 10.0, 10.0);
        i.user_context = Some(UserContext { purpose: Some("education".to_string()), extra: HashMap::new() });
        let recs = generate(&i, false);
        assert!(recs.iter().any(|r| r.rec_type == "educational_content"));
    }

    #[test]
    fn rix_rule_fires_independently() {
        let recs = generate(&input(10.0, 5.0, 8.0, 5.0), false);
        assert!(recs.iter().any(|r| r.rec_type == "rix_recommendation"));
    }
}
