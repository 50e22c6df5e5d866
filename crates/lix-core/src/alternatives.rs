//! A small table of plain-language alternatives for common hard Norwegian
//! words, used to enrich word-complexity output and recommender examples.

const ALTERNATIVES: &[(&str, &[&str])] = &[
    ("implementere", &["bruke", "innføre"]),
    ("demonstrere", &["vise", "bevise"]),
    ("kommunisere", &["snakke", "si fra"]),
    ("identifisere", &["finne", "kjenne igjen"]),
    ("modifisere", &["endre", "tilpasse"]),
    ("evaluere", &["vurdere", "bedømme"]),
    ("analysere", &["undersøke", "studere"]),
    ("optimalisere", &["forbedre", "gjøre bedre"]),
    ("dokumentere", &["skrive ned", "beskrive"]),
    ("administrere", &["styre", "lede"]),
    ("konkludere", &["avslutte", "slutte"]),
    ("illustrere", &["vise", "tegne"]),
    ("informasjon", &["opplysning", "data"]),
    ("funksjonalitet", &["virkning", "bruk"]),
    ("spesifikasjon", &["krav", "beskrivelse"]),
    ("konfigurasjon", &["oppsett", "innstilling"]),
    ("definisjon", &["forklaring", "betydning"]),
    ("konsekvent", &["fast", "stabil"]),
    ("tilstrekkelig", &["nok", "god nok"]),
    ("signifikant", &["viktig", "betydelig"]),
];

/// Plain-language alternatives for `word` (lowercased match), if any are
/// known.
pub fn alternatives_for(word: &str) -> Vec<String> {
    let lower = word.to_lowercase();
    ALTERNATIVES
        .iter()
        .find(|(w, _)| *w == lower)
        .map(|(_, alts)| alts.iter().map(|s| s.to_string()).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_word_has_alternatives() {
        assert_eq!(alternatives_for("implementere"), vec!["bruke", "innføre"]);
        assert_eq!(alternatives_for("Implementere"), vec!["bruke", "innføre"]);
    }

    #[test]
    fn unknown_word_has_none() {
        assert!(alternatives_for("katt").is_empty());
    }
}
