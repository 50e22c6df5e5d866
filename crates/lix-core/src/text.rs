//! Input text and its derived size class.

use serde::{Deserialize, Serialize};

/// Character-length bands that drive cache TTL and which execution path
/// (synchronous, background job, chunked stream) an analysis takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    Small,
    Medium,
    Large,
    Huge,
}

impl SizeClass {
    /// Classify `char_count` against the configured thresholds.
    ///
    /// `small` is the boundary below which text is "small", `large` the
    /// boundary above which it is "large", and `huge` the boundary above
    /// which it is "huge" (background-processed). Everything between
    /// `small` and `large` is "medium".
    pub fn classify(char_count: usize, small: usize, large: usize, huge: usize) -> Self {
        if char_count > huge {
            SizeClass::Huge
        } else if char_count > large {
            SizeClass::Large
        } else if char_count < small {
            SizeClass::Small
        } else {
            SizeClass::Medium
        }
    }
}

/// An immutable input blob plus its derived identity.
///
/// Constructed once at ingestion; the raw text is never mutated afterward.
/// Whitespace is trimmed before the fingerprint is computed, per the
/// fingerprint-stability property: the cache key must be a pure function of
/// normalized bytes plus options.
#[derive(Debug, Clone)]
pub struct Text {
    raw: String,
    normalized: String,
}

impl Text {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let normalized = raw.trim().to_string();
        Self { raw, normalized }
    }

    /// The original, untrimmed text as received.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The whitespace-trimmed text used for parsing, analysis, and
    /// fingerprinting.
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn char_len(&self) -> usize {
        self.normalized.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }

    pub fn size_class(&self, small: usize, large: usize, huge: usize) -> SizeClass {
        SizeClass::classify(self.char_len(), small, large, huge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_whitespace_for_normalized_form() {
        let t = Text::new("  Hei verden  \n");
        assert_eq!(t.raw(), "  Hei verden  \n");
        assert_eq!(t.normalized(), "Hei verden");
    }

    #[test]
    fn size_class_boundaries() {
        assert_eq!(SizeClass::classify(500, 1000, 10_000, 20_000), SizeClass::Small);
        assert_eq!(SizeClass::classify(1000, 1000, 10_000, 20_000), SizeClass::Medium);
        assert_eq!(SizeClass::classify(10_001, 1000, 10_000, 20_000), SizeClass::Large);
        assert_eq!(SizeClass::classify(20_001, 1000, 10_000, 20_000), SizeClass::Huge);
    }
}
