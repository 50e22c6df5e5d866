//! Cache-key fingerprinting: a pure function of normalized text bytes plus
//! the analysis option flags that affect the result shape.

use sha2::{Digest, Sha256};
use std::fmt;

/// Stable identity of an (text, options) pair used as the cache key.
///
/// Two calls with the same normalized UTF-8 bytes and the same
/// `include_word_analysis`/`include_sentence_analysis` flags always produce
/// the same fingerprint, and different flag combinations always produce
/// different ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn compute(normalized_text: &str, include_word_analysis: bool, include_sentence_analysis: bool) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(normalized_text.as_bytes());
        hasher.update([u8::from(include_word_analysis), u8::from(include_sentence_analysis)]);
        let digest = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    /// Hex-encoded form suitable for use as a cache key string.
    pub fn to_hex(self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_input_same_fingerprint() {
        let a = Fingerprint::compute("hei verden", true, false);
        let b = Fingerprint::compute("hei verden", true, false);
        assert_eq!(a, b);
    }

    #[test]
    fn different_options_different_fingerprint() {
        let a = Fingerprint::compute("hei verden", true, false);
        let b = Fingerprint::compute("hei verden", false, false);
        assert_ne!(a, b);
    }

    #[test]
    fn different_text_different_fingerprint() {
        let a = Fingerprint::compute("hei verden", false, false);
        let b = Fingerprint::compute("ha det verden", false, false);
        assert_ne!(a, b);
    }

    #[test]
    fn hex_is_stable_length() {
        let f = Fingerprint::compute("noe tekst", true, true);
        assert_eq!(f.to_hex().len(), 64);
    }
}
