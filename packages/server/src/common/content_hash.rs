//! SHA-256 content hashing for chunk deduplication (§4.2, invariant 3 in §8).

use sha2::{Digest, Sha256};

/// Normalize text the way the Chunker's step 1 does: strip control
/// characters, collapse whitespace, keep markdown headings (i.e. keep `#`).
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\n')
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// `content_hash = SHA-256(normalized_text)`, hex-encoded.
pub fn content_hash(text: &str) -> String {
    let normalized = normalize(text);
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_same_hash() {
        assert_eq!(content_hash("Hello   world"), content_hash("Hello world"));
    }

    #[test]
    fn whitespace_normalized() {
        let a = "The Martian Canals are enclosed aqueducts.";
        let b = "  The   Martian Canals\nare enclosed aqueducts.   ";
        assert_eq!(content_hash(a), content_hash(b));
    }

    #[test]
    fn different_content_different_hash() {
        assert_ne!(content_hash("alpha"), content_hash("beta"));
    }

    #[test]
    fn hash_format_is_64_hex_chars() {
        let hash = content_hash("anything");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn control_characters_stripped() {
        let a = "line one\u{0007} line two";
        let b = "line one line two";
        assert_eq!(content_hash(a), content_hash(b));
    }

    proptest::proptest! {
        #[test]
        fn hash_is_deterministic(s in ".*") {
            proptest::prop_assert_eq!(content_hash(&s), content_hash(&s));
        }
    }
}
