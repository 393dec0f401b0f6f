//! Token-count estimation used by the Chunker's greedy packing (§4.2).
//!
//! We don't link a tokenizer model into the core crate; the embedding and
//! LLM backends report their own exact counts over the wire. This is the
//! same heuristic the Chunker uses to decide chunk boundaries before a
//! request ever goes out.

/// Rough estimate: ~4 characters per token, rounded up, minimum 1 for any
/// non-empty string.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    (text.chars().count() + 3) / 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero_tokens() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn short_string_is_at_least_one_token() {
        assert_eq!(estimate_tokens("hi"), 1);
    }

    #[test]
    fn scales_roughly_with_length() {
        let short = estimate_tokens("a".repeat(40).as_str());
        let long = estimate_tokens("a".repeat(400).as_str());
        assert!(long > short * 5);
    }
}
