//! Deterministic token-bounded chunking (§4.2 C2). Grounded on the
//! teacher's `common::utils::content_hash` normalization step, extended
//! here with sentence splitting and greedy packing; the hashing itself
//! reuses `common::content_hash`.

use crate::common::content_hash::{content_hash, normalize};
use crate::common::tokens::estimate_tokens;

pub const MIN_TOKENS: usize = 100;
pub const MAX_TOKENS: usize = 800;
pub const OVERLAP_TOKENS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOutput {
    pub chunk_text: String,
    pub chunk_index: i32,
    pub token_count: i32,
    pub content_hash: String,
}

/// Split `text` into sentences. A simple boundary rule — split after
/// `.`, `!`, `?`, `。`, `！`, or `？` followed by whitespace — covers both
/// Latin punctuation and the common CJK sentence-final marks without
/// pulling in a full Unicode segmentation dependency.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        let is_boundary = matches!(c, '.' | '!' | '?' | '。' | '！' | '？');
        if is_boundary {
            let next_is_space = chars.peek().map(|c| c.is_whitespace()).unwrap_or(true);
            if next_is_space {
                sentences.push(current.trim().to_string());
                current.clear();
            }
        }
    }
    if !current.trim().is_empty() {
        sentences.push(current.trim().to_string());
    }
    sentences.into_iter().filter(|s| !s.is_empty()).collect()
}

/// Greedily pack sentences into chunks of `[MIN_TOKENS, MAX_TOKENS]`,
/// carrying `OVERLAP_TOKENS` worth of trailing sentences into the next
/// chunk's head so a fact near a boundary is never orphaned.
pub fn chunk_text(text: &str) -> Vec<ChunkOutput> {
    let normalized = normalize(text);
    if normalized.is_empty() {
        return Vec::new();
    }

    let sentences = split_sentences(&normalized);
    if sentences.is_empty() {
        return Vec::new();
    }

    let mut chunks: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_tokens = 0usize;

    for sentence in &sentences {
        let sentence_tokens = estimate_tokens(sentence);
        if current_tokens >= MAX_TOKENS
            || (current_tokens + sentence_tokens > MAX_TOKENS && current_tokens >= MIN_TOKENS)
        {
            chunks.push(std::mem::take(&mut current));
            current_tokens = 0;
        }
        current.push(sentence.clone());
        current_tokens += sentence_tokens;
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    // Discard a final chunk under MIN_TOKENS, unless it's the only chunk.
    if chunks.len() > 1 {
        let last_tokens: usize = chunks
            .last()
            .unwrap()
            .iter()
            .map(|s| estimate_tokens(s))
            .sum();
        if last_tokens < MIN_TOKENS {
            chunks.pop();
        }
    }

    // Re-emit trailing sentences covering >= OVERLAP_TOKENS at the head of
    // the next chunk.
    let mut with_overlap: Vec<Vec<String>> = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        if i == 0 {
            with_overlap.push(chunk.clone());
            continue;
        }
        let prev = &chunks[i - 1];
        let mut overlap_tokens = 0usize;
        let mut overlap_sentences = Vec::new();
        for sentence in prev.iter().rev() {
            if overlap_tokens >= OVERLAP_TOKENS {
                break;
            }
            overlap_tokens += estimate_tokens(sentence);
            overlap_sentences.push(sentence.clone());
        }
        overlap_sentences.reverse();
        overlap_sentences.extend(chunk.clone());
        with_overlap.push(overlap_sentences);
    }

    let mut seen_hashes = std::collections::HashSet::new();
    let mut out = Vec::new();
    let mut index = 0i32;
    for sentences in with_overlap {
        let chunk_text = sentences.join(" ");
        let hash = content_hash(&chunk_text);
        if !seen_hashes.insert(hash.clone()) {
            continue;
        }
        out.push(ChunkOutput {
            token_count: estimate_tokens(&chunk_text) as i32,
            chunk_text,
            chunk_index: index,
            content_hash: hash,
        });
        index += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_sentence(n: usize) -> String {
        format!("Sentence number {} describes a location in the archipelago.", n)
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunk_text("").is_empty());
    }

    #[test]
    fn single_short_source_is_kept_as_one_chunk() {
        let chunks = chunk_text("A short note about the lighthouse.");
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn chunking_is_deterministic() {
        let text: String = (0..80).map(long_sentence).collect::<Vec<_>>().join(" ");
        assert_eq!(chunk_text(&text), chunk_text(&text));
    }

    #[test]
    fn chunk_indices_are_sequential() {
        let text: String = (0..80).map(long_sentence).collect::<Vec<_>>().join(" ");
        let chunks = chunk_text(&text);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i as i32);
        }
    }

    #[test]
    fn duplicate_content_is_deduplicated_within_source() {
        let text = format!(
            "{} {}",
            "A repeated passage that appears twice in the same source text verbatim and should only be indexed once.",
            "A repeated passage that appears twice in the same source text verbatim and should only be indexed once."
        );
        let chunks = chunk_text(&text);
        let hashes: std::collections::HashSet<_> = chunks.iter().map(|c| &c.content_hash).collect();
        assert_eq!(hashes.len(), chunks.len());
    }

    #[test]
    fn chunks_respect_max_token_bound_when_source_is_large() {
        let text: String = (0..200).map(long_sentence).collect::<Vec<_>>().join(" ");
        let chunks = chunk_text(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(chunk.token_count as usize <= MAX_TOKENS + OVERLAP_TOKENS);
        }
    }

    proptest::proptest! {
        #[test]
        fn content_hash_matches_recomputation(s in "[a-zA-Z0-9 .!?]{0,500}") {
            let chunks = chunk_text(&s);
            for chunk in chunks {
                proptest::prop_assert_eq!(content_hash(&chunk.chunk_text), chunk.content_hash);
            }
        }
    }
}
