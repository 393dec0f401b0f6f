//! Scoring functions for the Hybrid Retrieval Engine (§4.4 C4): cosine
//! similarity, a BM25 lexical score, and the piecewise recency multiplier.
//! `cosine_similarity` is grounded directly on the teacher's
//! `domains::posts::effects::utils::sync_utils::cosine_similarity`
//! (used here as the in-process fallback when the database's own
//! `<=>` operator isn't available, e.g. in unit tests).

use chrono::{DateTime, Utc};

pub const VECTOR_WEIGHT: f64 = 0.7;
pub const LEXICAL_WEIGHT: f64 = 0.3;
pub const RECENCY_WEIGHT: f64 = 0.3;

/// Cosine similarity between two equal-length vectors, in `[-1, 1]`.
/// Returns `0.0` for mismatched lengths or zero-magnitude vectors rather
/// than dividing by zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}

fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| w.to_lowercase().chars().filter(|c| c.is_alphanumeric()).collect())
        .filter(|w: &String| !w.is_empty())
        .collect()
}

const BM25_K1: f64 = 1.2;
const BM25_B: f64 = 0.75;

/// BM25 over the candidate set returned by a query, normalized into
/// `[0, 1]` by dividing by the batch's own maximum score (§4.4: "lexical
/// score ... normalized"). The candidate set IS the corpus here — there's
/// no separate global index, since scoring only ever needs to rank chunks
/// already shortlisted by the vector search.
pub fn bm25_scores(query: &str, documents: &[&str]) -> Vec<f64> {
    let query_terms = tokenize(query);
    if query_terms.is_empty() || documents.is_empty() {
        return vec![0.0; documents.len()];
    }

    let doc_tokens: Vec<Vec<String>> = documents.iter().map(|d| tokenize(d)).collect();
    let doc_lens: Vec<f64> = doc_tokens.iter().map(|t| t.len() as f64).collect();
    let avg_len = doc_lens.iter().sum::<f64>() / doc_lens.len() as f64;
    let n = documents.len() as f64;

    let mut raw_scores = vec![0.0f64; documents.len()];
    for term in &query_terms {
        let doc_freq = doc_tokens.iter().filter(|t| t.contains(term)).count() as f64;
        if doc_freq == 0.0 {
            continue;
        }
        let idf = ((n - doc_freq + 0.5) / (doc_freq + 0.5) + 1.0).ln();

        for (i, tokens) in doc_tokens.iter().enumerate() {
            let tf = tokens.iter().filter(|t| *t == term).count() as f64;
            if tf == 0.0 {
                continue;
            }
            let len_norm = 1.0 - BM25_B + BM25_B * (doc_lens[i] / avg_len.max(1.0));
            raw_scores[i] += idf * (tf * (BM25_K1 + 1.0)) / (tf + BM25_K1 * len_norm);
        }
    }

    let max_score = raw_scores.iter().cloned().fold(0.0f64, f64::max);
    if max_score <= 0.0 {
        return vec![0.0; documents.len()];
    }
    raw_scores.iter().map(|s| (s / max_score).clamp(0.0, 1.0)).collect()
}

/// Piecewise recency multiplier (§4.4). `event_date` is `None` for
/// UniverseDoc chunks, which always score `0.0` and are unaffected by the
/// recency boost.
pub fn recency_score(reference_time: DateTime<Utc>, event_date: Option<DateTime<Utc>>) -> f64 {
    let Some(event_date) = event_date else {
        return 0.0;
    };
    let delta_days = (reference_time - event_date).num_seconds() as f64 / 86_400.0;

    if delta_days <= 7.0 {
        1.0
    } else if delta_days <= 28.0 {
        let t = (delta_days - 7.0) / (28.0 - 7.0);
        1.0 - t * (1.0 - 0.6)
    } else if delta_days <= 90.0 {
        let t = (delta_days - 28.0) / (90.0 - 28.0);
        0.6 - t * (0.6 - 0.2)
    } else {
        0.0
    }
}

pub fn final_score(vector_score: f64, lexical_score: f64, recency_score: f64, recency_boost: bool) -> f64 {
    VECTOR_WEIGHT * vector_score
        + LEXICAL_WEIGHT * lexical_score
        + if recency_boost { RECENCY_WEIGHT * recency_score } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_orthogonal_vectors_is_zero() {
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_mismatched_lengths_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn recency_within_week_is_full_strength() {
        let now = Utc::now();
        assert_eq!(recency_score(now, Some(now - Duration::days(3))), 1.0);
    }

    #[test]
    fn recency_beyond_90_days_is_zero() {
        let now = Utc::now();
        assert_eq!(recency_score(now, Some(now - Duration::days(200))), 0.0);
    }

    #[test]
    fn recency_decays_monotonically() {
        let now = Utc::now();
        let s7 = recency_score(now, Some(now - Duration::days(7)));
        let s28 = recency_score(now, Some(now - Duration::days(28)));
        let s90 = recency_score(now, Some(now - Duration::days(90)));
        assert!(s7 > s28);
        assert!(s28 > s90);
        assert!(s90 >= 0.0);
    }

    #[test]
    fn universe_doc_chunks_have_zero_recency() {
        assert_eq!(recency_score(Utc::now(), None), 0.0);
    }

    #[test]
    fn bm25_prefers_document_matching_query_terms() {
        let scores = bm25_scores(
            "lighthouse keeper",
            &[
                "a story about a lighthouse keeper and his lamp",
                "an unrelated passage about shipping manifests",
            ],
        );
        assert!(scores[0] > scores[1]);
    }

    #[test]
    fn final_score_without_recency_boost_ignores_recency() {
        let with = final_score(0.5, 0.5, 1.0, true);
        let without = final_score(0.5, 0.5, 1.0, false);
        assert!(with > without);
    }

    proptest::proptest! {
        #[test]
        fn recency_score_is_always_in_unit_interval(delta_days in -10i64..400) {
            let now = Utc::now();
            let event = now - Duration::days(delta_days);
            let score = recency_score(now, Some(event));
            proptest::prop_assert!((0.0..=1.0).contains(&score));
        }
    }
}
