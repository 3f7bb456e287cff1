//! Semantic similarity: cosine scoring and linear nearest-neighbor scan.
//! At this corpus scale (tens to low hundreds of questions) a linear scan
//! is the correct structure; no approximate index.

/// Cosine similarity in [-1, 1]. Zero-norm vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0f32;
    let mut na = 0f32;
    let mut nb = 0f32;
    for i in 0..a.len().min(b.len()) {
        dot += a[i] * b[i];
        na += a[i] * a[i];
        nb += b[i] * b[i];
    }
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na.sqrt() * nb.sqrt())
    }
}

/// Arg-max cosine scan over the corpus. `None` only for an empty corpus.
pub fn best_match(query: &[f32], corpus: &[Vec<f32>]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (index, candidate) in corpus.iter().enumerate() {
        let score = cosine_similarity(query, candidate);
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((index, score));
        }
    }
    best
}

/// The `k` best-scoring corpus indices, highest first.
pub fn top_k(query: &[f32], corpus: &[Vec<f32>], k: usize) -> Vec<(usize, f32)> {
    let mut scored: Vec<(usize, f32)> = corpus
        .iter()
        .enumerate()
        .map(|(i, c)| (i, cosine_similarity(query, c)))
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_bounds_and_zero_guard() {
        let a = [1.0, 0.0];
        let b = [1.0, 0.0];
        let c = [0.0, 1.0];
        let z = [0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&a, &c).abs() < 1e-6);
        assert_eq!(cosine_similarity(&a, &z), 0.0);
    }

    #[test]
    fn test_best_match_returns_arg_max() {
        let corpus = vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![0.7, 0.7]];
        let (idx, score) = best_match(&[1.0, 0.0], &corpus).unwrap();
        assert_eq!(idx, 1);
        assert!((score - 1.0).abs() < 1e-6);
        assert!(best_match(&[1.0, 0.0], &[]).is_none());
    }

    #[test]
    fn test_top_k_ordering() {
        let corpus = vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![0.7, 0.7]];
        let top = top_k(&[1.0, 0.0], &corpus, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].0, 1);
        assert_eq!(top[1].0, 2);
        assert!(top[0].1 >= top[1].1);
    }
}
