//! Text embedding seam: the sentence-embedding model is an external
//! collaborator, consumed behind the [`Embedder`] trait. [`HashEmbedder`]
//! is the deterministic in-repo implementation; [`CachedEmbedder`] adds an
//! exact-input-string cache.

use dashmap::DashMap;
use std::sync::Arc;

/// Maps text to a fixed-length vector. Implementations must be pure per
/// input string.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Vec<f32>;

    /// Length of every vector `embed` returns.
    fn dimensions(&self) -> usize;
}

/// Deterministic embedder: hashed word and character-trigram features
/// accumulated into a fixed-dimension unit vector. Stands in for a real
/// sentence-transformer behind the same trait.
pub struct HashEmbedder {
    dims: usize,
}

const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(8) }
    }

    fn bucket(&self, feature: &str, namespace: u64) -> usize {
        let mut h = namespace
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .wrapping_add(0x6A09_E667);
        for b in feature.bytes() {
            h = h.wrapping_mul(31).wrapping_add(u64::from(b));
        }
        (h % self.dims as u64) as usize
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for word in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            v[self.bucket(word, 1)] += WORD_WEIGHT;
            let chars: Vec<char> = word.chars().collect();
            if chars.len() >= 3 {
                for window in chars.windows(3) {
                    let trigram: String = window.iter().collect();
                    v[self.bucket(&trigram, 2)] += TRIGRAM_WEIGHT;
                }
            }
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

/// Wraps an embedder with a concurrency-safe exact-string cache. A miss is
/// pure recomputation, never a correctness issue.
pub struct CachedEmbedder {
    inner: Box<dyn Embedder>,
    cache: DashMap<String, Arc<Vec<f32>>>,
}

impl CachedEmbedder {
    pub fn new(inner: Box<dyn Embedder>) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
        }
    }

    /// Returns the cached vector for `text`, computing and inserting it on
    /// first sight.
    pub fn get_or_compute(&self, text: &str) -> Arc<Vec<f32>> {
        if let Some(hit) = self.cache.get(text) {
            return Arc::clone(&hit);
        }
        let vector = Arc::new(self.inner.embed(text));
        self.cache.insert(text.to_string(), Arc::clone(&vector));
        vector
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}

impl Embedder for CachedEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        (*self.get_or_compute(text)).clone()
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_is_deterministic_and_unit_length() {
        let e = HashEmbedder::new(128);
        let a = e.embed("what are the admission requirements");
        let b = e.embed("what are the admission requirements");
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_text_embeds_to_zero_vector() {
        let e = HashEmbedder::new(64);
        let v = e.embed("   ");
        assert_eq!(v.len(), 64);
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_related_texts_score_higher_than_unrelated() {
        let e = HashEmbedder::new(256);
        let q = e.embed("admission requirements");
        let related = e.embed("what are the admission requirements");
        let unrelated = e.embed("library opening hours");
        let close = crate::matcher::cosine_similarity(&q, &related);
        let far = crate::matcher::cosine_similarity(&q, &unrelated);
        assert!(close > far);
        assert!(close > 0.6);
    }

    #[test]
    fn test_cache_hits_do_not_recompute() {
        let cached = CachedEmbedder::new(Box::new(HashEmbedder::new(64)));
        let a = cached.get_or_compute("hostel fees");
        let b = cached.get_or_compute("hostel fees");
        assert_eq!(cached.cached_entries(), 1);
        assert!(Arc::ptr_eq(&a, &b));
        cached.clear();
        assert_eq!(cached.cached_entries(), 0);
    }
}
