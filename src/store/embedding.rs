//! Deterministic stand-in embeddings and vector similarity.

use sha2::{Digest, Sha256};

/// Turns text into a fixed-length vector. Must be deterministic.
pub trait Embedder: Send + Sync {
    /// Output dimension.
    fn dimension(&self) -> usize;

    /// Embed `text` into exactly [`dimension`](Embedder::dimension) values.
    fn embed(&self, text: &str) -> Vec<f32>;
}

/// Projects the SHA-256 digest of the text into `dimension` values.
///
/// Each digest byte maps to `[0, 1]`. Dimensions past the 32 digest bytes
/// are zero; smaller dimensions truncate the digest.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    /// Create an embedder producing `dimension` values.
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Embedder for HashEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let digest = Sha256::digest(text.as_bytes());
        let mut vector: Vec<f32> = digest
            .iter()
            .take(self.dimension)
            .map(|b| f32::from(*b) / 255.0)
            .collect();
        vector.resize(self.dimension, 0.0);
        vector
    }
}

/// Cosine similarity in `[-1, 1]`.
///
/// Unequal lengths, empty input or a zero-norm side yield exactly 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let x = f64::from(x);
        let y = f64::from(y);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}

/// Pseudonymous key for a raw student identifier: 16 hex chars of SHA-256.
pub fn hash_entity_id(raw_id: &str) -> String {
    Sha256::digest(raw_id.as_bytes())
        .iter()
        .take(8)
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_embedder_is_deterministic() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed("I have been feeling low");
        let b = embedder.embed("I have been feeling low");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, embedder.embed("I have been feeling great"));
    }

    #[test]
    fn test_hash_embedder_pads_and_truncates() {
        let long = HashEmbedder::new(40).embed("text");
        assert_eq!(long.len(), 40);
        assert!(long[32..].iter().all(|v| *v == 0.0));

        let short = HashEmbedder::new(8).embed("text");
        assert_eq!(short.as_slice(), &long[..8]);
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        let c = vec![0.0, 1.0, 0.0];
        let d = vec![-1.0, 0.0, 0.0];

        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-12);
        assert!(cosine_similarity(&a, &c).abs() < 1e-12);
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_similarity_symmetric_and_bounded() {
        let embedder = HashEmbedder::new(32);
        let a = embedder.embed("alpha");
        let b = embedder.embed("beta");
        let ab = cosine_similarity(&a, &b);
        let ba = cosine_similarity(&b, &a);
        assert_eq!(ab, ba);
        assert!((-1.0..=1.0).contains(&ab));
    }

    #[test]
    fn test_cosine_similarity_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0, 3.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_hash_entity_id() {
        let hashed = hash_entity_id("student-042");
        assert_eq!(hashed.len(), 16);
        assert!(hashed.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hashed, hash_entity_id("student-042"));
        assert_ne!(hashed, hash_entity_id("student-043"));
    }
}
