//! Text embedders.
//!
//! The knowledge base only ever sees vectors, so any sentence encoder can sit
//! behind [`Embedder`]. `HashedBagOfWords` is the bundled deterministic
//! implementation used for the CLI and tests.

use deskmate_nlu::text;

/// Converts text into a fixed-dimension vector.
///
/// Implementations must be pure: the same text always yields the same
/// vector. Index build and query time must use the same embedder.
pub trait Embedder: Send + Sync {
    /// Embed `text`. The result always has `dimensions()` components.
    fn embed(&self, text: &str) -> Vec<f32>;

    /// Dimensionality of produced vectors.
    fn dimensions(&self) -> usize;

    /// Identifier recorded in index artifacts.
    fn name(&self) -> String {
        format!("external-{}", self.dimensions())
    }
}

/// Feature-hashed bag of content words, L2-normalised.
///
/// Stop words are dropped so that phrasing ("how do I", "what if") does not
/// dominate the vector. Text with no content words embeds to all zeros.
#[derive(Debug, Clone)]
pub struct HashedBagOfWords {
    dimensions: usize,
}

impl HashedBagOfWords {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn bucket(&self, token: &str) -> usize {
        (fnv1a(token.as_bytes()) % self.dimensions as u64) as usize
    }
}

impl Default for HashedBagOfWords {
    fn default() -> Self {
        Self::new(384)
    }
}

impl Embedder for HashedBagOfWords {
    fn embed(&self, input: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text::content_tokens(input) {
            vector[self.bucket(&token)] += 1.0;
        }
        normalize(&mut vector);
        vector
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> String {
        format!("hashed-bow-{}", self.dimensions)
    }
}

/// Scale `vector` to unit length in place. Zero vectors are left as is.
pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 && norm.is_finite() {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

/// 64-bit FNV-1a. Stable across builds and platforms, unlike `DefaultHasher`.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_embed_dimensions() {
        let embedder = HashedBagOfWords::new(64);
        assert_eq!(embedder.embed("refund my order").len(), 64);
        assert_eq!(embedder.dimensions(), 64);
    }

    #[test]
    fn test_embed_is_unit_length() {
        let embedder = HashedBagOfWords::default();
        let v = embedder.embed("How do I reset my password?");
        assert!((norm(&v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_embed_deterministic() {
        let a = HashedBagOfWords::new(128);
        let b = HashedBagOfWords::new(128);
        assert_eq!(a.embed("update billing address"), b.embed("update billing address"));
    }

    #[test]
    fn test_phrasing_does_not_change_embedding() {
        let embedder = HashedBagOfWords::default();
        let a = embedder.embed("How do I reset my password?");
        let b = embedder.embed("reset password");
        assert!((cosine(&a, &b) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_stop_words_only_embeds_to_zero() {
        let embedder = HashedBagOfWords::default();
        let v = embedder.embed("what if it is");
        assert_eq!(norm(&v), 0.0);
    }

    #[test]
    fn test_fnv1a_known_vectors() {
        assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn test_name_records_dimension() {
        assert_eq!(HashedBagOfWords::new(256).name(), "hashed-bow-256");
    }
}
