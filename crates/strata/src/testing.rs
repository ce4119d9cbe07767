//! Test utilities: a deterministic embedding provider
//!
//! Lets query and server tests run without a network or a model download.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::error::{Result, StrataError};
use crate::memory::types::Embedding;

/// Produces hash-seeded vectors in [-1, 1] of a fixed dimension.
/// Texts registered with `with_fixed` return that vector instead, and
/// texts registered with `failing_on` return an embedding error.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    dimension: usize,
    fixed: Vec<(String, Embedding)>,
    failing: Vec<String>,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fixed: Vec::new(),
            failing: Vec::new(),
        }
    }

    pub fn with_fixed(mut self, text: impl Into<String>, embedding: Embedding) -> Self {
        self.fixed.push((text.into(), embedding));
        self
    }

    pub fn failing_on(mut self, text: impl Into<String>) -> Self {
        self.failing.push(text.into());
        self
    }

    /// Deterministic vector for `text`
    pub fn hash_embed(&self, text: &str) -> Embedding {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();

        (0..self.dimension)
            .map(|i| {
                let x = seed
                    .wrapping_mul(i as u64 + 1)
                    .wrapping_add(0x9e3779b97f4a7c15);
                let normalized = (x as f32) / (u64::MAX as f32);
                (normalized * 2.0) - 1.0
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        if self.failing.iter().any(|t| t == text) {
            return Err(StrataError::Embedding(format!("mock failure for '{text}'")));
        }

        if let Some((_, embedding)) = self.fixed.iter().find(|(t, _)| t == text) {
            return Ok(embedding.clone());
        }

        Ok(self.hash_embed(text))
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dimension)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_embedding_is_deterministic() {
        let mock = MockEmbedder::new(16);
        assert_eq!(
            mock.embed("hello world").await.unwrap(),
            mock.embed("hello world").await.unwrap()
        );
    }

    #[tokio::test]
    async fn mock_embedding_has_configured_dimension() {
        let mock = MockEmbedder::new(7);
        assert_eq!(mock.embed("test").await.unwrap().len(), 7);
    }

    #[test]
    fn mock_embedding_values_in_range() {
        let mock = MockEmbedder::new(64);
        for val in mock.hash_embed("test input") {
            assert!((-1.0..=1.0).contains(&val), "Value {} out of range", val);
        }
    }

    #[tokio::test]
    async fn mock_fixed_and_failing() {
        let mock = MockEmbedder::new(3)
            .with_fixed("up", vec![1.0, 0.0, 0.0])
            .failing_on("boom");

        assert_eq!(mock.embed("up").await.unwrap(), vec![1.0, 0.0, 0.0]);
        assert!(matches!(
            mock.embed("boom").await,
            Err(StrataError::Embedding(_))
        ));
    }
}
