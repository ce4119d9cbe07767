//! Embedding providers (text -> vector)
//!
//! The memory core never embeds text itself; the diverse query engine and
//! the CLI go through an [`EmbeddingProvider`] chosen at startup.

#[cfg(feature = "local-embeddings")]
pub mod local;
pub mod remote;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::EmbeddingConfig;
use crate::error::{Result, StrataError};
use crate::memory::types::Embedding;

#[cfg(feature = "local-embeddings")]
pub use local::LocalEmbedder;
pub use remote::RemoteEmbedder;

/// Trait for embedding providers (remote API, local model, mock)
///
/// Providers are called once per query text and are not retried on failure.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Embedding>;

    /// Output length, when known ahead of the first call
    fn dimension(&self) -> Option<usize>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// Available embedding providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// OpenAI-compatible HTTP API
    #[default]
    Remote,
    /// In-process fastembed model
    Local,
}

/// Build the provider selected in config
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider {
        EmbeddingProviderKind::Remote => Ok(Arc::new(RemoteEmbedder::new(config)?)),
        #[cfg(feature = "local-embeddings")]
        EmbeddingProviderKind::Local => Ok(Arc::new(LocalEmbedder::new()?)),
        #[cfg(not(feature = "local-embeddings"))]
        EmbeddingProviderKind::Local => Err(StrataError::Config(
            "embedding provider 'local' requires the `local-embeddings` feature".to_string(),
        )),
    }
}

/// Reject a provider whose output length disagrees with the memory dimension
pub fn check_dimension(provider: &dyn EmbeddingProvider, expected: usize) -> Result<()> {
    match provider.dimension() {
        Some(actual) if actual != expected => Err(StrataError::DimensionMismatch {
            expected,
            actual,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockEmbedder;

    #[test]
    fn test_provider_kind_default() {
        assert_eq!(EmbeddingProviderKind::default(), EmbeddingProviderKind::Remote);
    }

    #[cfg(not(feature = "local-embeddings"))]
    #[test]
    fn test_local_without_feature() {
        let config = EmbeddingConfig {
            provider: EmbeddingProviderKind::Local,
            ..EmbeddingConfig::default()
        };
        assert!(matches!(
            build_embedder(&config),
            Err(StrataError::Config(_))
        ));
    }

    #[test]
    fn test_check_dimension() {
        let mock = MockEmbedder::new(8);
        assert!(check_dimension(&mock, 8).is_ok());
        assert!(matches!(
            check_dimension(&mock, 16),
            Err(StrataError::DimensionMismatch {
                expected: 16,
                actual: 8
            })
        ));
    }
}
