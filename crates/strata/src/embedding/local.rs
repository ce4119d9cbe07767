//! In-process embeddings with fastembed
//!
//! Uses multilingual-e5-small (384 dimensions). Inference is blocking, so
//! calls run on the blocking thread pool.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fastembed::{EmbeddingModel as FastEmbedModel, InitOptions, TextEmbedding};
use tracing::info;

use crate::embedding::EmbeddingProvider;
use crate::error::{Result, StrataError};
use crate::memory::types::Embedding;

pub const LOCAL_EMBEDDING_DIMENSION: usize = 384;

pub struct LocalEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
}

impl LocalEmbedder {
    pub fn new() -> Result<Self> {
        let model = TextEmbedding::try_new(InitOptions::new(FastEmbedModel::MultilingualE5Small))
            .map_err(|e| StrataError::Embedding(e.to_string()))?;
        info!("LocalEmbedder loaded multilingual-e5-small");
        Ok(Self {
            model: Arc::new(Mutex::new(model)),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let model = Arc::clone(&self.model);
        let text = text.to_string();

        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| StrataError::Embedding("Embedding model lock poisoned".to_string()))?;
            let embeddings = model
                .embed(vec![text], None)
                .map_err(|e| StrataError::Embedding(e.to_string()))?;
            embeddings
                .into_iter()
                .next()
                .ok_or_else(|| StrataError::Embedding("No embedding returned".to_string()))
        })
        .await
        .map_err(|e| StrataError::Embedding(format!("Embedding task failed: {e}")))?
    }

    fn dimension(&self) -> Option<usize> {
        Some(LOCAL_EMBEDDING_DIMENSION)
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

#[cfg(all(test, feature = "ml-tests"))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_embed_returns_correct_dimension() {
        let embedder = LocalEmbedder::new().expect("Failed to load model");
        let embedding = embedder.embed("Bitcoin rallies").await.expect("Failed to embed");
        assert_eq!(embedding.len(), LOCAL_EMBEDDING_DIMENSION);
    }
}
