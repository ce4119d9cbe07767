//! Diverse query: one question asked several ways, results merged
//!
//! Each variant renders its own text, is embedded independently, and
//! queries the same tenant. Merged output is ordered by record id, not by
//! score, so callers read it in chronological order.

pub mod variants;

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::QueryConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{Result, StrataError};
use crate::memory::registry::MemoryRegistry;
use crate::memory::types::{MemoryType, Record};

pub use variants::{QueryContext, QueryVariantKind};

/// One variant's rendered text and ranked hits
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantResult {
    pub variant: QueryVariantKind,
    pub query_text: String,
    pub items: Vec<Record>,
    pub scores: Vec<f32>,
}

pub struct DiverseQueryEngine {
    registry: Arc<MemoryRegistry>,
    embedder: Arc<dyn EmbeddingProvider>,
    top_k: usize,
    min_query_words: usize,
    id_field: String,
}

impl DiverseQueryEngine {
    pub fn new(
        registry: Arc<MemoryRegistry>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: &QueryConfig,
    ) -> Self {
        Self {
            registry,
            embedder,
            top_k: config.top_k,
            min_query_words: config.min_query_words,
            id_field: config.id_field.clone(),
        }
    }

    pub fn registry(&self) -> &Arc<MemoryRegistry> {
        &self.registry
    }

    pub fn default_top_k(&self) -> usize {
        self.top_k
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// Run each requested variant concurrently, results in request order
    ///
    /// Repeated variants run once. A variant whose embedding fails yields
    /// no items; the others are unaffected.
    pub async fn query(
        &self,
        ctx: &QueryContext,
        variants: &[QueryVariantKind],
        top_k: Option<usize>,
    ) -> Result<Vec<VariantResult>> {
        if !self.registry.has_tenant(ctx.memory_type, &ctx.symbol) {
            return Err(StrataError::UnknownSymbol(ctx.symbol.clone()));
        }

        let top_k = top_k.unwrap_or(self.top_k);
        let mut seen = HashSet::new();
        let unique: Vec<QueryVariantKind> = variants
            .iter()
            .copied()
            .filter(|v| seen.insert(*v))
            .collect();

        let runs = unique.into_iter().map(|variant| self.run_variant(ctx, variant, top_k));
        Ok(join_all(runs).await)
    }

    async fn run_variant(
        &self,
        ctx: &QueryContext,
        variant: QueryVariantKind,
        top_k: usize,
    ) -> VariantResult {
        let query_text = variant.render(ctx);
        let mut result = VariantResult {
            variant,
            query_text,
            items: Vec::new(),
            scores: Vec::new(),
        };

        let embedding = match self.embedder.embed(&result.query_text).await {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!(
                    "Embedding failed for {} variant on {} {}: {}",
                    variant, ctx.memory_type, ctx.symbol, e
                );
                return result;
            }
        };

        match self
            .registry
            .query_memory(ctx.memory_type, &ctx.symbol, &embedding, top_k)
            .await
        {
            Ok(hits) => {
                debug!("{} variant returned {} items", variant, hits.len());
                result.items = hits.items;
                result.scores = hits.scores;
            }
            Err(e) => warn!("Query failed for {} variant: {}", variant, e),
        }

        result
    }

    /// Horizon-keyed recall used by the agent pipeline
    ///
    /// Each `(key, text)` pair picks its variant from the key (`plain`,
    /// `short_term_query`, ...). Texts shorter than `min_query_words` words
    /// are skipped. Hits from all kept queries are merged by id.
    pub async fn recall(
        &self,
        memory_type: MemoryType,
        symbol: &str,
        queries: &[(String, String)],
        top_k: Option<usize>,
    ) -> Result<Vec<Record>> {
        let mut results = Vec::new();

        for (key, text) in queries {
            let word_count = text.split_whitespace().count();
            if word_count < self.min_query_words {
                debug!(
                    "Skipping {} query with {} words (minimum {})",
                    key, word_count, self.min_query_words
                );
                continue;
            }

            let variant: QueryVariantKind = key.parse()?;
            let ctx = QueryContext {
                memory_type,
                symbol: symbol.to_string(),
                query_text: text.clone(),
            };
            results.extend(self.query(&ctx, &[variant], top_k).await?);
        }

        let merged = merge_variant_items(&results, &self.id_field);
        debug!(
            "Recalled {} records for {} {}",
            merged.len(),
            memory_type,
            symbol
        );
        Ok(merged)
    }
}

/// Deduplicate records across variants and order them by id
///
/// The first occurrence of an id wins, scanning variants in order. Records
/// without `id_field` are dropped. Numeric ids sort before string ids.
pub fn merge_variant_items(results: &[VariantResult], id_field: &str) -> Vec<Record> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged: Vec<(Value, Record)> = Vec::new();

    for result in results {
        for item in &result.items {
            let Some(id) = item.get(id_field) else {
                debug!("Dropping {} item without '{}' field", result.variant, id_field);
                continue;
            };

            if seen.insert(id.to_string()) {
                merged.push((id.clone(), item.clone()));
            }
        }
    }

    merged.sort_by(|(a, _), (b, _)| compare_ids(a, b));
    merged.into_iter().map(|(_, record)| record).collect()
}

fn compare_ids(a: &Value, b: &Value) -> Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => id_text(a).cmp(&id_text(b)),
    }
}

fn id_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
