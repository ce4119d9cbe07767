use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::memory::{MemoryType, PersistReport, QueryResult, Record, RecordId, TenantStats};
use crate::query::{QueryContext, QueryVariantKind, VariantResult, merge_variant_items};

use super::{ApiError, AppState};

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

fn default_embedding_field() -> String {
    "embedding".to_string()
}

fn parse_memory_type(raw: &str) -> Result<MemoryType, ApiError> {
    raw.parse().map_err(ApiError)
}

pub async fn health_handler() -> Json<Value> {
    Json(serde_json::json!({"status": "ok"}))
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub tenants: Vec<TenantStats>,
}

pub async fn stats_handler(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        tenants: state.registry.stats().await,
    })
}

#[derive(Debug, Deserialize)]
pub struct AddMemoryRequest {
    pub record: Record,
    #[serde(default = "default_embedding_field")]
    pub embedding_field: String,
}

#[derive(Debug, Serialize)]
pub struct AddMemoryResponse {
    pub id: RecordId,
}

pub async fn add_memory_handler(
    State(state): State<Arc<AppState>>,
    Path((symbol, memory_type)): Path<(String, String)>,
    payload: Result<Json<AddMemoryRequest>, JsonRejection>,
) -> ApiResult<AddMemoryResponse> {
    let Json(request) = payload?;
    let memory_type = parse_memory_type(&memory_type)?;
    let id = state
        .registry
        .add_memory(memory_type, &symbol, &request.record, &request.embedding_field)
        .await?;
    Ok(Json(AddMemoryResponse { id }))
}

#[derive(Debug, Deserialize)]
pub struct QueryMemoryRequest {
    pub embedding: Vec<f32>,
    pub top_k: Option<usize>,
}

pub async fn query_memory_handler(
    State(state): State<Arc<AppState>>,
    Path((symbol, memory_type)): Path<(String, String)>,
    payload: Result<Json<QueryMemoryRequest>, JsonRejection>,
) -> ApiResult<QueryResult> {
    let Json(request) = payload?;
    let memory_type = parse_memory_type(&memory_type)?;
    let top_k = request.top_k.unwrap_or(state.engine.default_top_k());
    let result = state
        .registry
        .query_memory(memory_type, &symbol, &request.embedding, top_k)
        .await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct AddRecentRequest {
    pub record: Record,
}

pub async fn add_recent_handler(
    State(state): State<Arc<AppState>>,
    Path((symbol, memory_type)): Path<(String, String)>,
    payload: Result<Json<AddRecentRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(request) = payload?;
    let memory_type = parse_memory_type(&memory_type)?;
    state
        .registry
        .add_recent_history(memory_type, &symbol, request.record)
        .await?;
    Ok(Json(serde_json::json!({"status": "ok"})))
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub k: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RecentResponse {
    pub items: Vec<Record>,
}

/// Recent records, oldest first; `k` defaults to the buffer capacity
pub async fn get_recent_handler(
    State(state): State<Arc<AppState>>,
    Path((symbol, memory_type)): Path<(String, String)>,
    query: Result<Query<RecentQuery>, QueryRejection>,
) -> ApiResult<RecentResponse> {
    let Query(query) = query?;
    let memory_type = parse_memory_type(&memory_type)?;
    let k = query.k.unwrap_or(state.registry.max_recent_steps());
    let items = state
        .registry
        .get_recent_history(memory_type, &symbol, k)
        .await?;
    Ok(Json(RecentResponse { items }))
}

#[derive(Debug, Deserialize)]
pub struct DiverseQueryRequest {
    pub memory_type: String,
    pub symbol: String,
    pub query_text: String,
    pub variants: Option<Vec<String>>,
    pub top_k: Option<usize>,
    #[serde(default)]
    pub merge: bool,
}

#[derive(Debug, Serialize)]
pub struct DiverseQueryResponse {
    pub results: Vec<VariantResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged: Option<Vec<Record>>,
}

pub async fn diverse_query_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DiverseQueryRequest>, JsonRejection>,
) -> ApiResult<DiverseQueryResponse> {
    let Json(request) = payload?;
    let memory_type = parse_memory_type(&request.memory_type)?;
    let variants: Vec<QueryVariantKind> = match &request.variants {
        Some(names) => names
            .iter()
            .map(|n| n.parse())
            .collect::<crate::error::Result<_>>()?,
        None => QueryVariantKind::ALL.to_vec(),
    };

    let ctx = QueryContext {
        memory_type,
        symbol: request.symbol,
        query_text: request.query_text,
    };
    let results = state.engine.query(&ctx, &variants, request.top_k).await?;
    let merged = request
        .merge
        .then(|| merge_variant_items(&results, state.engine.id_field()));

    Ok(Json(DiverseQueryResponse { results, merged }))
}

#[derive(Debug, Deserialize)]
pub struct RecallRequest {
    pub memory_type: String,
    pub symbol: String,
    /// Horizon key (`plain`, `short_term_query`, ...) to query text
    pub queries: BTreeMap<String, String>,
    pub top_k: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RecallResponse {
    pub items: Vec<Record>,
}

pub async fn recall_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RecallRequest>, JsonRejection>,
) -> ApiResult<RecallResponse> {
    let Json(request) = payload?;
    let memory_type = parse_memory_type(&request.memory_type)?;
    let queries: Vec<(String, String)> = request.queries.into_iter().collect();
    let items = state
        .engine
        .recall(memory_type, &request.symbol, &queries, request.top_k)
        .await?;
    Ok(Json(RecallResponse { items }))
}

pub async fn save_handler(State(state): State<Arc<AppState>>) -> ApiResult<PersistReport> {
    let report = state.registry.save_local(&state.data_dir).await?;
    Ok(Json(report))
}

pub async fn load_handler(State(state): State<Arc<AppState>>) -> Json<PersistReport> {
    Json(state.registry.load_local(&state.data_dir).await)
}
