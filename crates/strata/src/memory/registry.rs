//! Multi-tenant router over memory units and recency buffers
//!
//! One tenant exists per `(symbol, memory_type)` pair registered at
//! construction. The tenant map never changes afterwards, so callers on
//! different tenants never contend; each tenant serializes its own writes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::sync::{Mutex, RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, StrataError};
use crate::index::{IndexKind, Metric};
use crate::memory::recency::RecencyBuffer;
use crate::memory::types::{MemoryType, QueryResult, Record, RecordId, TenantKey};
use crate::memory::unit::MemoryUnit;
use crate::storage;

/// Construction parameters for a registry
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    pub root: PathBuf,
    pub symbols: Vec<String>,
    pub embedding_dim: usize,
    pub max_recent_steps: usize,
    pub index_kind: IndexKind,
    pub metric: Metric,
    pub persist_recent: bool,
}

impl RegistryOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            root: config.storage.data_dir.clone(),
            symbols: config.memory.symbols.clone(),
            embedding_dim: config.memory.embedding_dim,
            max_recent_steps: config.memory.max_recent_steps,
            index_kind: config.index.kind,
            metric: config.index.metric,
            persist_recent: config.memory.persist_recent,
        }
    }
}

/// Outcome of a bulk save or load
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PersistReport {
    pub succeeded: Vec<TenantKey>,
    pub failed: Vec<TenantFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TenantFailure {
    pub tenant: TenantKey,
    pub reason: String,
}

impl PersistReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Per-tenant counters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TenantStats {
    pub symbol: String,
    pub memory_type: MemoryType,
    pub records: usize,
    pub indexed: usize,
    pub recent: usize,
}

struct Tenant {
    unit: RwLock<MemoryUnit>,
    recent: Mutex<RecencyBuffer>,
}

pub struct MemoryRegistry {
    root: PathBuf,
    symbols: Vec<String>,
    order: Vec<TenantKey>,
    tenants: HashMap<TenantKey, Tenant>,
    embedding_dim: usize,
    max_recent_steps: usize,
    persist_recent: bool,
}

impl MemoryRegistry {
    /// Create every tenant up front; all start empty
    pub fn new(options: RegistryOptions) -> Result<Self> {
        if options.max_recent_steps == 0 {
            return Err(StrataError::InvalidArgument(
                "max_recent_steps must be at least 1".to_string(),
            ));
        }

        let mut symbols: Vec<String> = Vec::new();
        for symbol in options.symbols {
            validate_symbol(&symbol)?;
            if !symbols.contains(&symbol) {
                symbols.push(symbol);
            }
        }

        let mut order = Vec::with_capacity(symbols.len() * MemoryType::ALL.len());
        let mut tenants = HashMap::new();
        for symbol in &symbols {
            for memory_type in MemoryType::ALL {
                let key = TenantKey::new(symbol.clone(), memory_type);
                let tenant = Tenant {
                    unit: RwLock::new(MemoryUnit::new(
                        options.index_kind,
                        options.embedding_dim,
                        options.metric,
                    )?),
                    recent: Mutex::new(RecencyBuffer::new(options.max_recent_steps)?),
                };
                order.push(key.clone());
                tenants.insert(key, tenant);
            }
        }

        info!(
            "Memory registry ready: {} symbols, {} tenants",
            symbols.len(),
            order.len()
        );

        Ok(Self {
            root: options.root,
            symbols,
            order,
            tenants,
            embedding_dim: options.embedding_dim,
            max_recent_steps: options.max_recent_steps,
            persist_recent: options.persist_recent,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(RegistryOptions::from_config(config))
    }

    /// Default persistence root
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    pub fn max_recent_steps(&self) -> usize {
        self.max_recent_steps
    }

    /// Every tenant in stable order: symbols as registered, then memory types
    pub fn tenant_keys(&self) -> &[TenantKey] {
        &self.order
    }

    pub fn has_tenant(&self, memory_type: MemoryType, symbol: &str) -> bool {
        self.tenants
            .contains_key(&TenantKey::new(symbol, memory_type))
    }

    fn tenant(&self, memory_type: MemoryType, symbol: &str) -> Result<&Tenant> {
        self.tenants
            .get(&TenantKey::new(symbol, memory_type))
            .ok_or_else(|| StrataError::UnknownSymbol(symbol.to_string()))
    }

    /// Shared access to one tenant's memory unit
    pub async fn get_memory(
        &self,
        memory_type: MemoryType,
        symbol: &str,
    ) -> Result<RwLockReadGuard<'_, MemoryUnit>> {
        Ok(self.tenant(memory_type, symbol)?.unit.read().await)
    }

    pub async fn add_memory(
        &self,
        memory_type: MemoryType,
        symbol: &str,
        record: &Record,
        embedding_field: &str,
    ) -> Result<RecordId> {
        let tenant = self.tenant(memory_type, symbol)?;
        debug!("Add memory for {} {}", memory_type, symbol);
        tenant.unit.write().await.add(record, embedding_field).await
    }

    pub async fn query_memory(
        &self,
        memory_type: MemoryType,
        symbol: &str,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<QueryResult> {
        let tenant = self.tenant(memory_type, symbol)?;
        debug!("Query memory for {} {} (top_k={})", memory_type, symbol, top_k);
        Ok(tenant.unit.read().await.query(query_embedding, top_k).await)
    }

    pub async fn add_recent_history(
        &self,
        memory_type: MemoryType,
        symbol: &str,
        record: Record,
    ) -> Result<()> {
        let tenant = self.tenant(memory_type, symbol)?;
        debug!("Add recent history for {} {}", memory_type, symbol);
        tenant.recent.lock().await.push(record);
        Ok(())
    }

    /// The last `min(k, len)` entries, oldest first and most recent last
    pub async fn get_recent_history(
        &self,
        memory_type: MemoryType,
        symbol: &str,
        k: usize,
    ) -> Result<Vec<Record>> {
        let tenant = self.tenant(memory_type, symbol)?;
        tenant.recent.lock().await.recent(k)
    }

    pub async fn stats(&self) -> Vec<TenantStats> {
        let mut stats = Vec::with_capacity(self.order.len());
        for key in &self.order {
            if let Some(tenant) = self.tenants.get(key) {
                let unit = tenant.unit.read().await;
                let recent = tenant.recent.lock().await.len();
                stats.push(TenantStats {
                    symbol: key.symbol.clone(),
                    memory_type: key.memory_type,
                    records: unit.len(),
                    indexed: unit.index_len(),
                    recent,
                });
            }
        }
        stats
    }

    /// Directory holding one tenant's files under `root`
    pub fn tenant_dir(root: &Path, key: &TenantKey) -> PathBuf {
        root.join(&key.symbol).join(key.memory_type.as_str())
    }

    /// Persist every tenant under `root/{symbol}/{memory_type}/`
    ///
    /// Only a failure to create `root` itself is an error; per-tenant
    /// failures are logged and reported.
    pub async fn save_local(&self, root: &Path) -> Result<PersistReport> {
        std::fs::create_dir_all(root).map_err(|e| {
            StrataError::Storage(format!("Failed to create {}: {}", root.display(), e))
        })?;

        let mut report = PersistReport::default();
        for key in &self.order {
            let Some(tenant) = self.tenants.get(key) else {
                continue;
            };
            let dir = Self::tenant_dir(root, key);

            let mut outcome = tenant.unit.read().await.save(&dir).await;
            if outcome.is_ok() && self.persist_recent {
                outcome = tenant.recent.lock().await.save(&dir);
            }

            match outcome {
                Ok(()) => {
                    debug!("Saved tenant {}", key);
                    report.succeeded.push(key.clone());
                }
                Err(e) => {
                    warn!("Failed to save tenant {}: {}", key, e);
                    report.failed.push(TenantFailure {
                        tenant: key.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Saved {} tenants to {} ({} failed)",
            report.succeeded.len(),
            root.display(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Restore every tenant from `root/{symbol}/{memory_type}/`
    ///
    /// A tenant that fails to load keeps its prior contents and the rest
    /// continue loading.
    pub async fn load_local(&self, root: &Path) -> PersistReport {
        let mut report = PersistReport::default();

        for key in &self.order {
            let Some(tenant) = self.tenants.get(key) else {
                continue;
            };
            let dir = Self::tenant_dir(root, key);

            if let Err(e) = tenant.unit.write().await.load(&dir).await {
                let failure = StrataError::TenantLoadFailure {
                    tenant: key.to_string(),
                    reason: e.to_string(),
                };
                warn!("{}", failure);
                report.failed.push(TenantFailure {
                    tenant: key.clone(),
                    reason: e.to_string(),
                });
                continue;
            }

            if self.persist_recent {
                // Recency history is best-effort; the memory unit already loaded
                if let Err(e) = tenant.recent.lock().await.load(&storage::committed_dir(&dir)) {
                    warn!("No recent history restored for {}: {}", key, e);
                }
            }

            debug!("Loaded tenant {}", key);
            report.succeeded.push(key.clone());
        }

        info!(
            "Loaded {} tenants from {} ({} failed)",
            report.succeeded.len(),
            root.display(),
            report.failed.len()
        );
        report
    }
}

/// Reject symbols that cannot name a single directory under the root
pub fn validate_symbol(symbol: &str) -> Result<()> {
    if symbol.is_empty()
        || symbol == "."
        || symbol == ".."
        || symbol.contains(['/', '\\'])
    {
        return Err(StrataError::InvalidArgument(format!(
            "invalid symbol '{symbol}'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(symbols: &[&str]) -> RegistryOptions {
        RegistryOptions {
            root: PathBuf::from("unused"),
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            embedding_dim: 3,
            max_recent_steps: 2,
            index_kind: IndexKind::Flat,
            metric: Metric::Cosine,
            persist_recent: false,
        }
    }

    #[test]
    fn test_one_tenant_per_symbol_and_type() {
        let registry = MemoryRegistry::new(options(&["BTC", "ETH", "BTC"])).unwrap();

        assert_eq!(registry.symbols(), &["BTC".to_string(), "ETH".to_string()]);
        assert_eq!(registry.tenant_keys().len(), 6);
        assert_eq!(
            registry.tenant_keys()[0],
            TenantKey::new("BTC", MemoryType::MarketIntelligence)
        );
        assert_eq!(
            registry.tenant_keys()[3],
            TenantKey::new("ETH", MemoryType::MarketIntelligence)
        );
    }

    #[test]
    fn test_zero_recent_steps_rejected() {
        let mut opts = options(&["BTC"]);
        opts.max_recent_steps = 0;
        assert!(matches!(
            MemoryRegistry::new(opts),
            Err(StrataError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_path_like_symbol_rejected() {
        assert!(MemoryRegistry::new(options(&["BTC/USDT"])).is_err());
        assert!(MemoryRegistry::new(options(&[".."])).is_err());
        assert!(MemoryRegistry::new(options(&[""])).is_err());
    }

    #[tokio::test]
    async fn test_unknown_symbol() {
        let registry = MemoryRegistry::new(options(&["BTC"])).unwrap();
        let record = json!({"step": 1}).as_object().cloned().unwrap();

        let result = registry
            .add_recent_history(MemoryType::MarketIntelligence, "DOGE", record)
            .await;
        assert!(matches!(result, Err(StrataError::UnknownSymbol(s)) if s == "DOGE"));

        assert!(matches!(
            registry
                .query_memory(MemoryType::MarketIntelligence, "DOGE", &[1.0, 0.0, 0.0], 1)
                .await,
            Err(StrataError::UnknownSymbol(_))
        ));
    }

    #[tokio::test]
    async fn test_recency_is_per_tenant() {
        let registry = MemoryRegistry::new(options(&["BTC"])).unwrap();
        let record = json!({"step": 1}).as_object().cloned().unwrap();

        registry
            .add_recent_history(MemoryType::LowLevelReflection, "BTC", record.clone())
            .await
            .unwrap();

        let low = registry
            .get_recent_history(MemoryType::LowLevelReflection, "BTC", 2)
            .await
            .unwrap();
        let high = registry
            .get_recent_history(MemoryType::HighLevelReflection, "BTC", 2)
            .await
            .unwrap();

        assert_eq!(low, vec![record]);
        assert!(high.is_empty());
    }
}
