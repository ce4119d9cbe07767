use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::embedding::EmbeddingProviderKind;
use crate::error::{Result, StrataError};
use crate::index::{IndexKind, Metric};

/// Main configuration structure for Strata
///
/// Built once at startup and passed by reference to every component that
/// needs it.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// On-disk layout and persistence lifecycle
    #[serde(default)]
    pub storage: StorageConfig,
    /// Tenant registry configuration
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Vector index backend selection
    #[serde(default)]
    pub index: IndexConfig,
    /// Embedding provider configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Diverse query configuration
    #[serde(default)]
    pub query: QueryConfig,
    /// HTTP daemon configuration
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Parse a config file at an explicit path
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StrataError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        toml::from_str(&content)
            .map_err(|e| StrataError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load from an explicit path, or search the default locations
    ///
    /// Falls back to `Config::default()` when no file is found.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = config_path {
            tracing::info!("Loading config from: {}", path.display());
            return Self::from_file(path);
        }

        let default_paths = [
            dirs::home_dir().map(|h| h.join(".strata").join("config.toml")),
            dirs::config_dir().map(|c| c.join("strata").join("config.toml")),
            Some(PathBuf::from("config.toml")),
        ];

        for path in default_paths.iter().flatten() {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }
}

/// Storage layout configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory holding `{symbol}/{memory_type}/` tenant directories
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Restore all tenants from `data_dir` when the daemon starts
    #[serde(default = "default_load_on_start")]
    pub load_on_start: bool,
    /// Persist all tenants to `data_dir` on graceful shutdown
    #[serde(default = "default_save_on_shutdown")]
    pub save_on_shutdown: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            load_on_start: default_load_on_start(),
            save_on_shutdown: default_save_on_shutdown(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".strata"))
        .unwrap_or_else(|| PathBuf::from(".strata"))
}

fn default_load_on_start() -> bool {
    true
}

fn default_save_on_shutdown() -> bool {
    true
}

/// Tenant registry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    /// Asset symbols to create tenants for
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,
    /// Length of every embedding stored in any tenant
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
    /// Capacity of each tenant's recency buffer
    #[serde(default = "default_max_recent_steps")]
    pub max_recent_steps: usize,
    /// Also persist recency buffers on save/load (off by default)
    #[serde(default)]
    pub persist_recent: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            embedding_dim: default_embedding_dim(),
            max_recent_steps: default_max_recent_steps(),
            persist_recent: false,
        }
    }
}

fn default_symbols() -> Vec<String> {
    vec!["BTC-USDT".to_string()]
}

fn default_embedding_dim() -> usize {
    1536
}

fn default_max_recent_steps() -> usize {
    5
}

/// Vector index backend configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct IndexConfig {
    /// Backend used for every tenant
    #[serde(default)]
    pub kind: IndexKind,
    /// Similarity metric (flat backend only)
    #[serde(default)]
    pub metric: Metric,
}

/// Embedding provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    /// Which provider implementation to build
    #[serde(default)]
    pub provider: EmbeddingProviderKind,
    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Embedding model identifier
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::default(),
            api_url: default_api_url(),
            api_key_env: default_api_key_env(),
            model: default_embedding_model(),
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_timeout_secs() -> u64 {
    30
}

/// Diverse query configuration
#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    /// Results per variant when the caller does not specify one
    #[serde(default = "default_query_top_k")]
    pub top_k: usize,
    /// Horizon queries with fewer words than this are skipped by `recall`
    #[serde(default = "default_min_query_words")]
    pub min_query_words: usize,
    /// Record field used to deduplicate and order merged results
    #[serde(default = "default_id_field")]
    pub id_field: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: default_query_top_k(),
            min_query_words: default_min_query_words(),
            id_field: default_id_field(),
        }
    }
}

fn default_query_top_k() -> usize {
    5
}

fn default_min_query_words() -> usize {
    6
}

fn default_id_field() -> String {
    "id".to_string()
}

/// HTTP daemon configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "127.0.0.1:7878")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Request timeout in seconds
    #[serde(default = "default_server_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            timeout_secs: default_server_timeout_secs(),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:7878".to_string()
}

fn default_server_timeout_secs() -> u64 {
    120
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.storage.load_on_start);
        assert!(config.storage.save_on_shutdown);
        assert_eq!(config.memory.symbols, vec!["BTC-USDT".to_string()]);
        assert_eq!(config.memory.embedding_dim, 1536);
        assert_eq!(config.memory.max_recent_steps, 5);
        assert!(!config.memory.persist_recent);
        assert_eq!(config.index.kind, IndexKind::Flat);
        assert_eq!(config.index.metric, Metric::Cosine);
        assert_eq!(config.embedding.provider, EmbeddingProviderKind::Remote);
        assert_eq!(config.embedding.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.embedding.timeout_secs, 30);
        assert_eq!(config.query.top_k, 5);
        assert_eq!(config.query.min_query_words, 6);
        assert_eq!(config.query.id_field, "id");
        assert_eq!(config.server.listen_addr, "127.0.0.1:7878");
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_str = r#"
[storage]
data_dir = "/tmp/strata"
load_on_start = false
save_on_shutdown = false

[memory]
symbols = ["BTC-USDT", "ETH-USDT"]
embedding_dim = 384
max_recent_steps = 10
persist_recent = true

[index]
kind = "lance"
metric = "l2"

[embedding]
provider = "local"
api_url = "http://localhost:8080/v1"
api_key_env = "EMBED_KEY"
model = "e5-small"
timeout_secs = 5

[query]
top_k = 3
min_query_words = 4
id_field = "news_id"

[server]
listen_addr = "0.0.0.0:9000"
timeout_secs = 10
"#;

        let config: Config = toml::from_str(toml_str).expect("Failed to parse TOML");

        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/strata"));
        assert!(!config.storage.load_on_start);
        assert!(!config.storage.save_on_shutdown);

        assert_eq!(config.memory.symbols, vec!["BTC-USDT", "ETH-USDT"]);
        assert_eq!(config.memory.embedding_dim, 384);
        assert_eq!(config.memory.max_recent_steps, 10);
        assert!(config.memory.persist_recent);

        assert_eq!(config.index.kind, IndexKind::Lance);
        assert_eq!(config.index.metric, Metric::L2);

        assert_eq!(config.embedding.provider, EmbeddingProviderKind::Local);
        assert_eq!(config.embedding.api_url, "http://localhost:8080/v1");
        assert_eq!(config.embedding.api_key_env, "EMBED_KEY");
        assert_eq!(config.embedding.model, "e5-small");
        assert_eq!(config.embedding.timeout_secs, 5);

        assert_eq!(config.query.top_k, 3);
        assert_eq!(config.query.min_query_words, 4);
        assert_eq!(config.query.id_field, "news_id");

        assert_eq!(config.server.listen_addr, "0.0.0.0:9000");
        assert_eq!(config.server.timeout_secs, 10);
    }

    #[test]
    fn test_toml_partial_deserialization() {
        let toml_str = r#"
[memory]
symbols = ["AAPL"]
"#;

        let config: Config = toml::from_str(toml_str).expect("Failed to parse partial TOML");

        assert_eq!(config.memory.symbols, vec!["AAPL"]);
        assert_eq!(config.memory.embedding_dim, 1536);
        assert_eq!(config.memory.max_recent_steps, 5);
        assert_eq!(config.index.kind, IndexKind::Flat);
        assert_eq!(config.query.top_k, 5);
    }

    #[test]
    fn test_unknown_index_kind_rejected() {
        let toml_str = r#"
[index]
kind = "hnsw"
"#;
        assert!(toml::from_str::<Config>(toml_str).is_err());
    }

    #[test]
    fn test_from_file_missing_path() {
        let result = Config::from_file(Path::new("/definitely/not/here/config.toml"));
        assert!(matches!(result, Err(StrataError::Config(_))));
    }

    #[test]
    fn test_from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[query]\ntop_k = 9\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.query.top_k, 9);
    }
}
