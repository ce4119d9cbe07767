pub mod memory;
pub mod query;
pub mod stats;

pub use memory::MemoryCommand;
pub use query::QueryCommand;
pub use stats::StatsCommand;

use std::path::Path;

use strata::config::Config;
use strata::memory::{MemoryRegistry, MemoryType, RegistryOptions, validate_symbol};

use crate::error::CliResult;

/// Load every tenant found under `data_dir`
///
/// Symbols come from the directory names in the root, so the CLI can inspect
/// a root written with a different symbol list than the local config.
pub async fn open_registry(config: &Config, data_dir: &Path) -> CliResult<MemoryRegistry> {
    if !data_dir.is_dir() {
        return Err(format!("No memory root at {}", data_dir.display()).into());
    }

    let mut symbols = Vec::new();
    for entry in std::fs::read_dir(data_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            tracing::warn!("Skipping non UTF-8 directory in {}", data_dir.display());
            continue;
        };
        // Dot directories are staging or parked snapshots
        if name.starts_with('.') {
            continue;
        }
        if let Err(e) = validate_symbol(&name) {
            tracing::warn!("Skipping {}: {}", entry.path().display(), e);
            continue;
        }
        symbols.push(name);
    }
    symbols.sort();

    if symbols.is_empty() {
        return Err(format!("No tenants found under {}", data_dir.display()).into());
    }

    let mut options = RegistryOptions::from_config(config);
    options.root = data_dir.to_path_buf();
    options.symbols = symbols;

    let registry = MemoryRegistry::new(options)?;
    let report = registry.load_local(data_dir).await;
    for failure in &report.failed {
        tracing::warn!("Skipping {}: {}", failure.tenant, failure.reason);
    }

    Ok(registry)
}

pub(crate) fn parse_memory_type(raw: &str) -> CliResult<MemoryType> {
    raw.parse().map_err(|_| {
        format!(
            "Unknown memory type: {raw}. Use market_intelligence, low_level_reflection, or high_level_reflection."
        )
        .into()
    })
}
