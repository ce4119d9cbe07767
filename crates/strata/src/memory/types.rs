use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StrataError};

/// Identifier of a stored record, unique within one tenant
pub type RecordId = String;

/// Fixed-length vector representing a record's semantics
pub type Embedding = Vec<f32>;

/// Arbitrary JSON object stored verbatim, embedding field included
pub type Record = serde_json::Map<String, Value>;

/// The three fixed memory layers every symbol owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    /// Price and news observations
    MarketIntelligence,
    /// Per-step trade reasoning
    LowLevelReflection,
    /// Longer-horizon lessons across trades
    HighLevelReflection,
}

impl MemoryType {
    /// Every memory type, in declaration order
    pub const ALL: [MemoryType; 3] = [
        MemoryType::MarketIntelligence,
        MemoryType::LowLevelReflection,
        MemoryType::HighLevelReflection,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::MarketIntelligence => "market_intelligence",
            MemoryType::LowLevelReflection => "low_level_reflection",
            MemoryType::HighLevelReflection => "high_level_reflection",
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryType {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self> {
        MemoryType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| StrataError::InvalidMemoryType(s.to_string()))
    }
}

/// Identifies one memory unit and one recency buffer
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TenantKey {
    pub symbol: String,
    pub memory_type: MemoryType,
}

impl TenantKey {
    pub fn new(symbol: impl Into<String>, memory_type: MemoryType) -> Self {
        Self {
            symbol: symbol.into(),
            memory_type,
        }
    }
}

impl fmt::Display for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.symbol, self.memory_type)
    }
}

/// Ranked records with their index scores, best match first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub items: Vec<Record>,
    pub scores: Vec<f32>,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Pull the numeric vector stored under `field` out of a record
pub fn extract_embedding(record: &Record, field: &str) -> Result<Embedding> {
    let value = record
        .get(field)
        .ok_or_else(|| StrataError::MissingField(field.to_string()))?;

    let items = value.as_array().ok_or_else(|| {
        StrataError::InvalidArgument(format!("field '{field}' is not an array of numbers"))
    })?;

    items
        .iter()
        .map(|v| {
            v.as_f64().map(|x| x as f32).ok_or_else(|| {
                StrataError::InvalidArgument(format!("field '{field}' contains a non-number"))
            })
        })
        .collect()
}
