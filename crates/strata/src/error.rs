//! Error types for Strata

use thiserror::Error;

/// Main error type for Strata operations
#[derive(Error, Debug)]
pub enum StrataError {
    /// A vector's length disagrees with the index dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The designated embedding field is absent from a record
    #[error("Missing field: {0}")]
    MissingField(String),

    /// Memory type outside the fixed set
    #[error("Invalid memory type: {0}")]
    InvalidMemoryType(String),

    /// Symbol was not registered when the registry was built
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    /// Caller supplied an out-of-range or malformed argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Vector search failed inside an index backend
    #[error("Index search failure: {0}")]
    IndexSearchFailure(String),

    /// A single tenant could not be restored from disk
    #[error("Failed to load tenant {tenant}: {reason}")]
    TenantLoadFailure { tenant: String, reason: String },

    /// Storage-related errors (record files, index files, LanceDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Embedding provider errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors
    #[error("Server error: {0}")]
    Server(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StrataError {
    fn from(e: serde_json::Error) -> Self {
        StrataError::Serialization(e.to_string())
    }
}

/// Result type alias for Strata operations
pub type Result<T> = std::result::Result<T, StrataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StrataError::DimensionMismatch {
            expected: 3,
            actual: 4,
        };
        assert_eq!(err.to_string(), "Dimension mismatch: expected 3, got 4");

        let err = StrataError::TenantLoadFailure {
            tenant: "BTC/market_intelligence".to_string(),
            reason: "missing memory.json".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to load tenant BTC/market_intelligence: missing memory.json"
        );
    }

    #[test]
    fn test_serde_json_error_converts() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: StrataError = parse_err.into();
        assert!(matches!(err, StrataError::Serialization(_)));
    }
}
