use std::fmt;

use strata::StrataError;

#[derive(Debug)]
pub struct CliError(pub String);

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for CliError {}

impl From<String> for CliError {
    fn from(s: String) -> Self {
        CliError(s)
    }
}

impl From<StrataError> for CliError {
    fn from(e: StrataError) -> Self {
        match e {
            // Symbols come from the memory root's directory names
            StrataError::UnknownSymbol(symbol) => {
                CliError(format!("No tenant directory for symbol '{symbol}' in this memory root"))
            }
            StrataError::Config(message) => CliError(format!("Config: {message}")),
            other => CliError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError(format!("JSON error: {e}"))
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError(format!("IO error: {e}"))
    }
}

pub type CliResult<T> = Result<T, CliError>;
