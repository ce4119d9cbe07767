pub mod commands;
pub mod error;
pub mod output;

pub use commands::{MemoryCommand, QueryCommand, StatsCommand, open_registry};
pub use error::{CliError, CliResult};
pub use output::{OutputFormat, elide_embedding, record_preview, truncate_string};
