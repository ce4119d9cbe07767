use clap::Parser;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use strata::memory::MemoryRegistry;

use crate::error::CliResult;
use crate::output::OutputFormat;

#[derive(Parser)]
pub struct StatsCommand {
    #[clap(long, help = "Only show tenants for this symbol")]
    pub symbol: Option<String>,

    #[clap(long, help = "Hide tenants with no stored records")]
    pub non_empty: bool,
}

impl StatsCommand {
    pub async fn execute(&self, registry: &MemoryRegistry, format: OutputFormat) -> CliResult<()> {
        let mut stats = registry.stats().await;
        if let Some(symbol) = &self.symbol {
            stats.retain(|s| &s.symbol == symbol);
        }
        if self.non_empty {
            stats.retain(|s| s.records > 0);
        }

        let total: usize = stats.iter().map(|s| s.records).sum();

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "total_records": total,
                    "embedding_dim": registry.embedding_dim(),
                    "tenants": stats,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                println!("Strata Statistics");
                println!("=================\n");

                if stats.is_empty() {
                    println!("No tenants match.");
                    return Ok(());
                }

                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["Symbol", "Memory Type", "Records", "Indexed"]);

                for s in &stats {
                    table.add_row([
                        s.symbol.clone(),
                        s.memory_type.to_string(),
                        s.records.to_string(),
                        s.indexed.to_string(),
                    ]);
                }

                println!("{table}\n");
                println!(
                    "Total: {} records across {} tenants (dimension {})",
                    total,
                    stats.len(),
                    registry.embedding_dim()
                );
            }
        }

        Ok(())
    }
}
