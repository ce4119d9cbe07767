use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use strata::memory::MemoryRegistry;

use crate::commands::parse_memory_type;
use crate::error::CliResult;
use crate::output::{OutputFormat, elide_embedding, record_preview, truncate_string};

#[derive(Parser)]
pub struct MemoryCommand {
    #[clap(subcommand)]
    pub command: MemorySubcommand,
}

#[derive(Subcommand)]
pub enum MemorySubcommand {
    #[clap(about = "List records in one tenant, newest first")]
    List(ListArgs),

    #[clap(about = "Show one record")]
    Show(ShowArgs),
}

#[derive(Parser)]
pub struct ListArgs {
    #[clap(long, short, help = "Asset symbol (e.g. BTC-USDT)")]
    pub symbol: String,

    #[clap(
        long,
        short = 't',
        help = "Memory type (market_intelligence, low_level_reflection, high_level_reflection)"
    )]
    pub r#type: String,

    #[clap(
        long,
        short,
        default_value = "20",
        help = "Maximum number of records to display"
    )]
    pub limit: usize,
}

#[derive(Parser)]
pub struct ShowArgs {
    #[clap(long, short, help = "Asset symbol (e.g. BTC-USDT)")]
    pub symbol: String,

    #[clap(long, short = 't', help = "Memory type")]
    pub r#type: String,

    #[clap(
        long,
        default_value = "embedding",
        help = "Record field holding the embedding"
    )]
    pub embedding_field: String,

    #[clap(help = "Record id (e.g. 2024-03-01-12:00:00)")]
    pub id: String,
}

impl MemoryCommand {
    pub async fn execute(&self, registry: &MemoryRegistry, format: OutputFormat) -> CliResult<()> {
        match &self.command {
            MemorySubcommand::List(args) => Self::list(registry, args, format).await,
            MemorySubcommand::Show(args) => Self::show(registry, args, format).await,
        }
    }

    async fn list(registry: &MemoryRegistry, args: &ListArgs, format: OutputFormat) -> CliResult<()> {
        let memory_type = parse_memory_type(&args.r#type)?;
        let unit = registry.get_memory(memory_type, &args.symbol).await?;

        // Ids sort chronologically, so reverse id order is newest first
        let records: Vec<_> = unit.records().iter().rev().take(args.limit).collect();

        match format {
            OutputFormat::Json => {
                let output: Vec<_> = records
                    .iter()
                    .map(|(id, record)| {
                        serde_json::json!({
                            "id": id,
                            "preview": record_preview(record, 200),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                if records.is_empty() {
                    println!("No records found.");
                    return Ok(());
                }

                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["ID", "Preview"]);

                for (id, record) in &records {
                    table.add_row([truncate_string(id, 28), record_preview(record, 60)]);
                }

                println!("{table}");
                println!(
                    "\nShowing {} of {} records in {}/{}",
                    records.len(),
                    unit.len(),
                    args.symbol,
                    memory_type
                );
            }
        }

        Ok(())
    }

    async fn show(registry: &MemoryRegistry, args: &ShowArgs, format: OutputFormat) -> CliResult<()> {
        let memory_type = parse_memory_type(&args.r#type)?;
        let unit = registry.get_memory(memory_type, &args.symbol).await?;

        let record = unit
            .get(&args.id)
            .ok_or_else(|| format!("Record not found: {}", args.id))?;
        let shown = elide_embedding(record, &args.embedding_field);

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "id": &args.id,
                    "symbol": &args.symbol,
                    "memory_type": memory_type,
                    "record": shown,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                println!("Record {}", args.id);
                println!("Tenant: {}/{}\n", args.symbol, memory_type);

                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["Field", "Value"]);

                for (field, value) in &shown {
                    let text = match value.as_str() {
                        Some(s) => s.to_string(),
                        None => value.to_string(),
                    };
                    table.add_row([field.clone(), text]);
                }

                println!("{table}");
            }
        }

        Ok(())
    }
}
