use std::sync::Arc;

use clap::Parser;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use strata::config::Config;
use strata::embedding::{build_embedder, check_dimension};
use strata::memory::MemoryRegistry;
use strata::query::{DiverseQueryEngine, QueryContext, QueryVariantKind, merge_variant_items};

use crate::commands::parse_memory_type;
use crate::error::CliResult;
use crate::output::{OutputFormat, record_preview};

#[derive(Parser)]
pub struct QueryCommand {
    #[clap(long, short, help = "Asset symbol (e.g. BTC-USDT)")]
    pub symbol: String,

    #[clap(long, short = 't', help = "Memory type")]
    pub r#type: String,

    #[clap(long, help = "Query text")]
    pub text: String,

    #[clap(long, short = 'k', help = "Results per variant (defaults to query.top_k)")]
    pub top_k: Option<usize>,

    #[clap(
        long = "variant",
        short = 'v',
        help = "Variant to run (plain, short_term, medium_term, long_term); repeatable, defaults to all"
    )]
    pub variants: Vec<String>,
}

impl QueryCommand {
    pub async fn execute(
        &self,
        registry: MemoryRegistry,
        config: &Config,
        format: OutputFormat,
    ) -> CliResult<()> {
        let memory_type = parse_memory_type(&self.r#type)?;
        let variants: Vec<QueryVariantKind> = if self.variants.is_empty() {
            QueryVariantKind::ALL.to_vec()
        } else {
            self.variants
                .iter()
                .map(|v| v.parse())
                .collect::<strata::Result<_>>()?
        };

        let embedder = build_embedder(&config.embedding)?;
        check_dimension(embedder.as_ref(), registry.embedding_dim())?;
        let engine = DiverseQueryEngine::new(Arc::new(registry), embedder, &config.query);

        let ctx = QueryContext {
            memory_type,
            symbol: self.symbol.clone(),
            query_text: self.text.clone(),
        };
        let results = engine.query(&ctx, &variants, self.top_k).await?;
        let merged = merge_variant_items(&results, engine.id_field());

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "results": results,
                    "merged": merged,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["Variant", "Rank", "Score", "Preview"]);

                for result in &results {
                    for (rank, (item, score)) in result.items.iter().zip(&result.scores).enumerate() {
                        table.add_row([
                            result.variant.to_string(),
                            (rank + 1).to_string(),
                            format!("{score:.4}"),
                            record_preview(item, 50),
                        ]);
                    }
                }

                println!("{table}");
                println!(
                    "\n{} unique records across {} variants (merged by '{}')",
                    merged.len(),
                    results.len(),
                    engine.id_field()
                );
            }
        }

        Ok(())
    }
}
