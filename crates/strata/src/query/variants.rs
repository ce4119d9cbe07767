use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StrataError};
use crate::memory::types::MemoryType;

/// What is being asked, of which tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryContext {
    pub memory_type: MemoryType,
    pub symbol: String,
    pub query_text: String,
}

/// Named framings of one query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryVariantKind {
    Plain,
    ShortTerm,
    MediumTerm,
    LongTerm,
}

impl QueryVariantKind {
    /// Default variant set, in request order
    pub const ALL: [QueryVariantKind; 4] = [
        QueryVariantKind::Plain,
        QueryVariantKind::ShortTerm,
        QueryVariantKind::MediumTerm,
        QueryVariantKind::LongTerm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryVariantKind::Plain => "plain",
            QueryVariantKind::ShortTerm => "short_term",
            QueryVariantKind::MediumTerm => "medium_term",
            QueryVariantKind::LongTerm => "long_term",
        }
    }

    /// Render the text that gets embedded for this variant
    pub fn render(&self, ctx: &QueryContext) -> String {
        let text = ctx.query_text.trim();
        match self {
            QueryVariantKind::Plain => text.to_string(),
            QueryVariantKind::ShortTerm => {
                format!("Short-term outlook for {}: {}", ctx.symbol, text)
            }
            QueryVariantKind::MediumTerm => {
                format!("Medium-term outlook for {}: {}", ctx.symbol, text)
            }
            QueryVariantKind::LongTerm => {
                format!("Long-term outlook for {}: {}", ctx.symbol, text)
            }
        }
    }
}

impl fmt::Display for QueryVariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryVariantKind {
    type Err = StrataError;

    /// Accepts both `short_term` and the pipeline's `short_term_query` keys
    fn from_str(s: &str) -> Result<Self> {
        let name = s.strip_suffix("_query").unwrap_or(s);
        QueryVariantKind::ALL
            .into_iter()
            .find(|v| v.as_str() == name)
            .ok_or_else(|| StrataError::InvalidArgument(format!("unknown query variant '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(text: &str) -> QueryContext {
        QueryContext {
            memory_type: MemoryType::MarketIntelligence,
            symbol: "BTC-USDT".to_string(),
            query_text: text.to_string(),
        }
    }

    #[test]
    fn test_parse_names_and_query_keys() {
        assert_eq!("plain".parse::<QueryVariantKind>().unwrap(), QueryVariantKind::Plain);
        assert_eq!(
            "short_term_query".parse::<QueryVariantKind>().unwrap(),
            QueryVariantKind::ShortTerm
        );
        assert_eq!(
            "long_term".parse::<QueryVariantKind>().unwrap(),
            QueryVariantKind::LongTerm
        );
        assert!("weekly".parse::<QueryVariantKind>().is_err());
    }

    #[test]
    fn test_plain_renders_text_verbatim() {
        assert_eq!(QueryVariantKind::Plain.render(&ctx(" ETF inflows ")), "ETF inflows");
    }

    #[test]
    fn test_horizon_variants_differ() {
        let c = ctx("ETF inflows");
        let rendered: Vec<_> = QueryVariantKind::ALL.iter().map(|v| v.render(&c)).collect();

        assert_eq!(rendered[1], "Short-term outlook for BTC-USDT: ETF inflows");
        for (i, a) in rendered.iter().enumerate() {
            for b in &rendered[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
