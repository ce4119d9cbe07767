use serde_json::Value;
use strata::memory::Record;

/// Fields tried in order when summarizing a record for a table cell
const PREVIEW_FIELDS: [&str; 5] = ["title", "summary", "text", "content", "reasoning"];

#[derive(Clone, Copy, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Short human-readable summary of a record
pub fn record_preview(record: &Record, max_len: usize) -> String {
    let text = PREVIEW_FIELDS
        .iter()
        .find_map(|field| record.get(*field).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| Value::Object(record.clone()).to_string());
    truncate_string(&text, max_len)
}

/// Copy of `record` with the embedding replaced by its length
pub fn elide_embedding(record: &Record, embedding_field: &str) -> Record {
    let mut shown = record.clone();
    if let Some(Value::Array(values)) = shown.get(embedding_field) {
        let note = Value::String(format!("<{} floats>", values.len()));
        shown.insert(embedding_field.to_string(), note);
    }
    shown
}
