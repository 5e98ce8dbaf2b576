//! `ledger tail` CLI command.

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL, Table};
use serde::Serialize;

use crate::cli::context::ServiceGraph;
use crate::cli::output::{output, CommandOutput};
use crate::services::event_ledger::LedgerReader;

#[derive(Debug, Serialize)]
pub struct LedgerTailOutput {
    pub rows: Vec<LedgerRow>,
}

#[derive(Debug, Serialize)]
pub struct LedgerRow {
    pub timestamp: String,
    pub entry_type: String,
    pub payload: serde_json::Value,
}

impl CommandOutput for LedgerTailOutput {
    fn to_human(&self) -> String {
        if self.rows.is_empty() {
            return "No ledger entries.".to_string();
        }
        let mut table = Table::new();
        table.load_preset(UTF8_FULL).set_header(vec!["timestamp", "type", "payload"]);
        for row in &self.rows {
            table.add_row(vec![row.timestamp.clone(), row.entry_type.clone(), row.payload.to_string()]);
        }
        table.to_string()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(graph: &ServiceGraph, run_id: String, entry_types: Vec<String>, json_mode: bool) -> Result<()> {
    let reader = LedgerReader::new(graph.ledger.clone());

    let entries = if entry_types.is_empty() {
        reader.tail(&run_id).await
    } else {
        let types: Vec<&str> = entry_types.iter().map(String::as_str).collect();
        reader.tail_filtered(&run_id, &types).await
    }
    .context("failed to read ledger")?;

    let rows = entries
        .iter()
        .map(|entry| LedgerRow {
            timestamp: entry.timestamp.to_rfc3339(),
            entry_type: entry.entry_type.clone(),
            payload: entry.payload.clone(),
        })
        .collect();
    output(&LedgerTailOutput { rows }, json_mode);
    Ok(())
}
