// Output formatting utilities for CLI commands (table, JSON, YAML).

use std::str::FromStr;

use anyhow::{Result, anyhow};
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "yaml" => Ok(Self::Yaml),
            _ => Err(anyhow!(
                "Unknown format: '{}'. Valid formats: table, json, yaml",
                s
            )),
        }
    }
}

/// Format data as JSON string.
pub fn format_json<T: Serialize>(data: &T) -> Result<String> {
    serde_json::to_string_pretty(data).map_err(|e| anyhow!("JSON serialization failed: {}", e))
}

/// Format data as YAML string.
pub fn format_yaml<T: Serialize>(data: &T) -> Result<String> {
    serde_yaml::to_string(data).map_err(|e| anyhow!("YAML serialization failed: {}", e))
}

/// Format rows as a borderless table with a header line.
pub fn format_table<T: Tabled>(rows: &[T]) -> String {
    let mut table = Table::new(rows);
    table.with(Style::blank());
    table.to_string()
}

/// Render `data` in `format`, using `rows` for the table form.
pub fn render<T: Serialize, R: Tabled>(format: OutputFormat, data: &T, rows: &[R]) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(format_table(rows)),
        OutputFormat::Json => format_json(data),
        OutputFormat::Yaml => format_yaml(data),
    }
}
