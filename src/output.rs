//! Command output rendering
//!
//! Results are relayed as JSON values and rendered in the format chosen with
//! `--output`. Text output restricts lists to the command's default
//! properties so tables stay readable.

use crate::error::Result;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Pretty-printed JSON (best for scripting)
    #[default]
    Json,
    /// Tables and key/value lines (best for humans)
    Text,
    /// Comma separated values
    Csv,
}

/// Print a result to stdout
pub fn print(value: &Value, format: OutputFormat, default_properties: &[&str]) -> Result<()> {
    let rendered = render(value, format, default_properties)?;
    if !rendered.is_empty() {
        println!("{}", rendered.trim_end_matches('\n'));
    }
    Ok(())
}

pub fn render(value: &Value, format: OutputFormat, default_properties: &[&str]) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        OutputFormat::Text => Ok(render_text(value, default_properties)),
        OutputFormat::Csv => render_csv(value, default_properties),
    }
}

/// Cell text for a value: strings unquoted, null empty, the rest as JSON
fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn columns(items: &[Value], default_properties: &[&str]) -> Vec<String> {
    if !default_properties.is_empty() {
        return default_properties.iter().map(|p| p.to_string()).collect();
    }
    items
        .iter()
        .find_map(|i| i.as_object())
        .map(|obj| obj.keys().cloned().collect())
        .unwrap_or_default()
}

fn render_text(value: &Value, default_properties: &[&str]) -> String {
    match value {
        Value::Null => String::new(),
        Value::Array(items) if items.iter().all(|i| i.is_object()) && !items.is_empty() => {
            render_table(items, &columns(items, default_properties))
        }
        Value::Array(items) => items
            .iter()
            .map(|i| cell(Some(i)))
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(obj) => {
            let width = obj.keys().map(|k| k.len()).max().unwrap_or(0);
            obj.iter()
                .map(|(k, v)| format!("{:<width$}: {}", k, cell(Some(v)), width = width))
                .collect::<Vec<_>>()
                .join("\n")
        }
        other => cell(Some(other)),
    }
}

fn render_table(items: &[Value], columns: &[String]) -> String {
    let rows: Vec<Vec<String>> = items
        .iter()
        .map(|item| columns.iter().map(|c| cell(item.get(c))).collect())
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            rows.iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(c.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let format_row = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<w$}", c, w = *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let mut lines = vec![format_row(columns), format_row(&separator)];
    lines.extend(rows.iter().map(|r| format_row(r)));
    lines.join("\n")
}

fn render_csv(value: &Value, default_properties: &[&str]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    match value {
        Value::Null => return Ok(String::new()),
        Value::Array(items) if items.iter().any(|i| i.is_object()) => {
            let columns = columns(items, default_properties);
            writer.write_record(&columns)?;
            for item in items {
                writer.write_record(columns.iter().map(|c| cell(item.get(c))))?;
            }
        }
        Value::Array(items) => {
            for item in items {
                writer.write_record([cell(Some(item))])?;
            }
        }
        Value::Object(obj) => {
            writer.write_record(obj.keys())?;
            writer.write_record(obj.values().map(|v| cell(Some(v))))?;
        }
        other => writer.write_record([cell(Some(other))])?,
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
