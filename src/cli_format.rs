//! Rendering of query results and table listings for the terminal.

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use serde_json::{json, Value};
use symql_vtab::{QueryResult, TableInfo};

/// Shown for SQL NULL in text output.
pub const NULL_TEXT: &str = "NULL";

/// Output format for query results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
    Tsv,
}

impl OutputFormat {
    /// Returns the delimiter for CSV/TSV formats
    pub(crate) fn delimiter(&self) -> Option<&'static str> {
        match self {
            Self::Csv => Some(","),
            Self::Tsv => Some("\t"),
            _ => None,
        }
    }
}

/// Escape a field for CSV output (handles commas, quotes, newlines)
pub(crate) fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Escape a field for TSV output (replaces tabs and newlines)
pub(crate) fn tsv_escape(field: &str) -> String {
    field
        .replace('\t', "\\t")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

/// Format fields as a delimited row (CSV or TSV)
pub(crate) fn format_delimited_row(format: OutputFormat, fields: &[&str]) -> String {
    let escaped: Vec<String> = match format {
        OutputFormat::Csv => fields.iter().map(|f| csv_escape(f)).collect(),
        OutputFormat::Tsv => fields.iter().map(|f| tsv_escape(f)).collect(),
        _ => fields.iter().map(|s| s.to_string()).collect(),
    };
    let delimiter = format.delimiter().unwrap_or(",");
    escaped.join(delimiter)
}

/// JSON form of a result: rows are arrays of cells, NULL is `null`.
pub fn result_json(result: &QueryResult) -> Value {
    if !result.success {
        return json!({
            "success": false,
            "error": result.error.as_deref().unwrap_or("Query failed"),
        });
    }
    let rows: Vec<Vec<Option<&str>>> = result
        .rows
        .iter()
        .map(|row| row.values.iter().map(|v| v.as_deref()).collect())
        .collect();
    json!({
        "success": true,
        "columns": result.columns,
        "rows": rows,
        "row_count": result.row_count,
        "execution_ms": result.execution_ms,
        "truncated": result.truncated,
    })
}

/// Render a successful result in `format`.
///
/// Failed results render as their error message; callers decide where it
/// goes.
pub fn render_result(result: &QueryResult, format: OutputFormat) -> String {
    if !result.success {
        return result.error.clone().unwrap_or_else(|| "Query failed".to_string());
    }
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&result_json(result)).unwrap_or_default()
        }
        OutputFormat::Csv | OutputFormat::Tsv => {
            let mut lines = Vec::with_capacity(result.rows.len() + 1);
            let header: Vec<&str> = result.columns.iter().map(String::as_str).collect();
            lines.push(format_delimited_row(format, &header));
            for row in &result.rows {
                let fields: Vec<&str> = row.values.iter().map(|v| v.as_deref().unwrap_or("")).collect();
                lines.push(format_delimited_row(format, &fields));
            }
            lines.join("\n")
        }
        OutputFormat::Text => {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL_CONDENSED);
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(
                result
                    .columns
                    .iter()
                    .map(|c| Cell::new(c).fg(Color::Cyan))
                    .collect::<Vec<_>>(),
            );
            for row in &result.rows {
                table.add_row(
                    row.values
                        .iter()
                        .map(|v| match v {
                            Some(text) => Cell::new(text),
                            None => Cell::new(NULL_TEXT).fg(Color::DarkGrey),
                        })
                        .collect::<Vec<_>>(),
                );
            }
            let mut out = table.to_string();
            out.push('\n');
            out.push_str(&footer(result));
            out
        }
    }
}

fn footer(result: &QueryResult) -> String {
    let noun = if result.row_count == 1 { "row" } else { "rows" };
    let mut line = format!("({} {}, {} ms)", result.row_count, noun, result.execution_ms);
    if result.truncated {
        line.push_str(" [truncated]");
    }
    line
}

/// Table of names, row estimates and filterable columns.
pub fn render_tables(tables: &[TableInfo]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Table").fg(Color::Cyan),
        Cell::new("Rows (est.)").fg(Color::Cyan),
        Cell::new("Indexed columns").fg(Color::Cyan),
    ]);
    for info in tables {
        table.add_row(vec![
            Cell::new(&info.name),
            Cell::new(info.estimated_rows),
            Cell::new(info.filtered_columns.join(", ")),
        ]);
    }
    table.to_string()
}

/// `CREATE TABLE`-style description of one table.
pub fn render_schema(info: &TableInfo) -> String {
    let columns: Vec<String> = info
        .columns
        .iter()
        .map(|c| {
            let indexed = if info.filtered_columns.contains(&c.name) {
                "  -- indexed"
            } else {
                ""
            };
            format!("  {} {}{}", c.name, c.data_type, indexed)
        })
        .collect();
    format!("CREATE TABLE {} (\n{}\n);", info.name, columns.join(",\n"))
}

/// Two-column listing of symbol counts.
pub fn render_summary(counts: &[(&str, usize)]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![
        Cell::new("Kind").fg(Color::Cyan),
        Cell::new("Count").fg(Color::Cyan),
    ]);
    for (label, count) in counts {
        table.add_row(vec![Cell::new(label), Cell::new(count)]);
    }
    table.to_string()
}
