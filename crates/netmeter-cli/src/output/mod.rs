pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::Value;

/// Print a command result.
///
/// Commands hand over either a bare `{"result": ...}` object or a full
/// computation envelope (`result`, `warnings`, `methodology`, `metadata`).
/// JSON and table output show the warnings themselves; CSV and minimal output
/// only carry the result, so envelope warnings go to stderr to keep stdout
/// parseable.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => {
            csv_out::print_csv(value);
            forward_warnings(value);
        }
        OutputFormat::Minimal => {
            minimal::print_minimal(value);
            forward_warnings(value);
        }
    }
}

fn forward_warnings(value: &Value) {
    let Some(Value::Array(warnings)) = value.get("warnings") else {
        return;
    };
    for warning in warnings.iter().filter_map(Value::as_str) {
        eprintln!("warning: {warning}");
    }
}
