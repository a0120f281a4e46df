use serde_json::{Map, Value};

/// Headline figure of each command, in order of preference.
const PRIORITY_KEYS: [&str; 8] = [
    "irr_percent",
    "payback_period_years",
    "installment",
    "unallocated_kwh",
    "annual_kwh",
    "npv",
    "cumulative_cash_flow",
    "total_paid",
];

/// Print just the key answer value from the output.
///
/// Looks for a well-known field in the result (descending into `metrics`
/// for a full analysis, and into the last row of a table), then falls back
/// to the first field.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    match result_obj {
        Value::Object(map) => {
            if let Some(val) = headline(map) {
                println!("{}", format_minimal(val));
            } else if let Some((key, val)) = map.iter().next() {
                println!("{}: {}", key, format_minimal(val));
            }
        }
        // Quote lists: one installment per line
        Value::Array(items) => {
            for item in items {
                match item.as_object().and_then(headline) {
                    Some(val) => println!("{}", format_minimal(val)),
                    None => println!("{}", format_minimal(item)),
                }
            }
        }
        other => println!("{}", format_minimal(other)),
    }
}

fn headline(map: &Map<String, Value>) -> Option<&Value> {
    if let Some(Value::Object(metrics)) = map.get("metrics") {
        return headline(metrics);
    }
    if let Some(val) = PRIORITY_KEYS
        .iter()
        .filter_map(|key| map.get(*key))
        .find(|val| !val.is_null())
    {
        return Some(val);
    }
    match map.get("cash_flow") {
        Some(Value::Array(rows)) => rows.last().and_then(Value::as_object).and_then(headline),
        _ => None,
    }
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
