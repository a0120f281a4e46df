use serde_json::Value;
use std::io::{self, Read};

/// Input document piped into `netmeter`, e.g. `cat proposal.json | netmeter analyze`.
///
/// `None` when stdin is a terminal or carries only whitespace, in which case
/// commands fall back to their flags.
pub fn read_stdin() -> Result<Option<Value>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;

    let document = buffer.trim();
    if document.is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(document)
        .map_err(|e| format!("Failed to parse input document from stdin: {}", e))?;
    log::debug!("read {} bytes of JSON from stdin", document.len());
    Ok(Some(value))
}
