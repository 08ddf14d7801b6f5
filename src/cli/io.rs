//! JSON output for the CLI
//!
//! The final result is a single JSON object on stdout. Log lines share
//! stdout, so the summary is always the last line.

use std::io::{self, Write};

use serde_json::{json, Value};

use super::errors::CliResult;

fn write_line<W: Write>(out: &mut W, value: &Value) -> CliResult<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    write_line(&mut io::stdout(), &json!({ "status": "ok", "data": data }))
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    write_line(
        &mut io::stdout(),
        &json!({ "status": "error", "code": code, "message": message }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_line_per_value() {
        let mut buf = Vec::new();
        write_line(&mut buf, &json!({"status": "ok", "data": {"rounds": 2}})).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "{\"data\":{\"rounds\":2},\"status\":\"ok\"}\n");
    }
}
