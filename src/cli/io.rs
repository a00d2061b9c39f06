//! JSON I/O handling for the CLI
//!
//! - Dataset files: a single JSON array of objects
//! - Output: single JSON object per command via stdout

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde_json::Value;

use super::errors::{CliError, CliResult};

/// Read a dataset file
pub fn read_dataset(path: &Path) -> CliResult<Vec<Value>> {
    let content = fs::read_to_string(path).map_err(|e| {
        CliError::invalid_dataset(format!("Failed to read {}: {}", path.display(), e))
    })?;

    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Array(records)) => Ok(records),
        Ok(_) => Err(CliError::invalid_dataset(format!(
            "{} must contain a JSON array",
            path.display()
        ))),
        Err(e) => Err(CliError::invalid_dataset(format!(
            "{} is not valid JSON: {}",
            path.display(),
            e
        ))),
    }
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "ok",
        "data": data
    });

    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, &response)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}
