//! The outer project container: a single-line JSON record whose `workspace`
//! field carries the XML payload.

use std::fs;
use std::path::{Path, PathBuf};

use blockmerge_core::{Error, Result};
use serde_json::{Map, Value};

pub const PAYLOAD_FIELD: &str = "workspace";

/// Read the container record from the first line of `path`.
pub fn read_record(path: &Path) -> Result<Map<String, Value>> {
    let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let line = content.lines().next().unwrap_or_default();
    let line = line.strip_prefix('\u{feff}').unwrap_or(line);

    match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(record)) => Ok(record),
        Ok(_) => Err(Error::decode(path, "project record is not a JSON object")),
        Err(e) => Err(Error::decode(path, e.to_string())),
    }
}

/// The workspace markup stored in the project file at `path`.
pub fn read_payload(path: &Path) -> Result<String> {
    tracing::info!("Retrieving workspace data from: {}", path.display());
    let record = read_record(path)?;
    payload_of(&record)
        .map(str::to_owned)
        .ok_or_else(|| missing_payload(path))
}

/// Replace the workspace markup of the project file at `path`, leaving every
/// other field of the record as it was.
///
/// The record is written to a temporary sibling and renamed into place.
pub fn write_container(path: &Path, payload: &str) -> Result<()> {
    let mut record = read_record(path)?;
    if payload_of(&record).is_none() {
        return Err(missing_payload(path));
    }
    record.insert(PAYLOAD_FIELD.to_string(), Value::String(payload.to_string()));

    let content =
        serde_json::to_string(&record).map_err(|e| Error::decode(path, e.to_string()))?;
    let tmp = temp_sibling(path);
    fs::write(&tmp, content).map_err(|e| Error::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| Error::io(path, e))?;
    tracing::info!("Replaced workspace data in: {}", path.display());
    Ok(())
}

fn payload_of(record: &Map<String, Value>) -> Option<&str> {
    record.get(PAYLOAD_FIELD).and_then(Value::as_str)
}

fn missing_payload(path: &Path) -> Error {
    Error::decode(path, format!("missing string field `{PAYLOAD_FIELD}`"))
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", name))
}
