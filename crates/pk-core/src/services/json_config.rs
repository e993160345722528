//! Shallow merges into JSON config documents.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::Result;

use super::atomic::write_atomic;

/// `<file>.bak` next to the config, e.g. `config.json.bak`.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}

/// Overwrite the top-level keys of the JSON document at `path` with
/// `changes` and write it back atomically.
///
/// A missing file starts from `{}`; so does one that is not a JSON object.
/// With `backup`, the previous file is copied verbatim to
/// [`backup_path`] first. Returns the document as written.
pub fn update_config_json(
    path: &Path,
    changes: &Map<String, Value>,
    backup: bool,
) -> Result<Value> {
    let mut document = Map::new();
    match std::fs::read(path) {
        Ok(previous) => {
            match serde_json::from_slice::<Value>(&previous) {
                Ok(Value::Object(map)) => document = map,
                Ok(_) | Err(_) => {
                    tracing::warn!(path = %path.display(), "config_not_a_json_object_replaced")
                }
            }
            if backup {
                write_atomic(&backup_path(path), &previous)?;
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    for (key, value) in changes {
        document.insert(key.clone(), value.clone());
    }

    let document = Value::Object(document);
    let mut json = serde_json::to_string_pretty(&document)?;
    json.push('\n');
    write_atomic(path, json.as_bytes())?;
    tracing::debug!(path = %path.display(), keys = changes.len(), "config_json_updated");
    Ok(document)
}
