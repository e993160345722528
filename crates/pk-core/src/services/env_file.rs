//! `KEY=VALUE` environment files.

use std::path::Path;

use crate::error::Result;

use super::atomic::write_atomic;

/// Parse env-file text. Blank lines, `#` comments and lines without `=` are
/// skipped; keys and values are trimmed. A repeated key keeps its first
/// position and its last value.
pub fn parse(contents: &str) -> Vec<(String, String)> {
    let mut entries = Vec::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        set(&mut entries, key.trim(), value.trim());
    }
    entries
}

/// Entries of the env file at `path`; a missing file has none.
pub fn read(path: &Path) -> Result<Vec<(String, String)>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(parse(&contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Overlay `updates` on `base`: existing keys keep their place and take the
/// new value, new keys are appended in the order given.
pub fn merge<K, V>(
    mut base: Vec<(String, String)>,
    updates: impl IntoIterator<Item = (K, V)>,
) -> Vec<(String, String)>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    for (key, value) in updates {
        set(&mut base, key.as_ref(), value.as_ref());
    }
    base
}

pub fn render(entries: &[(String, String)]) -> String {
    entries
        .iter()
        .map(|(key, value)| format!("{key}={value}\n"))
        .collect()
}

/// Write `data` to the env file at `path`, atomically. With `merge`, keys
/// already in the file survive unless `data` overwrites them; without it the
/// file is replaced. Returns the entries written.
pub fn write_env<K, V>(
    path: &Path,
    data: impl IntoIterator<Item = (K, V)>,
    merge_existing: bool,
) -> Result<Vec<(String, String)>>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let base = if merge_existing { read(path)? } else { Vec::new() };
    let entries = merge(base, data);
    write_atomic(path, render(&entries).as_bytes())?;
    tracing::debug!(path = %path.display(), keys = entries.len(), "env_file_written");
    Ok(entries)
}

fn set(entries: &mut Vec<(String, String)>, key: &str, value: &str) {
    match entries.iter_mut().find(|(k, _)| k == key) {
        Some((_, existing)) => *existing = value.to_string(),
        None => entries.push((key.to_string(), value.to_string())),
    }
}
