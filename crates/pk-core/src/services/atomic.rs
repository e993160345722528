use std::fs;
use std::io::Write;
use std::path::Path;

/// Replace `path` with `contents` so readers see either the old file or the
/// new one, never a fragment.
///
/// The data goes to a uniquely named temporary sibling in the same directory,
/// is synced to disk, and is then renamed over the target. Concurrent writers
/// of the same path each get their own temp file; the last rename wins.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent)?;
            parent
        }
        None => Path::new("."),
    };
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "portkeeper".to_string());

    let mut tmp = tempfile::Builder::new()
        .prefix(&format!(".{name}."))
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    // Keep the mode of a file we replace; new files get the temp file's.
    if let Ok(existing) = fs::metadata(path) {
        if existing.is_file() {
            tmp.as_file().set_permissions(existing.permissions())?;
        }
    }
    tmp.as_file().sync_all()?;
    // An unpersisted temp file is deleted when dropped.
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
