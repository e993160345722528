use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::Rng;

const BACKOFF_MIN_MS: u64 = 20;
const BACKOFF_MAX_MS: u64 = 80;

/// `<lock path>.lck`, the auxiliary file whose exclusive creation is the lock.
pub fn marker_path(lock_path: &Path) -> PathBuf {
    let mut name = lock_path.as_os_str().to_owned();
    name.push(".lck");
    PathBuf::from(name)
}

/// Fallback lock for platforms without advisory locks.
///
/// Known limitation: if the holder dies without unlocking, the marker stays
/// on disk and every later acquire spins until someone deletes it. The
/// holder's pid is written into the marker to help with that cleanup.
pub(super) struct MarkerLock {
    marker: PathBuf,
    file: File,
}

impl MarkerLock {
    pub(super) fn acquire(lock_path: &Path) -> io::Result<Self> {
        let marker = marker_path(lock_path);
        let mut rng = rand::thread_rng();
        let mut attempts: u64 = 0;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&marker) {
                Ok(file) => {
                    let file = stamp_or_discard(file, &marker)?;
                    if attempts > 0 {
                        tracing::debug!(attempts, marker = %marker.display(), "marker_lock_contended");
                    }
                    return Ok(Self { marker, file });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    attempts += 1;
                    let wait = rng.gen_range(BACKOFF_MIN_MS..=BACKOFF_MAX_MS);
                    std::thread::sleep(Duration::from_millis(wait));
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub(super) fn unlock(self) -> io::Result<()> {
        let Self { marker, file } = self;
        drop(file);
        match fs::remove_file(&marker) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// Write our pid into a freshly created marker. If that fails the marker is
/// removed again, since no guard will exist to remove it later.
fn stamp_or_discard<W: Write>(mut file: W, marker: &Path) -> io::Result<W> {
    match writeln!(file, "{}", std::process::id()) {
        Ok(()) => Ok(file),
        Err(e) => {
            drop(file);
            if let Err(cleanup) = fs::remove_file(marker) {
                tracing::warn!(marker = %marker.display(), error = %cleanup, "marker_cleanup_failed");
            }
            Err(e)
        }
    }
}
