//! Exclusive per-document writer lock.

use fs2::FileExt;
use pecha_core::PechaError;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// Lock file name inside a document's layer directory.
pub const WRITER_LOCK_FILE_NAME: &str = ".writer.lock";

/// Process-lifetime writer lock guard.
///
/// Keeping this value alive holds an exclusive OS lock on
/// `<layers>/<document>/.writer.lock`.
pub struct WriterLock {
    file: File,
    lock_path: PathBuf,
}

impl WriterLock {
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        if let Err(err) = self.file.unlock() {
            tracing::warn!(
                "Failed to release writer lock {:?} during drop: {}",
                self.lock_path,
                err
            );
        }
    }
}

/// Return the writer lock path for a document's layer directory.
pub fn writer_lock_path(document_dir: &Path) -> PathBuf {
    document_dir.join(WRITER_LOCK_FILE_NAME)
}

/// Acquire an exclusive writer lock on a document's layer directory.
///
/// # Returns
/// [`WriterLock`] that keeps the lock held until dropped.
///
/// # Errors
/// Returns [`PechaError::Locked`] when another process holds the lock and
/// [`PechaError::Io`] when the lock file cannot be opened.
pub fn acquire_writer_lock(document_dir: &Path) -> Result<WriterLock, PechaError> {
    fs::create_dir_all(document_dir).map_err(|source| PechaError::Io {
        path: document_dir.to_path_buf(),
        source,
    })?;
    let lock_path = writer_lock_path(document_dir);
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|source| PechaError::Io {
            path: lock_path.clone(),
            source,
        })?;

    match file.try_lock_exclusive() {
        Ok(()) => Ok(WriterLock { file, lock_path }),
        Err(err)
            if matches!(
                err.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::PermissionDenied
            ) =>
        {
            Err(PechaError::Locked(format!(
                "layers in '{}' are already being written by another pecha process",
                document_dir.display()
            )))
        }
        Err(source) => Err(PechaError::Io {
            path: lock_path,
            source,
        }),
    }
}
