use super::LOG_TARGET;
use crate::error::{Error, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;

const LOCK_FILE_NAME: &str = ".lock";

/// Guard that releases the collection lock when dropped
#[derive(Debug)]
pub(super) struct CollectionLock(File);

impl Drop for CollectionLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.0) {
            log::warn!(target: LOG_TARGET, "Could not unlock collection: {e:#}");
        }
    }
}

impl CollectionLock {
    /// Block until an exclusive advisory lock on the collection directory is held.
    pub(super) fn acquire(collection_dir: &Path, collection: &str) -> Result<Self> {
        let lock_path = collection_dir.join(LOCK_FILE_NAME);

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| Error::persistence("lock", collection, format!("could not open lock file '{}': {e}", lock_path.display())))?;

        file.lock_exclusive()
            .map_err(|e| Error::persistence("lock", collection, format!("could not lock '{}': {e}", lock_path.display())))?;

        log::trace!(target: LOG_TARGET, "Acquired lock on '{}'", lock_path.display());
        Ok(Self(file))
    }

    pub(super) fn is_lock_file(name: &str) -> bool {
        name == LOCK_FILE_NAME
    }
}
