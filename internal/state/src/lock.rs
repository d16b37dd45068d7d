use std::{
    ffi::OsString,
    fs::{File, OpenOptions},
    io,
    path::{Path, PathBuf},
};

use fs2::FileExt;

/// Exclusive advisory lock guarding a state file. The lock lives on a
/// sibling `.lock` file, since the state file itself is replaced on every
/// persist.
#[derive(Debug)]
pub(crate) struct StateLock {
    file: File,
    path: PathBuf,
}

impl StateLock {
    /// Blocks until no other process holds the lock for the state file.
    pub(crate) fn acquire(state: &Path) -> io::Result<Self> {
        let path = lock_path(state);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                log::info!("waiting for lock on {}", path.display());
                file.lock_exclusive()?;
            }
            Err(e) => return Err(e),
        }

        log::trace!("locked {}", path.display());
        Ok(Self { file, path })
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            log::warn!("cannot unlock {}: {}", self.path.display(), e);
        }
    }
}

fn lock_path(state: &Path) -> PathBuf {
    let mut name = OsString::from(state.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}
