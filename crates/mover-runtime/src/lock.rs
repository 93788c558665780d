//! Single-instance advisory locking via a pidfile.
//!
//! Replaces the original database-backed runtime store with a plain
//! `flock`-based pidfile: one process may hold the lock at a time, and
//! the lock is released automatically (by the kernel) when this
//! process's last descriptor to the file closes, including on crash.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::fcntl::{FlockArg, flock};
use tracing::instrument;

use crate::error::{RuntimeError, RuntimeResult};

/// Holds an advisory exclusive lock on a pidfile for its lifetime.
pub struct PidLock {
    path: PathBuf,
    file: File,
}

impl PidLock {
    /// Acquire an exclusive, non-blocking lock on `path`, creating it if
    /// necessary, and record this process's pid in it.
    ///
    /// # Errors
    /// Returns [`RuntimeError::LockHeld`] if another process already
    /// holds the lock, or [`RuntimeError::Lock`] for any other IO or
    /// `flock` failure.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn acquire(path: impl AsRef<Path>) -> RuntimeResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| RuntimeError::Lock {
                path: path.clone(),
                source,
            })?;

        match flock(file.as_fd(), FlockArg::LockExclusiveNonblock) {
            Ok(()) => {}
            Err(Errno::EWOULDBLOCK) => return Err(RuntimeError::LockHeld { path }),
            Err(errno) => {
                return Err(RuntimeError::Lock {
                    path,
                    source: std::io::Error::other(errno.to_string()),
                });
            }
        }

        file.set_len(0).map_err(|source| RuntimeError::Lock {
            path: path.clone(),
            source,
        })?;
        write!(file, "{}", std::process::id()).map_err(|source| RuntimeError::Lock {
            path: path.clone(),
            source,
        })?;

        Ok(Self { path, file })
    }

    /// Path of the pidfile this lock holds.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidLock {
    fn drop(&mut self) {
        let _ = flock(self.file.as_fd(), FlockArg::Unlock);
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_creates_pidfile_with_pid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("mover.pid");
        let lock = PidLock::acquire(&path).expect("lock");
        let contents = std::fs::read_to_string(lock.path()).expect("read pidfile");
        assert_eq!(contents, std::process::id().to_string());
    }

    #[test]
    fn second_acquire_fails_while_first_is_held() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("mover.pid");
        let _first = PidLock::acquire(&path).expect("first lock");
        let second = PidLock::acquire(&path);
        assert!(matches!(second, Err(RuntimeError::LockHeld { .. })));
    }

    #[test]
    fn lock_is_released_on_drop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("mover.pid");
        {
            let _lock = PidLock::acquire(&path).expect("first lock");
        }
        let reacquired = PidLock::acquire(&path);
        assert!(reacquired.is_ok());
    }
}
