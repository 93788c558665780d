//! A fixed-size, backup-count rotating file writer.
//!
//! `tracing-appender`'s rolling writer only rotates on a time boundary
//! (minutely/hourly/daily); nothing in this workspace's dependency
//! stack rotates on size. This mirrors the logging module's rotation
//! policy in the original implementation, which kept the log file under
//! a fixed byte cap with a bounded number of numbered backups
//! (`mover.log`, `mover.log.1`, `mover.log.2`, ...), by shifting backups
//! on overflow and truncating the oldest one away.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Result, TelemetryError};

/// Default cap before the active log file is rotated: 5 MiB.
pub const DEFAULT_MAX_BYTES: u64 = 5 * 1024 * 1024;

/// Default number of rotated backups retained alongside the active file.
pub const DEFAULT_MAX_BACKUPS: usize = 3;

/// A `Write` implementor that rotates its backing file once it exceeds
/// `max_bytes`, keeping at most `max_backups` prior generations.
pub struct RotatingFileWriter {
    state: Mutex<State>,
}

struct State {
    path: PathBuf,
    max_bytes: u64,
    max_backups: usize,
    file: File,
    written: u64,
}

impl RotatingFileWriter {
    /// Open (creating if necessary) a rotating writer backed by `path`.
    ///
    /// # Errors
    /// Returns [`TelemetryError::LogDirCreate`] if the parent directory
    /// cannot be created, or [`TelemetryError::LogFileOpen`] if the log
    /// file itself cannot be opened for appending.
    pub fn open(path: impl Into<PathBuf>, max_bytes: u64, max_backups: usize) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| TelemetryError::LogDirCreate {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let file = open_append(&path)?;
        let written = file
            .metadata()
            .map_err(|source| TelemetryError::LogFileOpen {
                path: path.clone(),
                source,
            })?
            .len();

        Ok(Self {
            state: Mutex::new(State {
                path,
                max_bytes,
                max_backups,
                file,
                written,
            }),
        })
    }
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| TelemetryError::LogFileOpen {
            path: path.to_path_buf(),
            source,
        })
}

impl State {
    fn rotate(&mut self) -> io::Result<()> {
        if self.max_backups > 0 {
            let oldest = backup_path(&self.path, self.max_backups);
            if oldest.exists() {
                fs::remove_file(&oldest)?;
            }
            for generation in (1..self.max_backups).rev() {
                let from = backup_path(&self.path, generation);
                let to = backup_path(&self.path, generation + 1);
                if from.exists() {
                    fs::rename(&from, &to)?;
                }
            }
            fs::rename(&self.path, backup_path(&self.path, 1))?;
        } else {
            fs::remove_file(&self.path)?;
        }

        self.file = open_append(&self.path)
            .map_err(|err| io::Error::other(err.to_string()))?;
        self.written = 0;
        Ok(())
    }
}

fn backup_path(path: &Path, generation: usize) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{generation}"));
    PathBuf::from(name)
}

impl Write for &RotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if state.written >= state.max_bytes && !buf.is_empty() {
            state.rotate()?;
        }

        let n = state.file.write(buf)?;
        state.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .file
            .flush()
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for RotatingFileWriter {
    type Writer = &'a Self;

    fn make_writer(&'a self) -> Self::Writer {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn rotates_once_max_bytes_is_exceeded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("mover.log");
        let writer = RotatingFileWriter::open(&path, 10, 2).expect("open");

        (&writer).write_all(b"0123456789").expect("first write");
        (&writer).write_all(b"more").expect("second write triggers rotation");
        (&writer).flush().expect("flush");

        let backup = backup_path(&path, 1);
        assert!(backup.exists(), "expected a rotated backup to exist");

        let mut contents = String::new();
        File::open(&path)
            .expect("active log")
            .read_to_string(&mut contents)
            .expect("read");
        assert_eq!(contents, "more");
    }

    #[test]
    fn keeps_at_most_max_backups_generations() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("mover.log");
        let writer = RotatingFileWriter::open(&path, 1, 1).expect("open");

        for _ in 0..5 {
            (&writer).write_all(b"x").expect("write");
        }
        (&writer).flush().expect("flush");

        assert!(backup_path(&path, 1).exists());
        assert!(!backup_path(&path, 2).exists());
    }
}
