//! Append-only delete log with two file-handle policies.
//!
//! Both policies open the file in append mode for every handle they acquire,
//! so writes land at the current end of file even when the log was rotated
//! or truncated by another process in between.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, SplitError};

/// Destination for delete-log entries.
pub trait LogSink: Send {
    /// Append one entry as a newline-terminated line and flush it.
    fn append(&mut self, entry: &str) -> Result<()>;

    /// Release the file handle. Appending after close is an error for
    /// handles that were released.
    fn close(&mut self) -> Result<()>;

    /// Path of the log file.
    fn path(&self) -> &Path;
}

/// Open the log sink selected by configuration.
///
/// `close_after_write` selects [`ReopenLog`]; otherwise a [`PersistentLog`]
/// is opened immediately.
pub fn open_log(path: &Path, close_after_write: bool) -> Result<Box<dyn LogSink>> {
    if close_after_write {
        Ok(Box::new(ReopenLog::new(path)))
    } else {
        Ok(Box::new(PersistentLog::open(path)?))
    }
}

fn open_append(path: &Path) -> Result<BufWriter<File>> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(BufWriter::new)
        .map_err(|source| SplitError::DeleteLog {
            path: path.to_path_buf(),
            source,
        })
}

fn write_line(writer: &mut BufWriter<File>, path: &Path, entry: &str) -> Result<()> {
    let wrap = |source: io::Error| SplitError::DeleteLog {
        path: path.to_path_buf(),
        source,
    };

    if entry.contains(['\n', '\r']) {
        return Err(wrap(io::Error::new(
            io::ErrorKind::InvalidInput,
            "log entry contains a line break",
        )));
    }

    writer.write_all(entry.as_bytes()).map_err(wrap)?;
    writer.write_all(b"\n").map_err(wrap)?;
    writer.flush().map_err(wrap)
}

/// Holds one handle from open until close, flushing after every write.
#[derive(Debug)]
pub struct PersistentLog {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl PersistentLog {
    /// Open (creating if needed) the log for appending.
    pub fn open(path: &Path) -> Result<Self> {
        let writer = open_append(path)?;
        tracing::debug!(path = %path.display(), "Opened delete log");
        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(writer),
        })
    }
}

impl LogSink for PersistentLog {
    fn append(&mut self, entry: &str) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(SplitError::DeleteLog {
                path: self.path.clone(),
                source: io::Error::new(io::ErrorKind::BrokenPipe, "delete log is closed"),
            });
        };
        write_line(writer, &self.path, entry)
    }

    fn close(&mut self) -> Result<()> {
        // Taking the writer releases the handle even when the flush fails.
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|source| SplitError::DeleteLog {
                path: self.path.clone(),
                source,
            })?;
            tracing::debug!(path = %self.path.display(), "Closed delete log");
        }
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PersistentLog {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "Failed to close delete log");
        }
    }
}

/// Opens, writes, flushes and closes the file for every entry, so no handle
/// is held between writes.
///
/// Intended for platforms where an open handle blocks other processes from
/// modifying the file.
#[derive(Debug)]
pub struct ReopenLog {
    path: PathBuf,
}

impl ReopenLog {
    /// Create a log that acquires a handle per write.
    #[must_use]
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl LogSink for ReopenLog {
    fn append(&mut self, entry: &str) -> Result<()> {
        let mut writer = open_append(&self.path)?;
        write_line(&mut writer, &self.path, entry)
        // `writer` is dropped here, closing the handle on every path.
    }

    fn close(&mut self) -> Result<()> {
        // Final open/close cycle.
        let mut writer = open_append(&self.path)?;
        writer.flush().map_err(|source| SplitError::DeleteLog {
            path: self.path.clone(),
            source,
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}
