//! Notification log export
//!
//! Writes the current notification log to a uniquely named file on the
//! configured media path so it can be attached to bug reports.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::{NotificationLog, NotificationSnapshot};
use crate::core::utils::short_unique_id;

/// Export file names look like `swupdate.<id>.log`
pub const EXPORT_FILE_PREFIX: &str = "swupdate.";
pub const EXPORT_FILE_SUFFIX: &str = ".log";

/// Number of attempts at finding an unused file name
const MAX_NAME_ATTEMPTS: usize = 8;

/// Errors that can occur while exporting the log
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Export directory does not exist: {0}")]
    MissingDirectory(PathBuf),

    #[error("Failed to create a unique export file in {dir}: {source}")]
    CreateFailed {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write notification log to {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result of a successful export
#[derive(Debug, Clone)]
pub struct ExportResult {
    /// Path to the exported file
    pub output_path: PathBuf,

    /// Number of entries written
    pub entries_exported: usize,

    /// Size of the exported file in bytes
    pub total_size: u64,

    /// Export timestamp
    pub exported_at: DateTime<Utc>,
}

/// Export a snapshot of `log` into a new file inside `dir`
pub fn export_log(log: &NotificationLog, dir: &Path) -> Result<ExportResult, ExportError> {
    if !dir.is_dir() {
        return Err(ExportError::MissingDirectory(dir.to_path_buf()));
    }

    let snapshot = log.snapshot();
    let (output_path, file) = create_export_file(dir)?;
    tracing::info!("Exporting notification log to {}", output_path.display());

    let total_size = match write_entries(file, &snapshot) {
        Ok(size) => size,
        Err(source) => {
            tracing::error!("Failed to write notification log: {}", source);
            let _ = fs::remove_file(&output_path);
            return Err(ExportError::WriteFailed {
                path: output_path,
                source,
            });
        }
    };

    Ok(ExportResult {
        output_path,
        entries_exported: snapshot.len(),
        total_size,
        exported_at: Utc::now(),
    })
}

/// Create a file with a unique name; existing files are never overwritten
fn create_export_file(dir: &Path) -> Result<(PathBuf, File), ExportError> {
    let mut last_error = io::Error::from(io::ErrorKind::AlreadyExists);

    for _ in 0..MAX_NAME_ATTEMPTS {
        let name = format!("{}{}{}", EXPORT_FILE_PREFIX, short_unique_id(), EXPORT_FILE_SUFFIX);
        let path = dir.join(name);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => last_error = e,
            Err(e) => {
                last_error = e;
                break;
            }
        }
    }

    Err(ExportError::CreateFailed {
        dir: dir.to_path_buf(),
        source: last_error,
    })
}

fn write_entries(file: File, snapshot: &NotificationSnapshot) -> io::Result<u64> {
    let mut writer = BufWriter::new(file);
    for entry in snapshot {
        writer.write_all(entry.text().as_bytes())?;
        writer.write_all(b"\n")?;
    }

    let file = writer.into_inner().map_err(|e| e.into_error())?;
    // media is usually removed right after the export
    file.sync_all()?;
    Ok(file.metadata()?.len())
}
