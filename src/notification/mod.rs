//! Notification Log
//!
//! Thread-safe, append-only log of free-text messages received from the
//! update engine during one update session.
//!
//! - Appends come from the monitor thread
//! - The display thread only ever sees a deep copy ([`NotificationSnapshot`])
//! - Logs can be exported to removable media for bug reports

mod export;

pub use export::{export_log, ExportError, ExportResult, EXPORT_FILE_PREFIX, EXPORT_FILE_SUFFIX};

use parking_lot::Mutex;

use crate::core::utils::truncate_to_boundary;

/// Maximum number of bytes stored per entry
pub const NOTIFICATION_CAPACITY: usize = 2048;

/// One message received from the update engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEntry {
    text: String,
}

impl NotificationEntry {
    /// Create an entry, truncating the text to [`NOTIFICATION_CAPACITY`] bytes
    pub fn new(text: &str) -> Self {
        Self {
            text: truncate_to_boundary(text, NOTIFICATION_CAPACITY).to_string(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Length of the stored text in bytes
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Immutable copy of the log taken at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationSnapshot {
    entries: Vec<NotificationEntry>,
}

impl NotificationSnapshot {
    pub fn iter(&self) -> std::slice::Iter<'_, NotificationEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total stored bytes over all entries
    pub fn total_bytes(&self) -> usize {
        self.entries.iter().map(NotificationEntry::len).sum()
    }

    /// Entry texts in append order
    pub fn texts(&self) -> Vec<&str> {
        self.entries.iter().map(NotificationEntry::text).collect()
    }
}

impl IntoIterator for NotificationSnapshot {
    type Item = NotificationEntry;
    type IntoIter = std::vec::IntoIter<NotificationEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a NotificationSnapshot {
    type Item = &'a NotificationEntry;
    type IntoIter = std::slice::Iter<'a, NotificationEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Append-only notification log guarded by a single mutex
#[derive(Debug, Default)]
pub struct NotificationLog {
    entries: Mutex<Vec<NotificationEntry>>,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one message as a new entry
    pub fn append(&self, text: &str) {
        let entry = NotificationEntry::new(text);
        self.entries.lock().push(entry);
    }

    /// Deep copy of all current entries
    ///
    /// The lock is held only while copying; the returned snapshot is
    /// unaffected by later appends or clears.
    pub fn snapshot(&self) -> NotificationSnapshot {
        let entries = self.entries.lock().clone();
        NotificationSnapshot { entries }
    }

    /// Discard all entries and start a new, empty log
    pub fn clear(&self) {
        let discarded = std::mem::take(&mut *self.entries.lock());
        tracing::debug!("Cleared notification log ({} entries)", discarded.len());
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
