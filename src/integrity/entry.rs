use std::path::{Path, PathBuf};

use time::{OffsetDateTime, macros::datetime};

/// Instant written to the history file for entries that were never verified.
///
/// Loading treats any last-check at or before this instant as "never checked".
pub const NEVER_CHECKED: OffsetDateTime = datetime!(1900-01-01 0:00 UTC);

/// One tracked audio file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityEntry {
    /// Absolute path of the file; unique within a reconciled set.
    pub path: PathBuf,
    /// Byte length at the last observation.
    pub size: u64,
    /// Filesystem modification time at the last observation.
    pub modified_at: OffsetDateTime,
    /// Time of the last successful verification, `None` if never verified.
    pub last_checked_at: Option<OffsetDateTime>,
}

impl IntegrityEntry {
    /// Build an entry that carries no verification history.
    pub fn unchecked(path: impl Into<PathBuf>, size: u64, modified_at: OffsetDateTime) -> Self {
        Self {
            path: path.into(),
            size,
            modified_at,
            last_checked_at: None,
        }
    }

    /// Borrow the entry path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True once the entry has at least one successful verification.
    pub fn is_checked(&self) -> bool {
        self.last_checked_at.is_some()
    }

    /// Record a successful verification at `at`.
    pub fn mark_checked(&mut self, at: OffsetDateTime) {
        self.last_checked_at = Some(at);
    }
}

/// Order entries oldest check first; never-checked entries lead.
///
/// Ties are broken by path so the order is deterministic.
pub fn sort_by_last_check(entries: &mut [IntegrityEntry]) {
    entries.sort_by(|a, b| {
        a.last_checked_at
            .cmp(&b.last_checked_at)
            .then_with(|| a.path.cmp(&b.path))
    });
}

/// Order entries by path, used for full passes over the collection.
pub fn sort_by_path(entries: &mut [IntegrityEntry]) {
    entries.sort_by(|a, b| a.path.cmp(&b.path));
}
