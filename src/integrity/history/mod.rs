//! Durable per-file verification history stored as a delimited text table.
//!
//! The file has one header row naming the four columns (`File`, `Size`,
//! `Mod-Time`, `Last-Check`) in any order, followed by one row per entry.
//! Timestamp columns use the fixed-point codec from [`super::timestamp`].

mod load;
mod save;

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Default field separator of the history table.
pub const DEFAULT_SEPARATOR: u8 = b';';

/// Errors raised while reading or writing the history file.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// The history file exists but could not be opened or read.
    #[error("Failed to read history {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The history file could not be written or replaced.
    #[error("Failed to write history {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The table itself could not be decoded or encoded.
    #[error("Malformed history table {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },
    /// The header row lacks one of the required columns.
    #[error("History {path} has no '{column}' column")]
    MissingColumn { path: PathBuf, column: &'static str },
}

/// Columns persisted for every entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Column {
    File,
    Size,
    ModTime,
    LastCheck,
}

impl Column {
    pub(crate) const ALL: [Column; 4] = [
        Column::File,
        Column::Size,
        Column::ModTime,
        Column::LastCheck,
    ];

    pub(crate) fn header(self) -> &'static str {
        match self {
            Column::File => "File",
            Column::Size => "Size",
            Column::ModTime => "Mod-Time",
            Column::LastCheck => "Last-Check",
        }
    }

    fn from_header(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|column| column.header() == name)
    }
}

/// Order in which the columns appear in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ColumnLayout {
    order: [Column; 4],
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self { order: Column::ALL }
    }
}

impl ColumnLayout {
    pub(crate) fn columns(&self) -> &[Column; 4] {
        &self.order
    }
}

/// Handle on one history file.
///
/// Loading remembers the header order so a later save writes the columns back
/// exactly as they were found.
#[derive(Debug, Clone)]
pub struct HistoryFile {
    path: PathBuf,
    separator: u8,
    layout: ColumnLayout,
}

impl HistoryFile {
    /// Create a handle using the default `;` separator.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_separator(path, DEFAULT_SEPARATOR)
    }

    /// Create a handle with a custom single-byte separator.
    pub fn with_separator(path: impl Into<PathBuf>, separator: u8) -> Self {
        Self {
            path: path.into(),
            separator,
            layout: ColumnLayout::default(),
        }
    }

    /// Location of the history file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Field separator used for reading and writing.
    pub fn separator(&self) -> u8 {
        self.separator
    }

    pub(crate) fn layout(&self) -> ColumnLayout {
        self.layout
    }
}
