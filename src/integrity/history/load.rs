use std::fmt;
use std::fs::File;
use std::io::ErrorKind;

use csv::ByteRecord;
use tracing::{debug, warn};

use crate::fs_util;
use crate::integrity::entry::{IntegrityEntry, NEVER_CHECKED};
use crate::integrity::timestamp;

use super::{Column, ColumnLayout, HistoryError, HistoryFile};

impl HistoryFile {
    /// Read every entry from disk.
    ///
    /// A missing (or empty) file yields an empty history. Rows that fail to
    /// parse are skipped with a warning; the file as a whole only fails on I/O
    /// errors or a header lacking a required column.
    pub fn load(&mut self) -> Result<Vec<IntegrityEntry>, HistoryError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No history file yet");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(HistoryError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.separator)
            .flexible(true)
            .from_reader(file);
        let headers = reader
            .byte_headers()
            .map_err(|source| self.csv_error(source))?
            .clone();
        if headers.iter().all(|field| field.trim_ascii().is_empty()) {
            return Ok(Vec::new());
        }
        let indices = ColumnIndices::from_headers(&headers).map_err(|column| {
            HistoryError::MissingColumn {
                path: self.path.clone(),
                column: column.header(),
            }
        })?;
        self.layout = indices.layout();

        let mut entries = Vec::new();
        let mut skipped = 0usize;
        for result in reader.byte_records() {
            let record = match result {
                Ok(record) => record,
                Err(err) if err.is_io_error() => return Err(self.csv_error(err)),
                Err(err) => {
                    warn!(
                        path = %self.path.display(),
                        error = %err,
                        "Skipping unreadable history row"
                    );
                    skipped += 1;
                    continue;
                }
            };
            match indices.parse_row(&record) {
                Ok(entry) => entries.push(entry),
                Err(err) => {
                    let line = record.position().map(|pos| pos.line()).unwrap_or_default();
                    warn!(
                        path = %self.path.display(),
                        line,
                        error = %err,
                        "Skipping malformed history row"
                    );
                    skipped += 1;
                }
            }
        }
        debug!(
            path = %self.path.display(),
            loaded = entries.len(),
            skipped,
            "History loaded"
        );
        Ok(entries)
    }

    fn csv_error(&self, source: csv::Error) -> HistoryError {
        HistoryError::Csv {
            path: self.path.clone(),
            source,
        }
    }
}

/// Position of each known column within a record.
struct ColumnIndices {
    file: usize,
    size: usize,
    mod_time: usize,
    last_check: usize,
    layout: ColumnLayout,
}

impl ColumnIndices {
    fn from_headers(headers: &ByteRecord) -> Result<Self, Column> {
        let mut found: Vec<(usize, Column)> = Vec::with_capacity(Column::ALL.len());
        for (idx, name) in headers.iter().enumerate() {
            if let Ok(name) = std::str::from_utf8(name)
                && let Some(column) = Column::from_header(name.trim())
                && !found.iter().any(|(_, seen)| *seen == column)
            {
                found.push((idx, column));
            }
        }
        let index_of = |column: Column| {
            found
                .iter()
                .find(|(_, candidate)| *candidate == column)
                .map(|(idx, _)| *idx)
                .ok_or(column)
        };
        let indices = Self {
            file: index_of(Column::File)?,
            size: index_of(Column::Size)?,
            mod_time: index_of(Column::ModTime)?,
            last_check: index_of(Column::LastCheck)?,
            layout: ColumnLayout {
                order: [found[0].1, found[1].1, found[2].1, found[3].1],
            },
        };
        if found.len() < headers.len() {
            warn!(
                columns = headers.len(),
                "History header has unknown columns; they will not be written back"
            );
        }
        Ok(indices)
    }

    fn layout(&self) -> ColumnLayout {
        self.layout
    }

    fn index_of(&self, column: Column) -> usize {
        match column {
            Column::File => self.file,
            Column::Size => self.size,
            Column::ModTime => self.mod_time,
            Column::LastCheck => self.last_check,
        }
    }

    fn field<'r>(&self, record: &'r ByteRecord, column: Column) -> Result<&'r [u8], RowError> {
        record
            .get(self.index_of(column))
            .ok_or(RowError::Missing(column))
    }

    fn text_field<'r>(&self, record: &'r ByteRecord, column: Column) -> Result<&'r str, RowError> {
        let bytes = self.field(record, column)?;
        std::str::from_utf8(bytes).map_err(|_| RowError::Invalid {
            column,
            value: String::from_utf8_lossy(bytes).into_owned(),
        })
    }

    /// Only the path column may hold bytes that are not UTF-8.
    fn parse_row(&self, record: &ByteRecord) -> Result<IntegrityEntry, RowError> {
        let path = self.field(record, Column::File)?;
        if path.is_empty() {
            return Err(RowError::Invalid {
                column: Column::File,
                value: String::new(),
            });
        }
        let size_text = self.text_field(record, Column::Size)?;
        let size = size_text.trim().parse::<u64>().map_err(|_| RowError::Invalid {
            column: Column::Size,
            value: size_text.to_string(),
        })?;
        let modified_text = self.text_field(record, Column::ModTime)?;
        let modified_at = timestamp::decode(modified_text).map_err(|_| RowError::Invalid {
            column: Column::ModTime,
            value: modified_text.to_string(),
        })?;
        let checked_text = self.text_field(record, Column::LastCheck)?;
        let checked_at = timestamp::decode(checked_text).map_err(|_| RowError::Invalid {
            column: Column::LastCheck,
            value: checked_text.to_string(),
        })?;
        Ok(IntegrityEntry {
            path: fs_util::path_from_bytes(path),
            size,
            modified_at,
            last_checked_at: (checked_at > NEVER_CHECKED).then_some(checked_at),
        })
    }
}

#[derive(Debug)]
enum RowError {
    Missing(Column),
    Invalid { column: Column, value: String },
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowError::Missing(column) => write!(f, "missing '{}' field", column.header()),
            RowError::Invalid { column, value } => {
                write!(f, "invalid '{}' value '{value}'", column.header())
            }
        }
    }
}
