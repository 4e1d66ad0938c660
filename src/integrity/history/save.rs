use std::borrow::Cow;

use tracing::debug;

use crate::fs_util;
use crate::integrity::entry::{IntegrityEntry, NEVER_CHECKED};
use crate::integrity::timestamp;

use super::{Column, HistoryError, HistoryFile};

impl HistoryFile {
    /// Replace the full contents of the history file with `entries`.
    ///
    /// The table is staged in a sibling temporary file and renamed over the
    /// target so readers never observe a partially written history.
    pub fn save(&self, entries: &[IntegrityEntry]) -> Result<(), HistoryError> {
        let data = self.encode(entries)?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| HistoryError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs_util::write_atomically(&self.path, &data).map_err(|source| HistoryError::Write {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), entries = entries.len(), "History saved");
        Ok(())
    }

    fn encode(&self, entries: &[IntegrityEntry]) -> Result<Vec<u8>, HistoryError> {
        let columns = self.layout().columns().to_owned();
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.separator)
            .from_writer(Vec::new());
        writer
            .write_record(columns.iter().map(|column| column.header()))
            .map_err(|source| self.encode_error(source))?;
        for entry in entries {
            let record = columns.iter().map(|column| render_field(entry, *column));
            writer
                .write_record(record)
                .map_err(|source| self.encode_error(source))?;
        }
        writer.into_inner().map_err(|err| HistoryError::Write {
            path: self.path.clone(),
            source: err.into_error(),
        })
    }

    fn encode_error(&self, source: csv::Error) -> HistoryError {
        HistoryError::Csv {
            path: self.path.clone(),
            source,
        }
    }
}

/// Paths are written as raw bytes so names that are not valid UTF-8 reload unchanged.
fn render_field(entry: &IntegrityEntry, column: Column) -> Cow<'_, [u8]> {
    let text = match column {
        Column::File => return fs_util::path_bytes(&entry.path),
        Column::Size => entry.size.to_string(),
        Column::ModTime => timestamp::encode(entry.modified_at),
        Column::LastCheck => timestamp::encode(entry.last_checked_at.unwrap_or(NEVER_CHECKED)),
    };
    Cow::Owned(text.into_bytes())
}
