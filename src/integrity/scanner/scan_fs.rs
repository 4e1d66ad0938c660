use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use time::OffsetDateTime;
use tracing::warn;

use crate::integrity::entry::IntegrityEntry;

use super::ScanError;

pub(super) fn ensure_root_dir(root: &Path) -> Result<PathBuf, ScanError> {
    let root = std::path::absolute(root).map_err(|source| ScanError::Io {
        path: root.to_path_buf(),
        source,
    })?;
    if root.is_dir() {
        Ok(root)
    } else {
        Err(ScanError::InvalidRoot(root))
    }
}

pub(super) fn visit_dir(
    root: &Path,
    accept: &impl Fn(&Path) -> bool,
    visitor: &mut impl FnMut(&Path) -> Result<(), ScanError>,
) -> Result<(), ScanError> {
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = fs::read_dir(&dir).map_err(|source| ScanError::Io {
            path: dir.clone(),
            source,
        })?;
        for entry_result in entries {
            let entry = entry_result.map_err(|source| ScanError::Io {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|source| ScanError::Io {
                path: path.clone(),
                source,
            })?;
            if file_type.is_dir() {
                stack.push(path);
                continue;
            }
            // Linked directories are not followed; linked files are.
            let is_file = file_type.is_file() || (file_type.is_symlink() && path.is_file());
            if is_file && accept(&path) {
                visitor(&path)?;
            }
        }
    }
    Ok(())
}

/// Stat one file; `None` when it vanished after being listed.
pub(super) fn read_facts(path: &Path) -> Result<Option<IntegrityEntry>, ScanError> {
    let meta = match path.metadata() {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            warn!(path = %path.display(), "File vanished during scan");
            return Ok(None);
        }
        Err(source) => {
            return Err(ScanError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let modified = meta.modified().map_err(|source| ScanError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(IntegrityEntry::unchecked(
        path,
        meta.len(),
        OffsetDateTime::from(modified),
    )))
}
