//! Recursive discovery of audio files beneath a collection root.

mod scan_fs;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use super::entry::IntegrityEntry;

/// Extension matched when no other list is configured.
pub const DEFAULT_EXTENSION: &str = "flac";

/// Errors that can occur while scanning a collection folder.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The provided root path is not a directory.
    #[error("Collection root is not a directory: {0}")]
    InvalidRoot(PathBuf),
    /// Failed to read a file or directory.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
}

/// Summary of one walk.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanStats {
    pub total_files: usize,
    pub vanished: usize,
}

/// Walks a collection root and reports every matching audio file.
#[derive(Debug, Clone)]
pub struct CollectionScanner {
    root: PathBuf,
    extensions: Vec<String>,
}

impl CollectionScanner {
    /// Scanner matching `.flac` files only.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_extensions(root, [DEFAULT_EXTENSION])
    }

    /// Scanner matching any of `extensions` (without dots, case-insensitive).
    pub fn with_extensions<I, S>(root: impl Into<PathBuf>, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            root: root.into(),
            extensions: extensions
                .into_iter()
                .map(|ext| ext.into().trim_start_matches('.').to_string())
                .collect(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the root and return one never-checked entry per matching file.
    ///
    /// Any failure to list a directory aborts the scan. Files that disappear
    /// between listing and `stat` are skipped.
    pub fn scan(&self) -> Result<(Vec<IntegrityEntry>, ScanStats), ScanError> {
        let root = scan_fs::ensure_root_dir(&self.root)?;
        let mut entries = Vec::new();
        let mut stats = ScanStats::default();
        scan_fs::visit_dir(
            &root,
            &|path| self.matches(path),
            &mut |path| {
                match scan_fs::read_facts(path)? {
                    Some(entry) => {
                        entries.push(entry);
                        stats.total_files += 1;
                    }
                    None => stats.vanished += 1,
                }
                Ok(())
            },
        )?;
        info!(
            root = %root.display(),
            files = stats.total_files,
            vanished = stats.vanished,
            "Collection scanned"
        );
        Ok((entries, stats))
    }

    fn matches(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        self.extensions
            .iter()
            .any(|supported| ext.eq_ignore_ascii_case(supported))
    }
}
