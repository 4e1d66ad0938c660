use std::path::PathBuf;

use thiserror::Error;

use crate::flac::VerifyError;
use crate::integrity::history::HistoryError;

/// Errors that end a verification run early.
#[derive(Debug, Error)]
pub enum RunError {
    /// A selected file failed verification; progress up to it was saved.
    #[error("Verification failed for {path}: {source}")]
    Verification {
        /// File that failed.
        path: PathBuf,
        /// Tool failure details.
        source: VerifyError,
    },
    /// Progress could not be persisted.
    #[error(transparent)]
    History(#[from] HistoryError),
}
