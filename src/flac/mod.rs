//! Bit-exact verification through the reference FLAC command-line tools.
//!
//! The scheduling core only sees [`AudioVerifier`]; [`FlacTool`] is the
//! subprocess-backed implementation.

mod command;
mod output;

use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use thiserror::Error;

pub use command::FlacTool;
pub use output::{parse_md5, reencode_verified, test_passed};

/// Failure reported by a verification capability.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// The tool could not be started.
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },
    /// The tool exited unsuccessfully.
    #[error("{program} exited with {status} for {path}")]
    Exit {
        program: PathBuf,
        path: PathBuf,
        status: ExitStatus,
        output: String,
    },
    /// The tool produced no output at all.
    #[error("No output from verification of {path}")]
    EmptyOutput { path: PathBuf },
    /// The output did not carry the success marker.
    #[error("Verification failed for {path}")]
    Rejected { path: PathBuf, output: String },
    /// No checksum could be extracted from the output.
    #[error("Could not read a checksum for {path}")]
    UnparsedHash { path: PathBuf, output: String },
}

impl VerifyError {
    /// Raw tool output attached to the failure, if any.
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Exit { output, .. }
            | Self::Rejected { output, .. }
            | Self::UnparsedHash { output, .. } => Some(output),
            Self::Spawn { .. } | Self::EmptyOutput { .. } => None,
        }
    }
}

/// Capability interface over an external audio verification tool.
pub trait AudioVerifier {
    /// Decode the whole stream and compare against its embedded checksum.
    fn test(&self, path: &Path) -> Result<(), VerifyError>;

    /// Return the checksum stored in the file's metadata.
    fn hash(&self, path: &Path) -> Result<String, VerifyError>;

    /// Re-encode in place, verifying the result before replacing the file.
    fn reencode(&self, path: &Path) -> Result<(), VerifyError>;
}

impl<V: AudioVerifier + ?Sized> AudioVerifier for &V {
    fn test(&self, path: &Path) -> Result<(), VerifyError> {
        (**self).test(path)
    }

    fn hash(&self, path: &Path) -> Result<String, VerifyError> {
        (**self).hash(path)
    }

    fn reencode(&self, path: &Path) -> Result<(), VerifyError> {
        (**self).reencode(path)
    }
}
