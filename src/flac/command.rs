use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::{debug, warn};

use super::output::{parse_md5, reencode_verified, test_passed};
use super::{AudioVerifier, VerifyError};

/// Runs `flac` and `metaflac` as blocking subprocesses.
///
/// No timeout is applied; a hung tool hangs the caller.
#[derive(Debug, Clone)]
pub struct FlacTool {
    flac_path: PathBuf,
    metaflac_path: PathBuf,
}

impl FlacTool {
    /// Use `flac_path`, looking for `metaflac` in the same directory.
    pub fn new(flac_path: impl Into<PathBuf>) -> Self {
        let flac_path = flac_path.into();
        let metaflac_path = sibling_metaflac(&flac_path);
        Self {
            flac_path,
            metaflac_path,
        }
    }

    /// Override the `metaflac` executable.
    pub fn with_metaflac(mut self, metaflac_path: impl Into<PathBuf>) -> Self {
        self.metaflac_path = metaflac_path.into();
        self
    }

    pub fn flac_path(&self) -> &Path {
        &self.flac_path
    }

    pub fn metaflac_path(&self) -> &Path {
        &self.metaflac_path
    }

    fn run(&self, program: &Path, args: &[&str], path: &Path) -> Result<Output, VerifyError> {
        debug!(program = %program.display(), file = %path.display(), ?args, "Running tool");
        let output = Command::new(program)
            .args(args)
            .arg(path)
            .output()
            .map_err(|source| VerifyError::Spawn {
                program: program.to_path_buf(),
                source,
            })?;
        if !output.status.success() {
            let combined = combined_output(&output);
            warn!(
                program = %program.display(),
                file = %path.display(),
                status = %output.status,
                "Tool exited unsuccessfully"
            );
            return Err(VerifyError::Exit {
                program: program.to_path_buf(),
                path: path.to_path_buf(),
                status: output.status,
                output: combined,
            });
        }
        Ok(output)
    }
}

impl AudioVerifier for FlacTool {
    fn test(&self, path: &Path) -> Result<(), VerifyError> {
        let output = self.run(&self.flac_path, &["--test"], path)?;
        let combined = combined_output(&output);
        if combined.trim().is_empty() {
            return Err(VerifyError::EmptyOutput {
                path: path.to_path_buf(),
            });
        }
        if !test_passed(&combined) {
            return Err(VerifyError::Rejected {
                path: path.to_path_buf(),
                output: combined,
            });
        }
        Ok(())
    }

    fn hash(&self, path: &Path) -> Result<String, VerifyError> {
        let output = self.run(&self.metaflac_path, &["--show-md5sum"], path)?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        parse_md5(&stdout).ok_or_else(|| VerifyError::UnparsedHash {
            path: path.to_path_buf(),
            output: stdout,
        })
    }

    fn reencode(&self, path: &Path) -> Result<(), VerifyError> {
        let output = self.run(
            &self.flac_path,
            &["--force", "--no-error-on-compression-fail", "--verify"],
            path,
        )?;
        let combined = combined_output(&output);
        if combined.trim().is_empty() {
            return Err(VerifyError::EmptyOutput {
                path: path.to_path_buf(),
            });
        }
        if !reencode_verified(&combined) {
            return Err(VerifyError::Rejected {
                path: path.to_path_buf(),
                output: combined,
            });
        }
        Ok(())
    }
}

/// `flac` reports status on stderr; both streams are inspected together.
fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text
}

fn sibling_metaflac(flac_path: &Path) -> PathBuf {
    let name = match flac_path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => format!("metaflac.{ext}"),
        None => "metaflac".to_string(),
    };
    flac_path.with_file_name(name)
}
