//! Tracing setup for the command-line tools.
//!
//! Every launch gets its own timestamped log file in the application logs
//! directory, mirrored on stdout. Old files beyond [`MAX_LOG_FILES`] are removed.

use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
    sync::Mutex,
    time::SystemTime,
};

use time::{OffsetDateTime, UtcOffset, format_description::FormatItem, macros::format_description};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*};

use crate::app_dirs;

/// Maximum number of log files kept in the logs directory.
pub const MAX_LOG_FILES: usize = 10;
const LOG_FILE_PREFIX: &str = "flic";
const LOG_EXTENSION: &str = "log";

static LOG_GUARD: Mutex<Option<WorkerGuard>> = Mutex::new(None);

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Could not resolve a directory for log files: {0}")]
    Directory(#[from] app_dirs::AppDirError),
    #[error("Failed to read log directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to remove old log file {path}: {source}")]
    RemoveFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to create log file at {path}: {source}")]
    CreateLogFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to format log filename time: {0}")]
    FormatTime(#[from] time::error::Format),
    #[error("Failed to install global tracing subscriber: {0}")]
    SetGlobal(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Install the global subscriber and return the path of this launch's log file.
///
/// `tool` names the binary in the file name (`flic`, `flic-hash`, ...).
/// Returns `Ok(None)` when logging was already initialized.
pub fn init(tool: &str) -> Result<Option<PathBuf>, LoggingError> {
    let mut slot = LOG_GUARD
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if slot.is_some() {
        return Ok(None);
    }
    let log_dir = app_dirs::logs_dir()?;
    let log_path = prepare_log_file(&log_dir, tool, now_local_or_utc())?;
    let Some(file_name) = log_path.file_name() else {
        return Ok(None);
    };

    // The offset lookup fails on unix once the writer thread exists.
    let timer = build_timer();
    let (file_writer, guard) = tracing_appender::non_blocking(rolling::never(&log_dir, file_name));
    let subscriber = Registry::default()
        .with(build_env_filter())
        .with(
            fmt::layer()
                .with_timer(timer.clone())
                .with_writer(std::io::stdout),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_timer(timer)
                .with_writer(file_writer),
        );
    tracing::subscriber::set_global_default(subscriber)?;
    *slot = Some(guard);

    tracing::debug!(path = %log_path.display(), "Logging initialized");
    Ok(Some(log_path))
}

/// Flush buffered file output. Call before `std::process::exit`.
pub fn shutdown() {
    let guard = LOG_GUARD
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .take();
    drop(guard);
}

/// Create the log file for this launch and prune older ones.
fn prepare_log_file(
    log_dir: &Path,
    tool: &str,
    now: OffsetDateTime,
) -> Result<PathBuf, LoggingError> {
    let log_path = log_dir.join(format_log_file_name(tool, now)?);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|source| LoggingError::CreateLogFile {
            path: log_path.clone(),
            source,
        })?;
    prune_old_logs(log_dir, MAX_LOG_FILES)?;
    Ok(log_path)
}

fn prune_old_logs(dir: &Path, max_files: usize) -> Result<(), LoggingError> {
    let mut logs = fs::read_dir(dir)
        .map_err(|source| LoggingError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_file()))
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some(LOG_EXTENSION))
        .map(|path| {
            let modified = fs::metadata(&path)
                .and_then(|meta| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, path)
        })
        .collect::<Vec<_>>();

    if logs.len() <= max_files {
        return Ok(());
    }
    logs.sort();
    let excess = logs.len() - max_files;
    for (_, path) in logs.into_iter().take(excess) {
        fs::remove_file(&path).map_err(|source| LoggingError::RemoveFile { path, source })?;
    }
    Ok(())
}

fn format_log_file_name(tool: &str, now: OffsetDateTime) -> Result<String, LoggingError> {
    const NAME_FORMAT: &[FormatItem<'_>] =
        format_description!("[year]-[month]-[day]_[hour]-[minute]-[second]");
    let stamp = now.format(NAME_FORMAT)?;
    let tool = if tool.is_empty() { LOG_FILE_PREFIX } else { tool };
    Ok(format!("{tool}_{stamp}.{LOG_EXTENSION}"))
}

fn build_timer() -> fmt::time::OffsetTime<time::format_description::BorrowedFormatItem<'static>> {
    const DISPLAY_FORMAT: &[FormatItem<'static>] =
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    fmt::time::OffsetTime::new(offset, DISPLAY_FORMAT.into())
}

fn now_local_or_utc() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{thread, time::Duration};
    use tempfile::tempdir;
    use time::macros::datetime;

    fn log_count(dir: &Path) -> usize {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == LOG_EXTENSION))
            .count()
    }

    #[test]
    fn log_filename_carries_tool_and_timestamp() {
        let at = datetime!(2023-11-14 22:13:20 UTC);
        assert_eq!(
            format_log_file_name("flic", at).unwrap(),
            "flic_2023-11-14_22-13-20.log"
        );
        assert_eq!(
            format_log_file_name("", at).unwrap(),
            "flic_2023-11-14_22-13-20.log"
        );
        assert_eq!(
            format_log_file_name("flic-hash", at).unwrap(),
            "flic-hash_2023-11-14_22-13-20.log"
        );
    }

    #[test]
    fn prune_keeps_newest_files_and_ignores_others() {
        let dir = tempdir().unwrap();
        for idx in 0..12 {
            fs::write(dir.path().join(format!("flic_{idx:02}.log")), b"").unwrap();
            thread::sleep(Duration::from_millis(10));
        }
        fs::write(dir.path().join("report.csv"), b"").unwrap();

        prune_old_logs(dir.path(), 10).unwrap();
        assert_eq!(log_count(dir.path()), 10);
        assert!(!dir.path().join("flic_00.log").exists());
        assert!(!dir.path().join("flic_01.log").exists());
        assert!(dir.path().join("flic_11.log").exists());
        assert!(dir.path().join("report.csv").exists());
    }

    #[test]
    fn prepare_creates_the_launch_file() {
        let dir = tempdir().unwrap();
        let path = prepare_log_file(dir.path(), "flic", datetime!(2024-02-03 04:05:06 UTC))
            .unwrap();
        assert_eq!(path, dir.path().join("flic_2024-02-03_04-05-06.log"));
        assert!(path.is_file());
    }
}
