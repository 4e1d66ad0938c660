//! Library behind the `flic` command-line tools.
/// Application directory resolution.
pub mod app_dirs;
/// Optional TOML settings.
pub mod config;
/// FLAC tool integration.
pub mod flac;
/// Atomic file replacement and lossless path bytes.
pub mod fs_util;
/// Collection scanning, history and scheduled verification.
pub mod integrity;
/// Tracing setup.
pub mod logging;
