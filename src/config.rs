//! Optional `config.toml` settings.
//!
//! Keys (TOML): `flac_path`, `metaflac_path`, `autosave_interval_minutes`,
//! `modtime_tolerance_micros`, `extensions`, `separator`. Every key is
//! optional and command-line flags take precedence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::Duration;
use tracing::{debug, warn};

use crate::app_dirs;

const DEFAULT_AUTOSAVE_MINUTES: u32 = 3;
const DEFAULT_TOLERANCE_MICROS: u32 = 1_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not locate the settings file: {0}")]
    Directory(#[from] app_dirs::AppDirError),
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Separator {0:?} must be a single printable ASCII character other than '\"'")]
    InvalidSeparator(char),
}

/// Settings read from `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub flac_path: Option<PathBuf>,
    #[serde(default)]
    pub metaflac_path: Option<PathBuf>,
    #[serde(default = "default_autosave_minutes")]
    pub autosave_interval_minutes: u32,
    #[serde(default = "default_tolerance_micros")]
    pub modtime_tolerance_micros: u32,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default = "default_separator")]
    pub separator: char,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            flac_path: None,
            metaflac_path: None,
            autosave_interval_minutes: default_autosave_minutes(),
            modtime_tolerance_micros: default_tolerance_micros(),
            extensions: default_extensions(),
            separator: default_separator(),
        }
    }
}

impl Settings {
    pub fn autosave_interval(&self) -> Duration {
        Duration::minutes(i64::from(self.autosave_interval_minutes))
    }

    pub fn modtime_tolerance(&self) -> Duration {
        Duration::microseconds(i64::from(self.modtime_tolerance_micros))
    }

    /// The history separator as the single byte the CSV layer expects.
    pub fn separator_byte(&self) -> Result<u8, ConfigError> {
        let sep = self.separator;
        if sep.is_ascii() && sep != '"' && (sep.is_ascii_graphic() || sep == ' ' || sep == '\t') {
            Ok(sep as u8)
        } else {
            Err(ConfigError::InvalidSeparator(sep))
        }
    }

    fn normalized(mut self) -> Self {
        self.extensions.retain(|ext| !ext.trim().is_empty());
        if self.extensions.is_empty() {
            warn!("No usable extension configured, falling back to defaults");
            self.extensions = default_extensions();
        }
        self
    }
}

/// Load `explicit` when given, otherwise the file in the application directory.
///
/// Only the default location may be absent; an explicit path must exist.
pub fn load(explicit: Option<&Path>) -> Result<Settings, ConfigError> {
    match explicit {
        Some(path) => load_from_path(path),
        None => {
            let path = app_dirs::config_path()?;
            if path.exists() {
                load_from_path(&path)
            } else {
                debug!(path = %path.display(), "No settings file, using defaults");
                Ok(Settings::default())
            }
        }
    }
}

pub fn load_from_path(path: &Path) -> Result<Settings, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let settings: Settings = toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })?;
    settings.separator_byte()?;
    debug!(path = %path.display(), "Settings loaded");
    Ok(settings.normalized())
}

fn default_autosave_minutes() -> u32 {
    DEFAULT_AUTOSAVE_MINUTES
}

fn default_tolerance_micros() -> u32 {
    DEFAULT_TOLERANCE_MICROS
}

fn default_extensions() -> Vec<String> {
    vec![crate::integrity::scanner::DEFAULT_EXTENSION.to_string()]
}

fn default_separator() -> char {
    ';'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_dirs::test_support::OverrideGuard;
    use tempfile::tempdir;

    #[test]
    fn missing_default_file_yields_defaults() {
        let base = tempdir().unwrap();
        let _guard = OverrideGuard::set(base.path().to_path_buf());
        let settings = load(None).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.autosave_interval(), Duration::minutes(3));
        assert_eq!(settings.modtime_tolerance(), Duration::MILLISECOND);
        assert_eq!(settings.separator_byte().unwrap(), b';');
    }

    #[test]
    fn default_location_is_read_when_present() {
        let base = tempdir().unwrap();
        let _guard = OverrideGuard::set(base.path().to_path_buf());
        let root = base.path().join(".flic");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("config.toml"), "flac_path = \"/usr/bin/flac\"\n").unwrap();

        let settings = load(None).unwrap();
        assert_eq!(settings.flac_path, Some(PathBuf::from("/usr/bin/flac")));
        assert_eq!(settings.extensions, vec!["flac".to_string()]);
    }

    #[test]
    fn explicit_file_overrides_every_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            r#"
flac_path = "/opt/flac/flac"
metaflac_path = "/opt/flac/metaflac"
autosave_interval_minutes = 10
modtime_tolerance_micros = 2000000
extensions = ["flac", "fla"]
separator = "\t"
"#,
        )
        .unwrap();

        let settings = load(Some(&path)).unwrap();
        assert_eq!(settings.metaflac_path, Some(PathBuf::from("/opt/flac/metaflac")));
        assert_eq!(settings.autosave_interval(), Duration::minutes(10));
        assert_eq!(settings.modtime_tolerance(), Duration::seconds(2));
        assert_eq!(settings.extensions.len(), 2);
        assert_eq!(settings.separator_byte().unwrap(), b'\t');
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        let err = load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn rejects_bad_separator_and_unknown_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        std::fs::write(&path, "separator = \"é\"\n").unwrap();
        assert!(matches!(
            load_from_path(&path),
            Err(ConfigError::InvalidSeparator('é'))
        ));

        std::fs::write(&path, "flac = \"/usr/bin/flac\"\n").unwrap();
        assert!(matches!(
            load_from_path(&path),
            Err(ConfigError::ParseToml { .. })
        ));
    }

    #[test]
    fn empty_extension_list_falls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "extensions = [\" \"]\n").unwrap();
        assert_eq!(load_from_path(&path).unwrap().extensions, vec!["flac".to_string()]);
    }
}
