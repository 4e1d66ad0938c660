//! Where `flic` keeps its own files: an optional settings file and launch logs.
//!
//! Everything lives under a `.flic` folder in the OS config directory. Set
//! `FLIC_CONFIG_HOME` to anchor it elsewhere (portable installs, tests).

use std::{
    path::PathBuf,
    sync::{LazyLock, Mutex},
};

use directories::BaseDirs;
use thiserror::Error;

/// Name of the application directory that lives under the OS config root.
pub const APP_DIR_NAME: &str = ".flic";
/// Environment variable replacing the OS config root.
pub const CONFIG_HOME_ENV: &str = "FLIC_CONFIG_HOME";
/// File name of the optional settings file.
pub const CONFIG_FILE_NAME: &str = "config.toml";

static CONFIG_BASE_OVERRIDE: LazyLock<Mutex<Option<PathBuf>>> = LazyLock::new(|| Mutex::new(None));

#[derive(Debug, Error)]
pub enum AppDirError {
    #[error("No suitable base config directory available for application files")]
    NoBaseDir,
    #[error("Failed to create application directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Path of the `.flic` directory, without creating it.
pub fn app_root_path() -> Result<PathBuf, AppDirError> {
    config_base_dir()
        .map(|base| base.join(APP_DIR_NAME))
        .ok_or(AppDirError::NoBaseDir)
}

/// Default location of `config.toml`. The file itself may not exist.
pub fn config_path() -> Result<PathBuf, AppDirError> {
    Ok(app_root_path()?.join(CONFIG_FILE_NAME))
}

/// Logs directory inside the `.flic` root, created on demand.
pub fn logs_dir() -> Result<PathBuf, AppDirError> {
    let path = app_root_path()?.join("logs");
    std::fs::create_dir_all(&path).map_err(|source| AppDirError::CreateDir {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

fn config_base_dir() -> Option<PathBuf> {
    if let Some(path) = CONFIG_BASE_OVERRIDE
        .lock()
        .ok()
        .and_then(|guard| guard.clone())
    {
        return Some(path);
    }
    if let Some(path) = std::env::var_os(CONFIG_HOME_ENV).filter(|value| !value.is_empty()) {
        return Some(PathBuf::from(path));
    }
    BaseDirs::new().map(|dirs| dirs.config_dir().to_path_buf())
}

#[cfg(test)]
fn set_config_base_override(path: Option<PathBuf>) {
    let mut guard = CONFIG_BASE_OVERRIDE
        .lock()
        .expect("config base override mutex poisoned");
    *guard = path;
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::PathBuf;
    use std::sync::{Mutex, MutexGuard};

    static SERIAL: Mutex<()> = Mutex::new(());

    /// Points the application root at `path` until dropped.
    pub(crate) struct OverrideGuard {
        _serial: MutexGuard<'static, ()>,
    }

    impl OverrideGuard {
        pub(crate) fn set(path: PathBuf) -> Self {
            let serial = SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            super::set_config_base_override(Some(path));
            Self { _serial: serial }
        }
    }

    impl Drop for OverrideGuard {
        fn drop(&mut self) {
            super::set_config_base_override(None);
        }
    }
}
