//! Filesystem helpers shared by the persistence code.

use std::borrow::Cow;
use std::ffi::{OsStr, OsString};
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use rand::TryRngCore;
use rand::rngs::OsRng;

const STAGING_ATTEMPTS: usize = 5;
const STAGING_SUFFIX_BYTES: usize = 6;

/// Replace `target` with `data` without exposing a partial file.
///
/// The bytes go to a uniquely named sibling first, are synced, and the
/// sibling is renamed over `target`. On unix the directory entry is synced
/// after the rename. A failed write leaves `target` untouched.
pub fn write_atomically(target: &Path, data: &[u8]) -> io::Result<()> {
    let dir = containing_dir(target);
    let name = target
        .file_name()
        .ok_or_else(|| io::Error::new(ErrorKind::InvalidInput, "path has no file name"))?;
    let (staged, mut file) = create_staging_file(dir, name)?;
    let written = file.write_all(data).and_then(|()| file.sync_all());
    drop(file);
    if let Err(err) = written.and_then(|()| rename_over(&staged, target)) {
        let _ = fs::remove_file(&staged);
        return Err(err);
    }
    sync_dir(dir)
}

/// Raw bytes of `path`. Lossless on unix; elsewhere non-Unicode parts are replaced.
pub fn path_bytes(path: &Path) -> Cow<'_, [u8]> {
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        Cow::Borrowed(path.as_os_str().as_bytes())
    }
    #[cfg(not(unix))]
    {
        match path.to_string_lossy() {
            Cow::Borrowed(text) => Cow::Borrowed(text.as_bytes()),
            Cow::Owned(text) => Cow::Owned(text.into_bytes()),
        }
    }
}

/// Inverse of [`path_bytes`].
pub fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        PathBuf::from(OsStr::from_bytes(bytes))
    }
    #[cfg(not(unix))]
    {
        PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
    }
}

fn containing_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn create_staging_file(dir: &Path, name: &OsStr) -> io::Result<(PathBuf, File)> {
    let mut collision = None;
    for _ in 0..STAGING_ATTEMPTS {
        let path = dir.join(staging_name(name)?);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => collision = Some(err),
            Err(err) => return Err(err),
        }
    }
    Err(collision.unwrap_or_else(|| ErrorKind::AlreadyExists.into()))
}

/// `<name>.tmp-<12 hex digits>`, keeping `name` byte for byte.
fn staging_name(name: &OsStr) -> io::Result<OsString> {
    let mut suffix = [0u8; STAGING_SUFFIX_BYTES];
    OsRng.try_fill_bytes(&mut suffix).map_err(io::Error::other)?;
    let mut staged = name.to_os_string();
    staged.push(".tmp-");
    for byte in suffix {
        staged.push(format!("{byte:02x}"));
    }
    Ok(staged)
}

fn rename_over(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        #[cfg(windows)]
        Err(err)
            if matches!(
                err.kind(),
                ErrorKind::AlreadyExists | ErrorKind::PermissionDenied
            ) =>
        {
            match fs::remove_file(to) {
                Err(inner) if inner.kind() != ErrorKind::NotFound => Err(inner),
                _ => fs::rename(from, to),
            }
        }
        Err(err) => Err(err),
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn dir_names(dir: &Path) -> Vec<OsString> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn replaces_existing_contents_and_leaves_no_staging_file() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("report.csv");
        fs::write(&target, b"old").unwrap();

        write_atomically(&target, b"new contents").unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"new contents");
        assert_eq!(dir_names(dir.path()), vec![OsString::from("report.csv")]);
    }

    #[test]
    fn failed_rename_keeps_target_and_cleans_up() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("occupied");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("inner"), b"x").unwrap();

        assert!(write_atomically(&target, b"data").is_err());
        assert!(target.is_dir());
        assert_eq!(dir_names(dir.path()), vec![OsString::from("occupied")]);
    }

    #[test]
    fn staging_name_keeps_the_target_name_as_prefix() {
        let name = staging_name(OsStr::new("report.csv")).unwrap();
        let name = name.to_str().unwrap();
        let suffix = name.strip_prefix("report.csv.tmp-").unwrap();
        assert_eq!(suffix.len(), STAGING_SUFFIX_BYTES * 2);
        assert!(suffix.bytes().all(|byte| byte.is_ascii_hexdigit()));
    }

    #[cfg(unix)]
    #[test]
    fn non_unicode_paths_survive_the_byte_conversion() {
        use std::os::unix::ffi::OsStrExt;
        let path = Path::new(OsStr::from_bytes(b"/music/caf\xE9.flac"));
        assert_eq!(path_bytes(path).as_ref(), b"/music/caf\xE9.flac");
        assert_eq!(path_from_bytes(&path_bytes(path)), path);
    }
}
