//! Spool directory validation and spool file creation.
//!
//! Every path that reaches the filesystem from here has passed
//! [`check_directory_path`] first. The check is purely lexical and never relies
//! on the operating system to reject malformed input.

use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Component, Path, PathBuf},
};

use uuid::Uuid;

use crate::StorageItemError;

const SPOOL_FILE_PREFIX: &str = "upload_";
const SPOOL_FILE_SUFFIX: &str = ".tmp";

/// Lexically validates a spool directory path, returning the rejection reason.
pub(crate) fn check_directory_path(path: &Path) -> Result<(), &'static str> {
    let raw = path.to_string_lossy();
    if raw.is_empty() {
        return Err("path is empty");
    }

    if raw.contains('\0') {
        return Err("path contains a NUL character");
    }

    if path
        .components()
        .any(|component| matches!(component, Component::ParentDir))
    {
        return Err("path contains a parent directory component");
    }

    Ok(())
}

/// Validates a spool directory path string received from an untrusted source.
///
/// No filesystem call is made; the path must be absolute and pass
/// [`check_directory_path`].
pub(crate) fn parse_restored_directory(raw: &str) -> Result<PathBuf, StorageItemError> {
    let invalid = |reason| StorageItemError::InvalidPath {
        path: raw.to_owned(),
        reason,
    };

    // Checked on the raw string so nothing is lost to path normalization.
    if raw.contains('\0') {
        return Err(invalid("path contains a NUL character"));
    }

    let path = PathBuf::from(raw);
    check_directory_path(&path).map_err(invalid)?;
    if !path.is_absolute() {
        return Err(invalid("path is not absolute"));
    }

    Ok(path)
}

/// Confirms that a validated path names an existing directory.
pub(crate) fn ensure_directory(path: &Path) -> Result<(), StorageItemError> {
    let metadata = fs::metadata(path)?;
    if !metadata.is_dir() {
        return Err(StorageItemError::Io(io::Error::other(format!(
            "`{}` is not a directory",
            path.display()
        ))));
    }
    Ok(())
}

/// Returns `path` unchanged when absolute, otherwise resolved against the working directory.
pub(crate) fn absolutize(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Creates a fresh, uniquely named spool file inside `directory`.
///
/// The directory is re-validated on every call and is never created.
pub(crate) fn create_spool_file(directory: &Path) -> Result<(PathBuf, File), StorageItemError> {
    let spool_error = |source: io::Error| StorageItemError::SpoolCreation {
        directory: directory.to_path_buf(),
        source,
    };

    check_directory_path(directory)
        .map_err(|reason| spool_error(io::Error::new(io::ErrorKind::InvalidInput, reason)))?;
    ensure_directory(directory).map_err(|err| spool_error(err.into_io()))?;

    let path = directory.join(spool_file_name());
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(spool_error)?;
    Ok((path, file))
}

fn spool_file_name() -> String {
    format!(
        "{SPOOL_FILE_PREFIX}{}{SPOOL_FILE_SUFFIX}",
        Uuid::new_v4().simple()
    )
}
