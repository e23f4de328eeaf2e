// SPDX-License-Identifier: MIT
//! Trace directory checks used by the command-line front end
//!
//! The codec itself never calls these: `compress` and `decompress` trust
//! their callers to hand them a suitable source and an empty destination.

use crate::error::{ContainerError, IoResultExt, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Marker log present in every diagnostics trace directory
pub const TRACE_LOG_NAME: &str = "ttdlog.log";

/// Container file extension
pub const CONTAINER_EXTENSION: &str = "trc";

/// Default extraction directory, relative to the working directory
pub const DEFAULT_TARGET_DIR: &str = "_tracelog";

/// Require `dir` to be an existing trace directory.
pub fn ensure_trace_dir(dir: &Path) -> Result<PathBuf> {
    if dir.is_dir() && dir.join(TRACE_LOG_NAME).is_file() {
        Ok(dir.to_path_buf())
    } else {
        Err(ContainerError::NotATraceDirectory(dir.to_path_buf()))
    }
}

/// Whether `dir` can be overwritten without losing unrelated data.
///
/// True when it is missing, holds nothing but dot-files, or holds an old
/// trace (identified by its marker log).
pub fn looks_like_trace(dir: &Path) -> bool {
    if !dir.exists() {
        return true;
    }

    let Ok(listing) = fs::read_dir(dir) else {
        return false;
    };

    let mut visible = 0usize;
    for dir_entry in listing {
        let Ok(dir_entry) = dir_entry else {
            return false;
        };
        let name = dir_entry.file_name();
        let name = name.to_string_lossy();
        if name == TRACE_LOG_NAME {
            return true;
        }
        if !name.starts_with('.') {
            visible += 1;
        }
    }

    visible == 0
}

/// Make `dir` an existing, empty directory ready for extraction.
///
/// Refuses directories that hold something other than an old trace.
pub fn prepare_target_dir(dir: &Path) -> Result<PathBuf> {
    if !looks_like_trace(dir) {
        return Err(ContainerError::TargetNotSafe(dir.to_path_buf()));
    }

    if dir.exists() {
        for dir_entry in fs::read_dir(dir).at(dir)? {
            let path = dir_entry.at(dir)?.path();
            let file_type = fs::symlink_metadata(&path).at(&path)?.file_type();
            if file_type.is_dir() {
                fs::remove_dir_all(&path).at(&path)?;
            } else {
                fs::remove_file(&path).at(&path)?;
            }
        }
        debug!(dir = %dir.display(), "Emptied target directory");
    } else {
        fs::create_dir_all(dir).at(dir)?;
        debug!(dir = %dir.display(), "Created target directory");
    }

    Ok(dir.to_path_buf())
}

/// Default container path for a trace directory: `<basename>.trc`.
pub fn default_container_name(trace_dir: &Path) -> PathBuf {
    let base = trace_dir
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "trace".into());
    let mut name = PathBuf::from(base);
    name.set_extension(CONTAINER_EXTENSION);
    name
}
