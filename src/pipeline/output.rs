// src/pipeline/output.rs

//! Output directory resolution.
//!
//! Precedence: explicit save path > target directory (absolute as-is,
//! relative under `download.base_path`) > `download.base_path`. A timestamp
//! directory is appended unless the job turns it off.

use std::path::{Path, PathBuf};

use chrono::Local;
use chrono::format::{Item, StrftimeItems};

use crate::error::{AppError, Result};
use crate::models::{Config, PageJob};
use crate::storage::LocalStorage;

const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Directories one page job writes into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    /// The resolved job directory
    pub base: PathBuf,
    /// Where downloads land; `base/original` when watermark removal is on
    pub originals: PathBuf,
    /// `base/cleaned` when watermark removal is on
    pub cleaned: Option<PathBuf>,
}

impl OutputLayout {
    pub fn storage(&self) -> LocalStorage {
        LocalStorage::new(&self.originals)
    }
}

/// Compute the directory layout for `job` without touching the filesystem.
pub fn resolve_output(config: &Config, job: &PageJob, watermark: bool) -> OutputLayout {
    let options = &job.output;

    let mut base = match (&options.save_path, &options.target_dir) {
        (Some(save_path), _) if !save_path.trim().is_empty() => expand_home(save_path.trim()),
        (_, Some(target)) if !target.trim().is_empty() => {
            let target = target.trim();
            if is_absolute(target) {
                PathBuf::from(target)
            } else {
                Path::new(&config.download.base_path).join(target)
            }
        }
        _ => PathBuf::from(&config.download.base_path),
    };

    let use_timestamp = options.use_timestamp.unwrap_or(config.output.use_timestamp);
    if use_timestamp {
        let format = options
            .timestamp_format
            .as_deref()
            .unwrap_or(&config.output.timestamp_format);
        base.push(timestamp_dir(format));
    }

    if watermark {
        OutputLayout {
            originals: base.join("original"),
            cleaned: Some(base.join("cleaned")),
            base,
        }
    } else {
        OutputLayout {
            originals: base.clone(),
            cleaned: None,
            base,
        }
    }
}

/// Create every directory of `layout`.
pub async fn prepare_output(layout: &OutputLayout) -> Result<()> {
    let dirs = std::iter::once(&layout.originals).chain(layout.cleaned.iter());
    for dir in dirs {
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            AppError::validation(format!("cannot create directory {}: {e}", dir.display()))
        })?;
    }
    Ok(())
}

/// Format the current local time, falling back to the default on a bad format.
pub fn timestamp_dir(format: &str) -> String {
    let format = if is_valid_format(format) {
        format
    } else {
        log::warn!(
            "Invalid timestamp format '{}', using {}",
            format,
            DEFAULT_TIMESTAMP_FORMAT
        );
        DEFAULT_TIMESTAMP_FORMAT
    };
    Local::now().format(format).to_string()
}

fn is_valid_format(format: &str) -> bool {
    !format.trim().is_empty()
        && !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

fn is_absolute(path: &str) -> bool {
    let bytes = path.as_bytes();
    path.starts_with('/')
        || path.starts_with('\\')
        || (bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':')
        || Path::new(path).is_absolute()
}

fn expand_home(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with(['/', '\\']) => rest,
        _ => return PathBuf::from(path),
    };
    let home = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE"));
    match home {
        Some(home) => PathBuf::from(home).join(rest.trim_start_matches(['/', '\\'])),
        None => PathBuf::from(path),
    }
}
