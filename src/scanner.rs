//! Directory enumeration shared by the organize and duplicate passes.

use crate::config::CompiledFilters;
use crate::file_category::{extension_of, fold_case};
use crate::hasher::Fingerprint;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use walkdir::WalkDir;

/// Errors that stop a scan before it starts.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory not found: {}", .path.display())]
    DirectoryNotFound { path: PathBuf },

    #[error("Not a directory: {}", .path.display())]
    NotADirectory { path: PathBuf },
}

/// A regular file seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Absolute path when the scanned root was absolute.
    pub path: PathBuf,
    /// Lower-case extension without the leading dot.
    pub extension: Option<String>,
    pub size: u64,
    pub modified: Option<SystemTime>,
    /// Filled in lazily by the duplicate pass.
    pub fingerprint: Option<Fingerprint>,
}

/// What to enumerate.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Descend into subdirectories.
    pub recursive: bool,
    /// Top-level directory names (case-folded) that are never entered.
    pub pruned_dirs: HashSet<String>,
}

impl ScanOptions {
    pub fn flat() -> Self {
        Self::default()
    }

    pub fn recursive() -> Self {
        Self {
            recursive: true,
            ..Self::default()
        }
    }

    pub fn prune<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        self.pruned_dirs
            .extend(names.into_iter().map(fold_case));
        self
    }
}

/// Result of enumerating one root.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Regular files that passed the filters, sorted by path.
    pub files: Vec<FileRecord>,
    /// Entries left alone, with the reason.
    pub skipped: Vec<(PathBuf, String)>,
    /// Entries that could not be inspected.
    pub errors: Vec<(PathBuf, String)>,
}

/// Enumerates regular files under `root`.
///
/// Symbolic links are never followed and never reported as files. Hidden
/// directories are not entered unless the filters enable hidden files. Filter
/// rules see paths relative to `root`.
pub fn scan(
    root: &Path,
    options: &ScanOptions,
    filters: &CompiledFilters,
) -> Result<ScanOutcome, ScanError> {
    if !root.exists() {
        return Err(ScanError::DirectoryNotFound {
            path: root.to_path_buf(),
        });
    }
    if !root.is_dir() {
        return Err(ScanError::NotADirectory {
            path: root.to_path_buf(),
        });
    }

    let mut outcome = ScanOutcome::default();
    let mut walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name();
    if !options.recursive {
        walker = walker.max_depth(1);
    }

    let include_hidden = filters.includes_hidden();
    let iter = walker.into_iter().filter_entry(|entry| {
        if !entry.file_type().is_dir() {
            return true;
        }
        let name = entry.file_name().to_string_lossy();
        if entry.depth() == 1 && options.pruned_dirs.contains(&fold_case(&name)) {
            return false;
        }
        include_hidden || !name.starts_with('.')
    });

    for entry in iter {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().unwrap_or(root).to_path_buf();
                tracing::warn!(path = %path.display(), error = %e, "cannot read directory entry");
                outcome.errors.push((path, e.to_string()));
                continue;
            }
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }
        let path = entry.path();
        if !file_type.is_file() {
            outcome
                .skipped
                .push((path.to_path_buf(), "not a regular file".to_string()));
            continue;
        }

        let relative = path.strip_prefix(root).unwrap_or(path);
        if let Some(reason) = filters.exclusion_reason(relative) {
            outcome.skipped.push((path.to_path_buf(), reason.to_string()));
            continue;
        }

        match entry.metadata() {
            Ok(metadata) => outcome.files.push(FileRecord {
                path: path.to_path_buf(),
                extension: extension_of(path),
                size: metadata.len(),
                modified: metadata.modified().ok(),
                fingerprint: None,
            }),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot read metadata");
                outcome.errors.push((path.to_path_buf(), e.to_string()));
            }
        }
    }

    outcome.files.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::debug!(
        root = %root.display(),
        files = outcome.files.len(),
        skipped = outcome.skipped.len(),
        errors = outcome.errors.len(),
        "scan finished"
    );
    Ok(outcome)
}
