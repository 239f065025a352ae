/// File organization system for moving files into category directories.
///
/// The [`Organizer`] takes every regular file under a root directory, asks the
/// [`Categorizer`] which category folder it belongs in, creates that folder if
/// needed and moves the file there. Existing files are never overwritten: a
/// clashing name gets a numeric suffix (`report_1.pdf`, `report_2.pdf`, ...).
///
/// Failures are per file. A file that cannot be moved is recorded and the pass
/// goes on with the next one; only an unusable root aborts the pass.
use crate::action_log::{ActionRecord, ActionSink};
use crate::config::CompiledFilters;
use crate::file_category::Categorizer;
use crate::scanner::{self, ScanError, ScanOptions};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that abort an organize pass.
#[derive(Error, Debug)]
pub enum OrganizeError {
    /// The base directory path is invalid or doesn't exist.
    #[error("Invalid base path: {0}")]
    InvalidBasePath(#[from] ScanError),
}

/// Errors for a single file; recorded, never fatal to the pass.
#[derive(Error, Debug)]
pub enum MoveError {
    /// Failed to create a category directory.
    #[error("Failed to create directory {}: {source}", .path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Failed to move a file to its category directory.
    #[error("Failed to move {} to {}: {source}", .from.display(), .to.display())]
    FileMoveFailure {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The file name has no usable final component.
    #[error("{} has no file name", .path.display())]
    NoFileName { path: PathBuf },
}

/// Result type for single-file organization operations.
pub type MoveResult<T> = Result<T, MoveError>;

/// Represents a single file organization operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    /// The original path of the file before organization.
    pub original_path: PathBuf,
    /// The new path of the file after organization.
    pub new_path: PathBuf,
    /// The category the file was moved to.
    pub category: String,
    /// True when the file name was changed to avoid a collision.
    pub renamed: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OrganizeOptions {
    pub recursive: bool,
    pub dry_run: bool,
}

/// Counts produced by one organize pass.
#[derive(Debug, Default, Clone)]
pub struct OrganizeReport {
    /// Moves performed (or planned, in dry-run mode).
    pub operations: Vec<Operation>,
    pub skipped: usize,
    pub errors: usize,
}

impl OrganizeReport {
    pub fn files_moved(&self) -> usize {
        self.operations.len()
    }

    pub fn renamed(&self) -> usize {
        self.operations.iter().filter(|op| op.renamed).count()
    }

    /// Number of files moved per category folder.
    pub fn category_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for op in &self.operations {
            *counts.entry(op.category.clone()).or_insert(0) += 1;
        }
        counts
    }
}

/// Moves files into category folders under a root directory.
pub struct Organizer<'a> {
    categorizer: &'a Categorizer,
    filters: &'a CompiledFilters,
    sink: &'a mut dyn ActionSink,
    options: OrganizeOptions,
}

impl<'a> Organizer<'a> {
    pub fn new(
        categorizer: &'a Categorizer,
        filters: &'a CompiledFilters,
        sink: &'a mut dyn ActionSink,
        options: OrganizeOptions,
    ) -> Self {
        Self {
            categorizer,
            filters,
            sink,
            options,
        }
    }

    /// Organizes `root`.
    ///
    /// Only files directly under `root` are considered unless the pass is
    /// recursive. A recursive pass never enters a top-level category folder, so
    /// running the organizer twice moves nothing the second time.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use pctidy::action_log::TracingSink;
    /// use pctidy::config::CompiledFilters;
    /// use pctidy::file_category::Categorizer;
    /// use pctidy::file_organizer::{OrganizeOptions, Organizer};
    /// use std::path::Path;
    ///
    /// let categorizer = Categorizer::default();
    /// let filters = CompiledFilters::permissive();
    /// let mut sink = TracingSink;
    /// let report = Organizer::new(&categorizer, &filters, &mut sink, OrganizeOptions::default())
    ///     .organize(Path::new("/home/me/Downloads"))
    ///     .expect("organize failed");
    /// println!("moved {} files", report.files_moved());
    /// ```
    pub fn organize(&mut self, root: &Path) -> Result<OrganizeReport, OrganizeError> {
        let mut scan_options = if self.options.recursive {
            ScanOptions::recursive()
        } else {
            ScanOptions::flat()
        };
        scan_options = scan_options.prune(self.categorizer.category_names());

        let outcome = scanner::scan(root, &scan_options, self.filters)?;
        tracing::info!(
            root = %root.display(),
            files = outcome.files.len(),
            dry_run = self.options.dry_run,
            "organizing"
        );

        let mut report = OrganizeReport::default();
        let dry_run = self.options.dry_run;

        for (path, reason) in outcome.skipped {
            self.sink
                .record(ActionRecord::skipped(&path, reason).with_dry_run(dry_run));
            report.skipped += 1;
        }
        for (path, reason) in outcome.errors {
            self.sink
                .record(ActionRecord::error(&path, reason).with_dry_run(dry_run));
            report.errors += 1;
        }

        // Destinations handed out during this pass; a dry run has to see its
        // own planned moves to report the same renames a real run would make.
        let mut claimed: HashSet<PathBuf> = HashSet::new();

        for file in outcome.files {
            let category = self.categorizer.category_for_path(&file.path).to_string();
            match self.organize_file(root, &file.path, &category, &mut claimed) {
                Ok(operation) => {
                    let mut record = ActionRecord::moved(&operation.original_path, &operation.new_path)
                        .with_dry_run(dry_run);
                    if operation.renamed {
                        record = record.with_reason("renamed to avoid overwriting an existing file");
                    }
                    self.sink.record(record);
                    report.operations.push(operation);
                }
                Err(e) => {
                    self.sink
                        .record(ActionRecord::error(&file.path, e.to_string()).with_dry_run(dry_run));
                    report.errors += 1;
                }
            }
        }

        Ok(report)
    }

    fn organize_file(
        &self,
        root: &Path,
        file_path: &Path,
        category: &str,
        claimed: &mut HashSet<PathBuf>,
    ) -> MoveResult<Operation> {
        let category_path = root.join(category);
        let file_name = file_path.file_name().ok_or_else(|| MoveError::NoFileName {
            path: file_path.to_path_buf(),
        })?;

        let destination = unique_destination(&category_path, Path::new(file_name), claimed);
        let renamed = destination.file_name() != Some(file_name);

        if !self.options.dry_run {
            if !category_path.is_dir() {
                fs::create_dir_all(&category_path).map_err(|e| {
                    MoveError::DirectoryCreationFailed {
                        path: category_path.clone(),
                        source: e,
                    }
                })?;
            }
            move_file(file_path, &destination)?;
        }

        claimed.insert(destination.clone());
        Ok(Operation {
            original_path: file_path.to_path_buf(),
            new_path: destination,
            category: category.to_string(),
            renamed,
        })
    }
}

/// Picks a path inside `dir` for `file_name` that neither exists on disk nor
/// was claimed earlier in the pass.
///
/// `photo.jpg` becomes `photo_1.jpg`, `photo_2.jpg`, ... until a free name is
/// found. Names without an extension get the suffix at the end.
pub fn unique_destination(dir: &Path, file_name: &Path, claimed: &HashSet<PathBuf>) -> PathBuf {
    let candidate = dir.join(file_name);
    if !is_taken(&candidate, claimed) {
        return candidate;
    }

    let stem = file_name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = file_name
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut counter = 1u32;
    loop {
        let candidate = dir.join(format!("{}_{}{}", stem, counter, extension));
        if !is_taken(&candidate, claimed) {
            return candidate;
        }
        counter += 1;
    }
}

fn is_taken(path: &Path, claimed: &HashSet<PathBuf>) -> bool {
    claimed.contains(path) || fs::symlink_metadata(path).is_ok()
}

/// Moves `from` to `to`, falling back to copy-and-remove across filesystems.
pub fn move_file(from: &Path, to: &Path) -> MoveResult<()> {
    let failure = |e: io::Error| MoveError::FileMoveFailure {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source: e,
    };

    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            tracing::debug!(from = %from.display(), to = %to.display(), "cross-device move, copying");
            fs::copy(from, to).map_err(failure)?;
            if let Err(e) = fs::remove_file(from) {
                // Leave a single copy behind rather than two.
                let _ = fs::remove_file(to);
                return Err(failure(e));
            }
            Ok(())
        }
        Err(e) => Err(failure(e)),
    }
}
