//! Duplicate detection by content fingerprint.
//!
//! A pass walks the whole tree, buckets files by size, fingerprints only the
//! files that share a size with another file, and groups them by fingerprint.
//! In each group the file that sorts first by path is kept; every other member
//! is deleted.

use crate::action_log::{ActionRecord, ActionSink};
use crate::config::CompiledFilters;
use crate::hasher::{FileHasher, Fingerprint};
use crate::scanner::{self, FileRecord, ScanError, ScanOptions};
use indicatif::ProgressBar;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that abort a duplicate pass.
#[derive(Error, Debug)]
pub enum DedupeError {
    #[error("Cannot scan for duplicates: {0}")]
    Scan(#[from] ScanError),
}

/// Files sharing size and fingerprint.
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    pub fingerprint: Fingerprint,
    pub size: u64,
    /// Sorted by path; the first member is the survivor.
    pub members: Vec<FileRecord>,
}

impl DuplicateGroup {
    /// The copy that is kept: earliest in path sort order.
    pub fn survivor(&self) -> &FileRecord {
        &self.members[0]
    }

    /// Every member except the survivor.
    pub fn redundant(&self) -> &[FileRecord] {
        &self.members[1..]
    }

    /// Bytes freed by deleting the redundant copies. Hard links to the
    /// survivor are counted too; the resolved [`DedupeReport`] leaves them out.
    pub fn wasted_bytes(&self) -> u64 {
        self.size * self.redundant().len() as u64
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DedupeOptions {
    pub dry_run: bool,
    /// Zero-length files are all "identical"; leave them alone unless asked.
    pub include_empty: bool,
}

/// Counts produced by one duplicate pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DedupeReport {
    pub groups: usize,
    /// Files deleted (or that would be, in dry-run mode).
    pub files_deleted: usize,
    pub bytes_reclaimed: u64,
    /// Files fingerprinted after the size pre-filter.
    pub files_hashed: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Finds and removes duplicate files under a root directory.
pub struct DuplicateDetector<'a> {
    hasher: FileHasher,
    filters: &'a CompiledFilters,
    sink: &'a mut dyn ActionSink,
    options: DedupeOptions,
    progress: Option<ProgressBar>,
    /// Planned destination for each path a dry organize pass would move.
    planned: HashMap<PathBuf, PathBuf>,
    /// The reverse of `planned`: where each planned file still lives.
    on_disk: HashMap<PathBuf, PathBuf>,
}

impl<'a> DuplicateDetector<'a> {
    pub fn new(
        hasher: FileHasher,
        filters: &'a CompiledFilters,
        sink: &'a mut dyn ActionSink,
        options: DedupeOptions,
    ) -> Self {
        Self {
            hasher,
            filters,
            sink,
            options,
            progress: None,
            planned: HashMap::new(),
            on_disk: HashMap::new(),
        }
    }

    /// Judges the tree as it will look after the given `(from, to)` moves.
    ///
    /// A dry run that organizes first moves nothing, so the tree on disk is
    /// not the tree a real run would de-duplicate. Groups, survivors and
    /// records use the planned paths; files are still read where they are.
    pub fn with_planned_layout(mut self, moves: impl IntoIterator<Item = (PathBuf, PathBuf)>) -> Self {
        for (from, to) in moves {
            self.on_disk.insert(to.clone(), from.clone());
            self.planned.insert(from, to);
        }
        self
    }

    fn on_disk<'p>(&'p self, path: &'p Path) -> &'p Path {
        self.on_disk.get(path).map(PathBuf::as_path).unwrap_or(path)
    }

    /// Reports hashing progress on `progress`; its length is set per pass.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Finds duplicates under `root` and deletes all but one copy of each.
    pub fn run(&mut self, root: &Path) -> Result<DedupeReport, DedupeError> {
        let mut report = DedupeReport::default();
        let groups = self.find_groups_into(root, &mut report)?;
        self.resolve_into(&groups, &mut report);
        tracing::info!(
            root = %root.display(),
            groups = report.groups,
            deleted = report.files_deleted,
            bytes = report.bytes_reclaimed,
            dry_run = self.options.dry_run,
            "duplicate pass finished"
        );
        Ok(report)
    }

    /// Finds duplicate groups under `root` without deleting anything.
    ///
    /// Groups are ordered by their survivor's path.
    pub fn find_groups(&mut self, root: &Path) -> Result<Vec<DuplicateGroup>, DedupeError> {
        let mut report = DedupeReport::default();
        self.find_groups_into(root, &mut report)
    }

    /// Deletes the redundant members of each group.
    pub fn resolve(&mut self, groups: &[DuplicateGroup]) -> DedupeReport {
        let mut report = DedupeReport::default();
        self.resolve_into(groups, &mut report);
        report
    }

    fn find_groups_into(
        &mut self,
        root: &Path,
        report: &mut DedupeReport,
    ) -> Result<Vec<DuplicateGroup>, DedupeError> {
        let outcome = scanner::scan(root, &ScanOptions::recursive(), self.filters)?;
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

        let mut files = outcome.files;
        for file in &mut files {
            if let Some(planned) = self.planned.get(&file.path) {
                file.path = planned.clone();
            }
        }
        let groups = self.group_by_content(files, report);
        tracing::debug!(
            root = %root.display(),
            hashed = report.files_hashed,
            groups = groups.len(),
            "duplicate groups found"
        );
        Ok(groups)
    }

    /// Buckets `files` by size, fingerprints the buckets that can hold
    /// duplicates and returns the groups sharing a fingerprint. A file that
    /// cannot be read is recorded and left out.
    fn group_by_content(
        &mut self,
        files: Vec<FileRecord>,
        report: &mut DedupeReport,
    ) -> Vec<DuplicateGroup> {
        let dry_run = self.options.dry_run;

        // Files of different sizes cannot be duplicates, so only buckets with
        // two or more members are worth hashing.
        let mut by_size: BTreeMap<u64, Vec<FileRecord>> = BTreeMap::new();
        for file in files {
            if file.size == 0 && !self.options.include_empty {
                continue;
            }
            by_size.entry(file.size).or_default().push(file);
        }
        let candidates: Vec<FileRecord> = by_size
            .into_values()
            .filter(|bucket| bucket.len() > 1)
            .flatten()
            .collect();

        if let Some(progress) = &self.progress {
            progress.set_length(candidates.len() as u64);
            progress.set_position(0);
        }

        let mut by_fingerprint: BTreeMap<(u64, Fingerprint), Vec<FileRecord>> = BTreeMap::new();
        for mut file in candidates {
            if let Some(progress) = &self.progress {
                progress.inc(1);
            }
            match self.hasher.fingerprint(self.on_disk(&file.path)) {
                Ok(fingerprint) => {
                    report.files_hashed += 1;
                    file.fingerprint = Some(fingerprint);
                    by_fingerprint
                        .entry((file.size, fingerprint))
                        .or_default()
                        .push(file);
                }
                Err(e) => {
                    self.sink
                        .record(ActionRecord::error(&file.path, e.to_string()).with_dry_run(dry_run));
                    report.errors += 1;
                }
            }
        }

        let mut groups: Vec<DuplicateGroup> = by_fingerprint
            .into_iter()
            .filter(|(_, members)| members.len() > 1)
            .map(|((size, fingerprint), mut members)| {
                members.sort_by(|a, b| a.path.cmp(&b.path));
                DuplicateGroup {
                    fingerprint,
                    size,
                    members,
                }
            })
            .collect();
        groups.sort_by(|a, b| a.survivor().path.cmp(&b.survivor().path));

        if let Some(progress) = &self.progress {
            progress.finish_and_clear();
        }
        groups
    }

    fn resolve_into(&mut self, groups: &[DuplicateGroup], report: &mut DedupeReport) {
        let dry_run = self.options.dry_run;
        for group in groups {
            report.groups += 1;
            let survivor = &group.survivor().path;
            let survivor_on_disk = self.on_disk(survivor).to_path_buf();

            // Deleting the copies of a file that has since disappeared would
            // lose the content altogether.
            if !survivor_on_disk.is_file() {
                self.sink.record(
                    ActionRecord::error(survivor, "survivor vanished; group left untouched")
                        .with_dry_run(dry_run),
                );
                report.errors += 1;
                continue;
            }

            for duplicate in group.redundant() {
                let duplicate_on_disk = self.on_disk(&duplicate.path).to_path_buf();
                // Removing another link to the survivor's data frees nothing.
                let freed = if shares_storage(&duplicate_on_disk, &survivor_on_disk) {
                    0
                } else {
                    duplicate.size
                };
                if !dry_run && let Err(e) = fs::remove_file(&duplicate_on_disk) {
                    self.sink.record(ActionRecord::error(
                        &duplicate.path,
                        format!("Failed to delete duplicate: {}", e),
                    ));
                    report.errors += 1;
                    continue;
                }
                self.sink.record(
                    ActionRecord::duplicate_deleted(&duplicate.path, survivor).with_dry_run(dry_run),
                );
                report.files_deleted += 1;
                report.bytes_reclaimed += freed;
            }
        }
    }
}

/// Whether two paths are hard links to the same file.
#[cfg(unix)]
fn shares_storage(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn shares_storage(_a: &Path, _b: &Path) -> bool {
    false
}
