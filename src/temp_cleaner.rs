//! Purging of temporary files from known safe locations.
//!
//! Every file below a safe location is deleted unless an exclusion pattern
//! protects it; directories emptied along the way are removed afterwards. The
//! locations themselves are always kept.

use crate::action_log::{ActionRecord, ActionSink};
use crate::config::CompiledFilters;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TempCleanReport {
    pub files_deleted: usize,
    pub bytes_freed: u64,
    pub dirs_removed: usize,
    pub skipped: usize,
    pub errors: usize,
    /// Configured locations that did not exist.
    pub missing_locations: usize,
}

pub struct TempCleaner<'a> {
    locations: &'a [PathBuf],
    exclusions: &'a CompiledFilters,
    sink: &'a mut dyn ActionSink,
    dry_run: bool,
}

impl<'a> TempCleaner<'a> {
    /// `locations` must already have passed
    /// [`validate_temp_locations`](crate::config::validate_temp_locations).
    pub fn new(
        locations: &'a [PathBuf],
        exclusions: &'a CompiledFilters,
        sink: &'a mut dyn ActionSink,
        dry_run: bool,
    ) -> Self {
        Self {
            locations,
            exclusions,
            sink,
            dry_run,
        }
    }

    pub fn clean(&mut self) -> TempCleanReport {
        let mut report = TempCleanReport::default();
        for location in self.locations {
            if !location.is_dir() {
                tracing::debug!(location = %location.display(), "temp location missing, skipped");
                report.missing_locations += 1;
                continue;
            }
            self.clean_location(location, &mut report);
        }
        tracing::info!(
            files = report.files_deleted,
            bytes = report.bytes_freed,
            dirs = report.dirs_removed,
            errors = report.errors,
            dry_run = self.dry_run,
            "temp cleanup finished"
        );
        report
    }

    fn clean_location(&mut self, location: &Path, report: &mut TempCleanReport) {
        let walker = WalkDir::new(location)
            .min_depth(1)
            .follow_links(false)
            .contents_first(true);

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(location).to_path_buf();
                    self.sink.record(
                        ActionRecord::error(&path, e.to_string()).with_dry_run(self.dry_run),
                    );
                    report.errors += 1;
                    continue;
                }
            };
            let path = entry.path();

            if entry.file_type().is_dir() {
                if self.dry_run {
                    continue;
                }
                // Only succeeds once everything inside is gone; directories
                // holding excluded or undeletable files stay.
                match fs::remove_dir(path) {
                    Ok(()) => report.dirs_removed += 1,
                    Err(e) => {
                        tracing::debug!(path = %path.display(), error = %e, "directory kept")
                    }
                }
                continue;
            }

            let relative = path.strip_prefix(location).unwrap_or(path);
            if let Some(reason) = self.exclusions.exclusion_reason(relative) {
                self.sink
                    .record(ActionRecord::skipped(path, reason).with_dry_run(self.dry_run));
                report.skipped += 1;
                continue;
            }

            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            if !self.dry_run
                && let Err(e) = fs::remove_file(path)
            {
                self.sink.record(ActionRecord::error(
                    path,
                    format!("Failed to delete temp file: {}", e),
                ));
                report.errors += 1;
                continue;
            }

            self.sink.record(
                ActionRecord::deleted(path)
                    .with_reason(format!("temporary file ({} bytes)", size))
                    .with_dry_run(self.dry_run),
            );
            report.files_deleted += 1;
            report.bytes_freed += size;
        }
    }
}
