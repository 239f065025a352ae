//! The single entry point that runs a complete maintenance pass.
//!
//! A run is synchronous: it organizes and de-duplicates the target directory
//! (in the configured order), optionally purges temp locations, and returns a
//! [`RunSummary`]. Per-file failures are counted in the summary; the caller
//! decides whether a non-zero error count means the run failed.

use crate::action_log::{ActionSink, DistinctSkips};
use crate::config::{AppConfig, CompiledFilters, ConfigError, validate_temp_locations};
use crate::duplicates::{DedupeError, DedupeOptions, DuplicateDetector};
use crate::file_category::Categorizer;
use crate::file_organizer::{OrganizeError, OrganizeOptions, Organizer};
use crate::hasher::FileHasher;
use crate::output::OutputFormatter;
use crate::temp_cleaner::TempCleaner;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Which pass goes first when both are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PassOrder {
    /// Organize, then remove duplicates from the organized tree.
    #[default]
    OrganizeFirst,
    /// Remove duplicates first, so fewer files are moved.
    DedupeFirst,
}

#[derive(Error, Debug)]
pub enum MaintenanceError {
    #[error(transparent)]
    Organize(#[from] OrganizeError),
    #[error(transparent)]
    Dedupe(#[from] DedupeError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Nothing to do: no target directory and temp cleanup disabled")]
    NothingToDo,
}

/// What a run does.
#[derive(Debug, Clone)]
pub struct MaintenanceOptions {
    pub organize: bool,
    pub delete_duplicates: bool,
    pub clean_temp: bool,
    pub dry_run: bool,
    pub recursive: bool,
    pub include_empty: bool,
    pub order: PassOrder,
    pub chunk_size: usize,
    pub temp_locations: Vec<PathBuf>,
}

impl Default for MaintenanceOptions {
    fn default() -> Self {
        Self {
            organize: true,
            delete_duplicates: false,
            clean_temp: false,
            dry_run: false,
            recursive: false,
            include_empty: false,
            order: PassOrder::default(),
            chunk_size: crate::hasher::DEFAULT_CHUNK_SIZE,
            temp_locations: Vec::new(),
        }
    }
}

impl MaintenanceOptions {
    /// Options seeded from configuration; CLI flags are applied on top.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            recursive: config.organize.recursive,
            include_empty: config.duplicates.include_empty,
            order: config.run.order,
            chunk_size: config.duplicates.chunk_size,
            temp_locations: config.temp.locations.clone(),
            ..Self::default()
        }
    }
}

/// Aggregate result of one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub files_moved: usize,
    pub files_deleted: usize,
    pub errors: usize,
    pub skipped: usize,
    pub renamed: usize,
    pub duplicate_groups: usize,
    pub bytes_reclaimed: u64,
    pub temp_files_deleted: usize,
    pub temp_bytes_freed: u64,
    pub category_counts: BTreeMap<String, usize>,
    pub dry_run: bool,
}

impl RunSummary {
    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

/// Everything a run needs, resolved once at startup.
pub struct Maintenance {
    categorizer: Categorizer,
    filters: CompiledFilters,
    temp_exclusions: CompiledFilters,
    options: MaintenanceOptions,
    show_progress: bool,
}

impl Maintenance {
    /// Fails with [`ConfigError`] when temp cleanup is requested without
    /// usable safe locations, before anything is touched.
    pub fn new(
        categorizer: Categorizer,
        filters: CompiledFilters,
        temp_exclusions: CompiledFilters,
        options: MaintenanceOptions,
    ) -> Result<Self, ConfigError> {
        if options.clean_temp {
            validate_temp_locations(&options.temp_locations)?;
        }
        Ok(Self {
            categorizer,
            filters,
            temp_exclusions,
            options,
            show_progress: false,
        })
    }

    /// Builds a run from a loaded configuration plus run options.
    pub fn from_config(config: &AppConfig, options: MaintenanceOptions) -> Result<Self, ConfigError> {
        config.validate()?;
        Self::new(
            config.categorizer()?,
            config.compile_filters()?,
            config.compile_temp_exclusions()?,
            options,
        )
    }

    /// Shows a progress bar while hashing.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Runs every enabled pass once.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use pctidy::action_log::TracingSink;
    /// use pctidy::config::AppConfig;
    /// use pctidy::maintenance::{Maintenance, MaintenanceOptions};
    /// use std::path::Path;
    ///
    /// let config = AppConfig::default();
    /// let options = MaintenanceOptions {
    ///     delete_duplicates: true,
    ///     ..MaintenanceOptions::from_config(&config)
    /// };
    /// let maintenance = Maintenance::from_config(&config, options).unwrap();
    /// let summary = maintenance
    ///     .run(Some(Path::new("/home/me/Downloads")), &mut TracingSink)
    ///     .unwrap();
    /// println!("moved {}, deleted {}", summary.files_moved, summary.files_deleted);
    /// ```
    pub fn run(
        &self,
        target_root: Option<&Path>,
        sink: &mut dyn ActionSink,
    ) -> Result<RunSummary, MaintenanceError> {
        let options = &self.options;
        let wants_target = options.organize || options.delete_duplicates;
        if !options.clean_temp && (target_root.is_none() || !wants_target) {
            return Err(MaintenanceError::NothingToDo);
        }

        tracing::info!(
            root = target_root.map(|p| p.display().to_string()),
            dry_run = options.dry_run,
            "starting maintenance run"
        );
        let mut summary = RunSummary {
            dry_run: options.dry_run,
            ..RunSummary::default()
        };

        let mut sink = DistinctSkips::new(sink);

        if let Some(root) = target_root.filter(|_| wants_target) {
            match options.order {
                PassOrder::OrganizeFirst => {
                    let moves = self.organize_pass(root, &mut sink, &mut summary)?;
                    // A dry organize pass leaves the tree as it was; dedupe
                    // has to judge the layout a real run would leave behind.
                    let planned = if options.dry_run { moves } else { Vec::new() };
                    self.dedupe_pass(root, planned, &mut sink, &mut summary)?;
                }
                PassOrder::DedupeFirst => {
                    self.dedupe_pass(root, Vec::new(), &mut sink, &mut summary)?;
                    self.organize_pass(root, &mut sink, &mut summary)?;
                }
            }
        }

        if options.clean_temp {
            let report = TempCleaner::new(
                &options.temp_locations,
                &self.temp_exclusions,
                &mut sink,
                options.dry_run,
            )
            .clean();
            summary.temp_files_deleted += report.files_deleted;
            summary.temp_bytes_freed += report.bytes_freed;
            summary.errors += report.errors;
        }
        summary.skipped = sink.skipped();

        tracing::info!(
            moved = summary.files_moved,
            deleted = summary.files_deleted,
            temp_deleted = summary.temp_files_deleted,
            errors = summary.errors,
            "maintenance run finished"
        );
        Ok(summary)
    }

    /// Returns the `(from, to)` pairs of the moves made or planned.
    fn organize_pass(
        &self,
        root: &Path,
        sink: &mut dyn ActionSink,
        summary: &mut RunSummary,
    ) -> Result<Vec<(PathBuf, PathBuf)>, MaintenanceError> {
        if !self.options.organize {
            return Ok(Vec::new());
        }
        let report = Organizer::new(
            &self.categorizer,
            &self.filters,
            sink,
            OrganizeOptions {
                recursive: self.options.recursive,
                dry_run: self.options.dry_run,
            },
        )
        .organize(root)?;

        summary.files_moved += report.files_moved();
        summary.renamed += report.renamed();
        summary.errors += report.errors;
        for (category, count) in report.category_counts() {
            *summary.category_counts.entry(category).or_insert(0) += count;
        }
        Ok(report
            .operations
            .into_iter()
            .map(|op| (op.original_path, op.new_path))
            .collect())
    }

    fn dedupe_pass(
        &self,
        root: &Path,
        planned: Vec<(PathBuf, PathBuf)>,
        sink: &mut dyn ActionSink,
        summary: &mut RunSummary,
    ) -> Result<(), MaintenanceError> {
        if !self.options.delete_duplicates {
            return Ok(());
        }
        let mut detector = DuplicateDetector::new(
            FileHasher::new(self.options.chunk_size),
            &self.filters,
            sink,
            DedupeOptions {
                dry_run: self.options.dry_run,
                include_empty: self.options.include_empty,
            },
        )
        .with_planned_layout(planned);
        if self.show_progress {
            detector = detector.with_progress(OutputFormatter::create_progress_bar(0));
        }
        let report = detector.run(root)?;

        summary.files_deleted += report.files_deleted;
        summary.duplicate_groups += report.groups;
        summary.bytes_reclaimed += report.bytes_reclaimed;
        summary.errors += report.errors;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action_log::{Action, MemorySink};
    use std::fs;
    use tempfile::TempDir;

    fn maintenance(options: MaintenanceOptions) -> Maintenance {
        Maintenance::from_config(&AppConfig::default(), options).expect("valid config")
    }

    #[test]
    fn test_organize_then_dedupe() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::write(root.join("a.txt"), "X").unwrap();
        fs::write(root.join("b.txt"), "X").unwrap();
        fs::write(root.join("c.jpg"), "Y").unwrap();

        let mut sink = MemorySink::new();
        let summary = maintenance(MaintenanceOptions {
            delete_duplicates: true,
            ..MaintenanceOptions::default()
        })
        .run(Some(root), &mut sink)
        .unwrap();

        assert_eq!(summary.files_moved, 3);
        assert_eq!(summary.files_deleted, 1);
        assert_eq!(summary.errors, 0);
        assert_eq!(summary.category_counts.get("Documents"), Some(&2));
        assert!(root.join("Documents").join("a.txt").exists());
        assert!(!root.join("Documents").join("b.txt").exists());
        assert!(root.join("Images").join("c.jpg").exists());
    }

    #[test]
    fn test_dedupe_first_moves_fewer_files() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::write(root.join("a.txt"), "X").unwrap();
        fs::write(root.join("b.txt"), "X").unwrap();

        let mut sink = MemorySink::new();
        let summary = maintenance(MaintenanceOptions {
            delete_duplicates: true,
            order: PassOrder::DedupeFirst,
            ..MaintenanceOptions::default()
        })
        .run(Some(root), &mut sink)
        .unwrap();

        assert_eq!(summary.files_deleted, 1);
        assert_eq!(summary.files_moved, 1);
        let first_action = sink.records.iter().find(|r| r.action != Action::Skipped);
        assert_eq!(first_action.map(|r| r.action), Some(Action::Deleted));
    }

    #[test]
    fn test_dry_run_summary_without_mutation() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::write(root.join("a.png"), "P").unwrap();
        fs::write(root.join("b.png"), "P").unwrap();

        let mut sink = MemorySink::new();
        let summary = maintenance(MaintenanceOptions {
            delete_duplicates: true,
            dry_run: true,
            ..MaintenanceOptions::default()
        })
        .run(Some(root), &mut sink)
        .unwrap();

        assert!(summary.dry_run);
        assert_eq!(summary.files_moved, 2);
        assert_eq!(summary.files_deleted, 1);
        assert!(root.join("a.png").exists());
        assert!(root.join("b.png").exists());
        assert!(!root.join("Images").exists());
    }

    fn deleted_relative(sink: &MemorySink, root: &Path) -> Vec<(PathBuf, PathBuf)> {
        sink.of_action(Action::Deleted)
            .map(|r| {
                let survivor = r.survivor.clone().unwrap_or_default();
                (
                    r.path.strip_prefix(root).unwrap().to_path_buf(),
                    survivor.strip_prefix(root).unwrap().to_path_buf(),
                )
            })
            .collect()
    }

    #[test]
    fn test_dry_run_reports_the_deletions_a_real_run_makes() {
        let options = MaintenanceOptions {
            delete_duplicates: true,
            ..MaintenanceOptions::default()
        };
        let populate = |root: &Path| {
            fs::write(root.join("a.jpg"), "SAME").unwrap();
            fs::write(root.join("b.txt"), "SAME").unwrap();
            fs::write(root.join("c.txt"), "OTHER").unwrap();
        };

        let dry_dir = TempDir::new().expect("Failed to create temp directory");
        populate(dry_dir.path());
        let mut dry_sink = MemorySink::new();
        let dry = maintenance(MaintenanceOptions {
            dry_run: true,
            ..options.clone()
        })
        .run(Some(dry_dir.path()), &mut dry_sink)
        .unwrap();

        let real_dir = TempDir::new().expect("Failed to create temp directory");
        populate(real_dir.path());
        let mut real_sink = MemorySink::new();
        let real = maintenance(options)
            .run(Some(real_dir.path()), &mut real_sink)
            .unwrap();

        assert_eq!(dry.files_deleted, real.files_deleted);
        assert_eq!(dry.errors, 0);
        let expected = vec![(
            PathBuf::from("Images").join("a.jpg"),
            PathBuf::from("Documents").join("b.txt"),
        )];
        assert_eq!(deleted_relative(&real_sink, real_dir.path()), expected);
        assert_eq!(deleted_relative(&dry_sink, dry_dir.path()), expected);
        assert!(dry_dir.path().join("a.jpg").exists());
    }

    #[test]
    fn test_skipped_files_reported_once_per_run() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::write(root.join(".hidden"), "h").unwrap();
        fs::write(root.join("a.txt"), "X").unwrap();

        for order in [PassOrder::OrganizeFirst, PassOrder::DedupeFirst] {
            let mut sink = MemorySink::new();
            let summary = maintenance(MaintenanceOptions {
                delete_duplicates: true,
                dry_run: true,
                order,
                ..MaintenanceOptions::default()
            })
            .run(Some(root), &mut sink)
            .unwrap();

            assert_eq!(summary.skipped, 1);
            assert_eq!(sink.count(Action::Skipped), 1);
        }
    }

    #[test]
    fn test_clean_temp_requires_locations() {
        let result = Maintenance::from_config(
            &AppConfig::default(),
            MaintenanceOptions {
                clean_temp: true,
                temp_locations: Vec::new(),
                ..MaintenanceOptions::default()
            },
        );
        assert!(matches!(result, Err(ConfigError::MissingSafeLocations)));
    }

    #[test]
    fn test_temp_only_run() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let cache = temp_dir.path().join("cache");
        fs::create_dir(&cache).unwrap();
        fs::write(cache.join("junk.bin"), "1234").unwrap();

        let mut sink = MemorySink::new();
        let summary = maintenance(MaintenanceOptions {
            organize: false,
            clean_temp: true,
            temp_locations: vec![cache.clone()],
            ..MaintenanceOptions::default()
        })
        .run(None, &mut sink)
        .unwrap();

        assert_eq!(summary.temp_files_deleted, 1);
        assert_eq!(summary.temp_bytes_freed, 4);
        assert!(cache.exists());
        assert!(!cache.join("junk.bin").exists());
    }

    #[test]
    fn test_nothing_to_do() {
        let mut sink = MemorySink::new();
        let result = maintenance(MaintenanceOptions::default()).run(None, &mut sink);
        assert!(matches!(result, Err(MaintenanceError::NothingToDo)));
    }

    #[test]
    fn test_invalid_root_is_fatal() {
        let mut sink = MemorySink::new();
        let result = maintenance(MaintenanceOptions::default())
            .run(Some(Path::new("/non/existent/path")), &mut sink);
        assert!(matches!(result, Err(MaintenanceError::Organize(_))));
    }

    #[test]
    fn test_pass_order_serde_names() {
        let order: PassOrder = serde_json::from_str("\"dedupe-first\"").unwrap();
        assert_eq!(order, PassOrder::DedupeFirst);
        assert_eq!(
            serde_json::to_string(&PassOrder::OrganizeFirst).unwrap(),
            "\"organize-first\""
        );
    }
}
