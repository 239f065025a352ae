//! Configuration loading, validation and file filtering.
//!
//! Everything the maintenance passes need is read once at startup from a TOML
//! file and never mutated afterwards. Any problem found here is fatal and is
//! reported before a single file is touched.
//!
//! # Configuration File Format
//!
//! ```toml
//! default_category = "Other"
//!
//! [[categories]]
//! name = "Images"
//! extensions = ["jpg", "jpeg", "png"]
//!
//! [filters]
//! enable_hidden_files = false
//!
//! [filters.exclude]
//! filenames = ["Thumbs.db"]
//! patterns = ["*.part"]
//! extensions = ["crdownload"]
//! regex = []
//!
//! [filters.include]
//! patterns = []
//!
//! [organize]
//! recursive = false
//!
//! [duplicates]
//! include_empty = false
//! chunk_size = 65536
//!
//! [temp]
//! locations = ["/tmp"]
//! exclude = ["*.lock"]
//!
//! [run]
//! order = "organize-first"
//!
//! [schedule]
//! interval_hours = 24
//! run_on_start = false
//!
//! [logging]
//! level = "info"
//! log_file = "pc_cleaner.log"
//! ```

use crate::file_category::{Categorizer, CategoryRule, DEFAULT_CATEGORY};
use crate::hasher::DEFAULT_CHUNK_SIZE;
use crate::maintenance::PassOrder;
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Name of the per-directory configuration file.
pub const LOCAL_CONFIG_FILE: &str = ".pctidyrc.toml";

/// Errors that can occur during configuration loading and validation.
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),
    /// Invalid glob pattern provided.
    #[error("Invalid glob pattern '{0}': expected *.ext or dir/**")]
    InvalidGlobPattern(String),
    /// Invalid regex pattern provided with the actual error reason.
    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },
    /// The category table is malformed.
    #[error("Invalid category '{name}': {reason}")]
    InvalidCategory { name: String, reason: String },
    /// Temp cleanup was requested but no safe locations are configured.
    #[error("No safe temp locations configured")]
    MissingSafeLocations,
    /// A configured temp location is not safe to purge.
    #[error("Refusing to use {} as a temp location: {reason}", .path.display())]
    UnsafeLocation { path: PathBuf, reason: String },
    /// A numeric setting is out of range.
    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
    /// IO error while reading configuration.
    #[error("IO error reading configuration: {0}")]
    IoError(String),
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Folder for files whose extension matches no category.
    pub default_category: String,
    /// Ordered category table; the first rule listing an extension wins.
    pub categories: Vec<CategoryRule>,
    pub filters: FilterRules,
    pub organize: OrganizeSettings,
    pub duplicates: DuplicateSettings,
    pub temp: TempSettings,
    pub run: RunSettings,
    pub schedule: ScheduleSettings,
    pub logging: LoggingSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_category: DEFAULT_CATEGORY.to_string(),
            categories: CategoryRule::standard_rules(),
            filters: FilterRules::default(),
            organize: OrganizeSettings::default(),
            duplicates: DuplicateSettings::default(),
            temp: TempSettings::default(),
            run: RunSettings::default(),
            schedule: ScheduleSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Root-level filter rules configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterRules {
    /// Whether to include hidden files (starting with "."). Defaults to false.
    #[serde(default)]
    pub enable_hidden_files: bool,

    /// Rules for excluding files.
    #[serde(default)]
    pub exclude: ExcludeRules,

    /// Rules for including files (whitelist, overrides exclude rules).
    #[serde(default)]
    pub include: IncludeRules,
}

/// Rules for excluding files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// Exact filenames to exclude (e.g., "desktop.ini", "Thumbs.db").
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns to exclude, matched against the path relative to the scanned root.
    #[serde(default)]
    pub patterns: Vec<String>,

    /// File extensions to exclude (e.g., "part", "crdownload").
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Regex patterns to exclude, matched against the file name.
    #[serde(default)]
    pub regex: Vec<String>,
}

/// Rules for including files, overriding exclude rules (whitelist).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncludeRules {
    #[serde(default)]
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganizeSettings {
    /// Descend into subdirectories (category folders are never entered).
    pub recursive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicateSettings {
    /// Treat zero-length files as duplicates of each other.
    pub include_empty: bool,
    /// Bytes read per step while hashing.
    pub chunk_size: usize,
}

impl Default for DuplicateSettings {
    fn default() -> Self {
        Self {
            include_empty: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TempSettings {
    /// Directories whose contents are disposable.
    pub locations: Vec<PathBuf>,
    /// Glob patterns, relative to each location, that are never deleted.
    pub exclude: Vec<String>,
}

impl Default for TempSettings {
    fn default() -> Self {
        Self {
            locations: default_temp_locations(),
            exclude: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub order: PassOrder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    pub interval_hours: u64,
    /// Run once right away instead of waiting for the first interval.
    pub run_on_start: bool,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            interval_hours: 24,
            run_on_start: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default `tracing` filter; `PCTIDY_LOG` overrides it.
    pub level: String,
    /// Diagnostic log file.
    pub log_file: PathBuf,
    /// Optional JSON-lines file receiving one record per action.
    pub action_log: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_file: PathBuf::from("pc_cleaner.log"),
            action_log: None,
        }
    }
}

/// The platform's usual temp and cache directories.
///
/// Linux: the system temp dir and `~/.cache`. macOS: `~/Library/Caches` and
/// `/private/var/tmp`. Windows: `%TEMP%` and the recent-items list.
pub fn default_temp_locations() -> Vec<PathBuf> {
    let mut locations = Vec::new();
    if cfg!(target_os = "macos") {
        if let Some(home) = dirs::home_dir() {
            locations.push(home.join("Library").join("Caches"));
        }
        locations.push(PathBuf::from("/private/var/tmp"));
    } else if cfg!(windows) {
        locations.push(std::env::temp_dir());
        if let Some(roaming) = dirs::config_dir() {
            locations.push(
                roaming
                    .join("Microsoft")
                    .join("Windows")
                    .join("Recent"),
            );
        }
    } else {
        locations.push(std::env::temp_dir());
        if let Some(cache) = dirs::cache_dir() {
            locations.push(cache);
        }
    }
    locations
}

/// Checks that every temp location may be purged.
///
/// Rejects an empty list, relative paths, filesystem roots and the home
/// directory itself.
pub fn validate_temp_locations(locations: &[PathBuf]) -> Result<(), ConfigError> {
    if locations.is_empty() {
        return Err(ConfigError::MissingSafeLocations);
    }
    let home = dirs::home_dir();
    for location in locations {
        let unsafe_location = |reason: &str| ConfigError::UnsafeLocation {
            path: location.clone(),
            reason: reason.to_string(),
        };
        if !location.is_absolute() {
            return Err(unsafe_location("path is not absolute"));
        }
        if !location
            .components()
            .any(|c| matches!(c, Component::Normal(_)))
        {
            return Err(unsafe_location("path is a filesystem root"));
        }
        if home.as_deref() == Some(location.as_path()) {
            return Err(unsafe_location("path is the home directory"));
        }
    }
    Ok(())
}

impl AppConfig {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.pctidyrc.toml` in the current directory
    /// 3. Look for `pctidy/config.toml` in the user's config directory
    /// 4. Fall back to default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file exists but cannot be read or parsed.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("pctidy").join("config.toml");
            if user_config.exists() {
                return Self::load_from_file(&user_config);
            }
        }

        Ok(Self::default())
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parses configuration from TOML text. Missing sections take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Validates settings that are not covered by compiling the categorizer or filters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.duplicates.chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "duplicates.chunk_size".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.schedule.interval_hours == 0 {
            return Err(ConfigError::InvalidValue {
                key: "schedule.interval_hours".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Builds the categorizer from the category table.
    pub fn categorizer(&self) -> Result<Categorizer, ConfigError> {
        Categorizer::new(self.categories.clone(), &self.default_category)
    }

    /// Compiles the organize/dedupe filters.
    pub fn compile_filters(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(&self.filters)
    }

    /// Compiles the exclusion patterns applied inside temp locations.
    ///
    /// Hidden files are fair game in a temp directory, so only the configured
    /// patterns protect anything.
    pub fn compile_temp_exclusions(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(&FilterRules {
            enable_hidden_files: true,
            exclude: ExcludeRules {
                patterns: self.temp.exclude.clone(),
                ..Default::default()
            },
            include: IncludeRules::default(),
        })
    }
}

/// Compiled, optimized filter structures for efficient file matching.
#[derive(Debug, Clone)]
pub struct CompiledFilters {
    enable_hidden_files: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

fn compile_globs(patterns: &[String]) -> Result<Vec<Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
        })
        .collect()
}

impl CompiledFilters {
    /// Create compiled filters from filter rules.
    ///
    /// # Errors
    ///
    /// Returns an error if any glob or regex patterns are invalid.
    pub fn new(rules: &FilterRules) -> Result<Self, ConfigError> {
        let exclude_regexes = rules
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            enable_hidden_files: rules.enable_hidden_files,
            exclude_filenames: rules.exclude.filenames.iter().cloned().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_patterns: compile_globs(&rules.exclude.patterns)?,
            exclude_regexes,
            include_patterns: compile_globs(&rules.include.patterns)?,
        })
    }

    /// Filters that let everything through except hidden entries.
    pub fn permissive() -> Self {
        Self {
            enable_hidden_files: false,
            exclude_filenames: HashSet::new(),
            exclude_extensions: HashSet::new(),
            exclude_patterns: Vec::new(),
            exclude_regexes: Vec::new(),
            include_patterns: Vec::new(),
        }
    }

    pub fn includes_hidden(&self) -> bool {
        self.enable_hidden_files
    }

    /// Check if a file should be processed (not excluded).
    ///
    /// `file_path` should be relative to the scanned root so that directory
    /// patterns such as `downloads/**` line up.
    ///
    /// Checks are performed in this order, with early termination:
    /// 1. Include patterns (whitelist) - if matched, always include
    /// 2. Hidden file filter - if hidden and disabled, exclude
    /// 3. Exact filename match - if matched, exclude
    /// 4. File extension match - if matched, exclude
    /// 5. Glob pattern match - if matched, exclude
    /// 6. Regex pattern match - if matched, exclude
    /// 7. Default: include
    pub fn should_include(&self, file_path: &Path) -> bool {
        self.exclusion_reason(file_path).is_none()
    }

    /// Like [`should_include`](Self::should_include), but says which rule excluded the file.
    pub fn exclusion_reason(&self, file_path: &Path) -> Option<&'static str> {
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self
            .include_patterns
            .iter()
            .any(|pattern| pattern.matches_path(file_path))
        {
            return None;
        }

        if !self.enable_hidden_files && file_name.starts_with('.') {
            return Some("hidden file");
        }

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return Some("excluded file name");
        }

        if let Some(ext) = file_path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            if self.exclude_extensions.contains(&ext_lower) {
                return Some("excluded extension");
            }
        }

        if self
            .exclude_patterns
            .iter()
            .any(|pattern| pattern.matches_path(file_path))
        {
            return Some("excluded pattern");
        }

        if self
            .exclude_regexes
            .iter()
            .any(|regex| regex.is_match(&file_name))
        {
            return Some("excluded regex");
        }

        None
    }
}
