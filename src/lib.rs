//! pctidy - routine maintenance for a personal computer
//!
//! This library organizes a directory into category folders by file
//! extension, removes files whose content duplicates another file, purges
//! configured temp locations, and can repeat all of it on a fixed schedule.
//! Every change is reported to an [`action_log::ActionSink`].

pub mod action_log;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod file_category;
pub mod file_organizer;
pub mod hasher;
pub mod logging;
pub mod maintenance;
pub mod output;
pub mod scanner;
pub mod scheduler;
pub mod temp_cleaner;

pub use action_log::{Action, ActionRecord, ActionSink};
pub use config::{AppConfig, CompiledFilters, ConfigError};
pub use duplicates::{DuplicateDetector, DuplicateGroup};
pub use file_category::{CategoryRule, Categorizer};
pub use file_organizer::Organizer;
pub use hasher::{FileHasher, Fingerprint};
pub use maintenance::{Maintenance, MaintenanceError, MaintenanceOptions, RunSummary};
pub use scheduler::Scheduler;

pub use cli::{Cli, run_cli};
