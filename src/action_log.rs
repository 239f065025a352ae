//! Structured records of what a maintenance pass did.
//!
//! Passes never write to a global logger. They receive an [`ActionSink`] and
//! push one [`ActionRecord`] per move, deletion, skip or failure. The CLI fans
//! records out to `tracing` and, optionally, to an append-only JSON-lines file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// What happened to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Moved,
    Deleted,
    Skipped,
    Error,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Moved => "moved",
            Action::Deleted => "deleted",
            Action::Skipped => "skipped",
            Action::Error => "error",
        }
    }
}

/// One line in the action log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub timestamp: DateTime<Utc>,
    pub action: Action,
    /// The file acted upon.
    pub path: PathBuf,
    /// Where a moved file ended up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    /// The copy kept when `path` was deleted as a duplicate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survivor: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// True when the action was only simulated.
    #[serde(default)]
    pub dry_run: bool,
}

impl ActionRecord {
    fn new(action: Action, path: &Path) -> Self {
        Self {
            timestamp: Utc::now(),
            action,
            path: path.to_path_buf(),
            destination: None,
            survivor: None,
            reason: None,
            dry_run: false,
        }
    }

    pub fn moved(source: &Path, destination: &Path) -> Self {
        Self {
            destination: Some(destination.to_path_buf()),
            ..Self::new(Action::Moved, source)
        }
    }

    pub fn deleted(path: &Path) -> Self {
        Self::new(Action::Deleted, path)
    }

    pub fn duplicate_deleted(path: &Path, survivor: &Path) -> Self {
        Self {
            survivor: Some(survivor.to_path_buf()),
            reason: Some("duplicate content".to_string()),
            ..Self::new(Action::Deleted, path)
        }
    }

    pub fn skipped(path: &Path, reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::new(Action::Skipped, path)
        }
    }

    pub fn error(path: &Path, reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::new(Action::Error, path)
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Destination for action records.
///
/// Sinks must not fail the pass that feeds them; a sink that cannot write
/// reports the problem through `tracing` and carries on.
pub trait ActionSink {
    fn record(&mut self, record: ActionRecord);
}

impl<S: ActionSink + ?Sized> ActionSink for &mut S {
    fn record(&mut self, record: ActionRecord) {
        (**self).record(record)
    }
}

impl<S: ActionSink + ?Sized> ActionSink for Box<S> {
    fn record(&mut self, record: ActionRecord) {
        (**self).record(record)
    }
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub records: Vec<ActionRecord>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records with the given action, in emission order.
    pub fn of_action(&self, action: Action) -> impl Iterator<Item = &ActionRecord> {
        self.records.iter().filter(move |r| r.action == action)
    }

    pub fn count(&self, action: Action) -> usize {
        self.of_action(action).count()
    }
}

impl ActionSink for MemorySink {
    fn record(&mut self, record: ActionRecord) {
        self.records.push(record);
    }
}

/// Emits each record as a `tracing` event under the `pctidy::action` target.
#[derive(Debug, Default)]
pub struct TracingSink;

impl ActionSink for TracingSink {
    fn record(&mut self, record: ActionRecord) {
        let path = record.path.display();
        let destination = record.destination.as_ref().map(|p| p.display().to_string());
        let survivor = record.survivor.as_ref().map(|p| p.display().to_string());
        let reason = record.reason.as_deref();
        match record.action {
            Action::Moved | Action::Deleted => tracing::info!(
                target: "pctidy::action",
                action = record.action.as_str(),
                dry_run = record.dry_run,
                %path,
                destination,
                survivor,
                reason
            ),
            Action::Skipped => tracing::debug!(
                target: "pctidy::action",
                action = record.action.as_str(),
                %path,
                reason
            ),
            Action::Error => tracing::warn!(
                target: "pctidy::action",
                action = record.action.as_str(),
                %path,
                reason
            ),
        }
    }
}

/// Appends records to a file, one JSON object per line.
pub struct JsonLinesSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonLinesSink {
    /// Opens `path` for appending, creating it and its parent directory if needed.
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads back every record in a JSON-lines action log.
    pub fn read_all(path: &Path) -> io::Result<Vec<ActionRecord>> {
        fs::read_to_string(path)?
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
            })
            .collect()
    }

    fn write_record(&mut self, record: &ActionRecord) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        // Records are flushed one by one so a killed run still leaves a usable log.
        self.writer.flush()
    }
}

impl ActionSink for JsonLinesSink {
    fn record(&mut self, record: ActionRecord) {
        if let Err(e) = self.write_record(&record) {
            tracing::warn!(path = %self.path.display(), error = %e, "could not append to action log");
        }
    }
}

/// Forwards every record to each inner sink.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn ActionSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl ActionSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl ActionSink for FanoutSink {
    fn record(&mut self, record: ActionRecord) {
        if let Some((last, rest)) = self.sinks.split_last_mut() {
            for sink in rest {
                sink.record(record.clone());
            }
            last.record(record);
        }
    }
}

/// Forwards records to `inner`, dropping `skipped` records for paths that
/// were already reported as skipped.
///
/// Several passes over the same tree see the same filtered files; one run
/// reports each of them once.
pub struct DistinctSkips<'a> {
    inner: &'a mut dyn ActionSink,
    seen: HashSet<PathBuf>,
}

impl<'a> DistinctSkips<'a> {
    pub fn new(inner: &'a mut dyn ActionSink) -> Self {
        Self {
            inner,
            seen: HashSet::new(),
        }
    }

    /// Distinct paths reported as skipped so far.
    pub fn skipped(&self) -> usize {
        self.seen.len()
    }
}

impl ActionSink for DistinctSkips<'_> {
    fn record(&mut self, record: ActionRecord) {
        if record.action == Action::Skipped && !self.seen.insert(record.path.clone()) {
            return;
        }
        self.inner.record(record);
    }
}
