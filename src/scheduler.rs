//! Fixed-interval driver for recurring maintenance runs.
//!
//! The scheduler owns the interval and calls a job on its own thread, one run
//! at a time. A trigger that fires while a run is still going is dropped, not
//! queued: when a run overruns the interval, the next run starts at the next
//! tick after it finishes.

use crossbeam_channel::{Receiver, tick};
use std::fmt::Display;
use std::time::{Duration, Instant};

pub struct Scheduler {
    interval: Duration,
    run_on_start: bool,
    max_runs: Option<usize>,
}

/// What happened over the lifetime of a schedule.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScheduleReport {
    pub runs: usize,
    pub failed_runs: usize,
    /// Triggers discarded because a run was in progress.
    pub dropped_triggers: usize,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            run_on_start: false,
            max_runs: None,
        }
    }

    /// Runs once immediately instead of waiting a full interval first.
    pub fn run_on_start(mut self, run_on_start: bool) -> Self {
        self.run_on_start = run_on_start;
        self
    }

    /// Stops after `max_runs` runs; `None` runs until the process exits.
    pub fn max_runs(mut self, max_runs: Option<usize>) -> Self {
        self.max_runs = max_runs;
        self
    }

    /// Drives `job` until `max_runs` is reached (forever when unset).
    ///
    /// A failing run is logged and the schedule carries on.
    pub fn run<F, E>(&self, mut job: F) -> ScheduleReport
    where
        F: FnMut(usize) -> Result<(), E>,
        E: Display,
    {
        let ticker = tick(self.interval);
        let mut report = ScheduleReport::default();
        tracing::info!(interval_secs = self.interval.as_secs_f64(), "schedule started");

        if self.run_on_start {
            self.run_once(&mut job, &ticker, &mut report);
        }

        while !self.finished(&report) {
            if ticker.recv().is_err() {
                break;
            }
            self.run_once(&mut job, &ticker, &mut report);
        }

        tracing::info!(
            runs = report.runs,
            failed = report.failed_runs,
            dropped = report.dropped_triggers,
            "schedule finished"
        );
        report
    }

    fn finished(&self, report: &ScheduleReport) -> bool {
        self.max_runs.is_some_and(|max| report.runs >= max)
    }

    fn run_once<F, E>(&self, job: &mut F, ticker: &Receiver<Instant>, report: &mut ScheduleReport)
    where
        F: FnMut(usize) -> Result<(), E>,
        E: Display,
    {
        if self.finished(report) {
            return;
        }
        let run_number = report.runs + 1;
        let started = Instant::now();
        tracing::info!(run = run_number, "scheduled run starting");
        if let Err(e) = job(run_number) {
            tracing::error!(run = run_number, error = %e, "scheduled run failed");
            report.failed_runs += 1;
        }
        report.runs += 1;

        let dropped = ticker.try_iter().count();
        if dropped > 0 {
            tracing::debug!(
                run = run_number,
                dropped,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "dropped triggers that fired during the run"
            );
            report.dropped_triggers += dropped;
        }
    }
}
