use crossbeam_channel::Receiver;
use eyre::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use crate::decide::{CopyDecisionEngine, FileDecider};
use crate::events::{EventLog, LogEvent};
use crate::outcome::{CopyOutcome, ErrorRecord};
use crate::retry::RetryCoordinator;
use crate::settings::{BackupMode, Settings};
use crate::summary::RunSummary;
use crate::sync::SyncReconciler;
use crate::traversal::Traversal;

/// Phase of a [`BackupTask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Validating,
    Running,
    RetryingErrors,
    Reporting,
}

/// Runs one backup at a time and keeps the result of the last run for inspection.
///
/// A task owns all per-run state; nothing carries over between runs except
/// what was written to the target. Runs against the same target root must be
/// serialised by the caller.
pub struct BackupTask {
    state: RunState,
    events: Arc<EventLog>,
    summary: RunSummary,
}

impl Default for BackupTask {
    fn default() -> Self {
        Self::new()
    }
}

impl BackupTask {
    pub fn new() -> Self {
        Self {
            state: RunState::Idle,
            events: Arc::new(EventLog::new()),
            summary: RunSummary::new(BackupMode::default()),
        }
    }

    /// Receive the `(message, detail)` events of subsequent runs.
    pub fn subscribe(&self) -> Receiver<LogEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn error_count(&self) -> usize {
        self.summary.error_count()
    }

    pub fn errors(&self) -> &[ErrorRecord] {
        &self.summary.errors
    }

    pub fn errors_by_outcome(&self) -> BTreeMap<CopyOutcome, Vec<&ErrorRecord>> {
        self.summary.grouped_errors()
    }

    pub fn completed_without_error(&self) -> bool {
        self.summary.completed_without_error()
    }

    /// Run a backup against the filesystem. Returns the number of files copied.
    ///
    /// Invalid settings are not an `Err`: the run reports zero files and the
    /// problems end up in [`RunSummary::invalid_settings`]. An `Err` means the
    /// run was terminated, e.g. by [`crate::ExcessiveErrors`].
    pub fn run(&mut self, settings: &Settings) -> Result<usize> {
        let events = Arc::clone(&self.events);
        let engine = CopyDecisionEngine::new(settings, &events);
        self.run_with(settings, &engine)
    }

    /// Like [`BackupTask::run`], with a caller supplied decider.
    pub fn run_with<D: FileDecider>(&mut self, settings: &Settings, decider: &D) -> Result<usize> {
        let started = Instant::now();
        let events = Arc::clone(&self.events);
        self.summary = RunSummary::new(settings.mode);

        self.state = RunState::Validating;
        let invalid = settings.invalid_settings();
        if !invalid.is_empty() {
            for problem in &invalid {
                events.warn("INVALID SETTING", problem);
            }
            self.summary.invalid_settings = invalid;
            self.finish(started);
            return Ok(0);
        }

        self.state = RunState::Running;
        events.info("Running backup", settings.mode);

        let traversal = Traversal::new(settings, decider, &events);
        let traversed = match settings.mode {
            BackupMode::Copy => traversal.copy_all(&mut self.summary),
            BackupMode::Sync => SyncReconciler::new(traversal).sync_all(&mut self.summary),
        };

        if let Err(report) = traversed {
            events.warn("ABORTED", format!("{report:#}"));
            self.summary.abort_reason = Some(format!("{report:#}"));
            self.finish(started);
            return Err(report);
        }

        self.state = RunState::RetryingErrors;
        let retried = RetryCoordinator::new(decider, settings.limits, &events)
            .retry(&mut self.summary.errors);

        self.summary.files_copied += retried;
        self.summary.files_retried = retried;

        self.finish(started);
        events.info(
            "COMPLETE",
            format!("Backed up {} files", self.summary.files_copied),
        );

        Ok(self.summary.files_copied)
    }

    fn finish(&mut self, started: Instant) {
        self.state = RunState::Reporting;

        self.summary.errors.sort_by_key(|record| record.outcome);
        for (outcome, records) in self.summary.grouped_errors() {
            self.events
                .warn(&format!("Unable to backup ({outcome})"), records.len());
            for record in records {
                self.events
                    .warn(&record.source_file.display().to_string(), "");
            }
        }

        self.summary.duration_ms =
            u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.state = RunState::Idle;
    }
}
