use std::thread;
use std::time::Instant;

use crate::decide::FileDecider;
use crate::events::EventLog;
use crate::outcome::{CopyOutcome, ErrorRecord};
use crate::settings::EngineLimits;

/// Re-attempts transient failures after a traversal, for a bounded time.
///
/// Each pass waits `retry_interval`, then tries every pending file once.
/// Passes stop when nothing is pending or `retry_budget` has elapsed.
pub struct RetryCoordinator<'a, D: FileDecider> {
    decider: &'a D,
    limits: EngineLimits,
    events: &'a EventLog,
}

impl<'a, D: FileDecider> RetryCoordinator<'a, D> {
    pub fn new(decider: &'a D, limits: EngineLimits, events: &'a EventLog) -> Self {
        Self {
            decider,
            limits,
            events,
        }
    }

    /// Retry the retryable records in `errors`. Resolved records are removed;
    /// the rest stay with the outcome of their latest attempt. Returns the
    /// number of files copied.
    pub fn retry(&self, errors: &mut Vec<ErrorRecord>) -> usize {
        let (mut pending, settled): (Vec<_>, Vec<_>) = errors
            .drain(..)
            .partition(|record| record.outcome.is_retryable());
        *errors = settled;

        if pending.is_empty() {
            return 0;
        }

        self.events
            .info("Re-attempting errors", format!("{} file(s)", pending.len()));

        let started = Instant::now();
        let mut copied = 0;

        while !pending.is_empty() && started.elapsed() < self.limits.retry_budget {
            thread::sleep(self.limits.retry_interval);

            let mut still_pending = Vec::with_capacity(pending.len());
            for mut record in pending.drain(..) {
                match self.decider.decide(&record.source_file, &record.target_dir) {
                    CopyOutcome::Copied => copied += 1,
                    CopyOutcome::AlreadyUpToDate | CopyOutcome::Ineligible => {}
                    outcome => {
                        record.outcome = outcome;
                        if outcome.is_retryable() {
                            still_pending.push(record);
                        } else {
                            errors.push(record);
                        }
                    }
                }
            }
            pending = still_pending;
        }

        if !pending.is_empty() {
            log::debug!(
                "{} file(s) still failing after {:?}",
                pending.len(),
                started.elapsed()
            );
        }
        errors.extend(pending);
        copied
    }
}
