use chrono::{DateTime, Utc};
use eyre::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::outcome::{CopyOutcome, ErrorRecord};
use crate::settings::{BackupMode, InvalidSetting};

/// A source directory that could not be read; its subtree was skipped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DirectoryError {
    pub path: PathBuf,
    pub message: String,
}

/// Outcome of one backup run.
#[derive(Clone, Debug, Serialize)]
pub struct RunSummary {
    pub mode: BackupMode,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Files written, including the ones that succeeded on retry.
    pub files_copied: usize,
    /// Files that only succeeded during the retry phase.
    pub files_retried: usize,
    pub deleted_files: usize,
    pub deleted_dirs: usize,
    /// Files that could not be backed up, grouped by outcome once the run reports.
    pub errors: Vec<ErrorRecord>,
    pub directory_errors: Vec<DirectoryError>,
    pub invalid_settings: Vec<InvalidSetting>,
    /// Set when the run stopped early on a fatal condition.
    pub abort_reason: Option<String>,
}

impl RunSummary {
    pub fn new(mode: BackupMode) -> Self {
        Self {
            mode,
            started_at: Utc::now(),
            duration_ms: 0,
            files_copied: 0,
            files_retried: 0,
            deleted_files: 0,
            deleted_dirs: 0,
            errors: Vec::new(),
            directory_errors: Vec::new(),
            invalid_settings: Vec::new(),
            abort_reason: None,
        }
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn grouped_errors(&self) -> BTreeMap<CopyOutcome, Vec<&ErrorRecord>> {
        let mut groups: BTreeMap<CopyOutcome, Vec<&ErrorRecord>> = BTreeMap::new();
        for record in &self.errors {
            groups.entry(record.outcome).or_default().push(record);
        }
        groups
    }

    pub fn aborted(&self) -> bool {
        self.abort_reason.is_some()
    }

    pub fn settings_valid(&self) -> bool {
        self.invalid_settings.is_empty()
    }

    pub fn completed_without_error(&self) -> bool {
        self.settings_valid()
            && !self.aborted()
            && self.errors.is_empty()
            && self.directory_errors.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
