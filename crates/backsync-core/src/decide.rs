use filetime::{set_file_mtime, FileTime};
use std::fs::{self, Metadata};
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};

use crate::events::EventLog;
use crate::outcome::{classify_io_error, CopyOutcome};
use crate::platform;
use crate::settings::Settings;

/// Decides what happens to a single source file and carries it out.
///
/// Traversal and retry are written against this trait so that failure modes
/// which are hard to provoke on a real filesystem can be injected.
pub trait FileDecider {
    /// Copy `source_file` into `target_dir` (same file name) or explain why not.
    fn decide(&self, source_file: &Path, target_dir: &Path) -> CopyOutcome;
}

/// Filesystem-backed [`FileDecider`].
///
/// Modification times are the only memory of earlier runs: a target file
/// whose mtime equals the source mtime is considered up to date.
pub struct CopyDecisionEngine<'a> {
    ignore_hidden: bool,
    write_guard: Duration,
    events: &'a EventLog,
}

impl<'a> CopyDecisionEngine<'a> {
    pub fn new(settings: &Settings, events: &'a EventLog) -> Self {
        Self {
            ignore_hidden: settings.ignore_hidden,
            write_guard: settings.limits.write_guard,
            events,
        }
    }

    fn write_in_progress(&self, modified: SystemTime) -> bool {
        match SystemTime::now().duration_since(modified) {
            Ok(age) => age < self.write_guard,
            // Modified "in the future": still being touched
            Err(_) => true,
        }
    }

    fn report_failure(&self, source_file: &Path, err: &io::Error) -> CopyOutcome {
        let outcome = classify_io_error(err);
        let detail = format!("{}: {err}", source_file.display());
        match outcome {
            CopyOutcome::PathTooLong => self.events.warn("PATH ERROR", detail),
            _ => self.events.warn("I/O ERROR", detail),
        }
        outcome
    }

    fn copy(
        &self,
        source_file: &Path,
        target_path: &Path,
        existing: Option<&Metadata>,
        modified: SystemTime,
    ) -> io::Result<()> {
        match existing {
            Some(meta) => platform::clear_readonly(target_path, meta)?,
            None => {
                if let Some(dir) = target_path.parent() {
                    if !dir.is_dir() {
                        self.events.info("Creating DIR", dir.display());
                        fs::create_dir_all(dir)?;
                    }
                }
            }
        }

        fs::copy(source_file, target_path)?;
        set_file_mtime(target_path, FileTime::from_system_time(modified))
    }
}

impl FileDecider for CopyDecisionEngine<'_> {
    fn decide(&self, source_file: &Path, target_dir: &Path) -> CopyOutcome {
        let source_meta = match fs::metadata(source_file) {
            Ok(meta) => meta,
            Err(err) => return self.report_failure(source_file, &err),
        };

        if self.ignore_hidden && platform::is_hidden(source_file, &source_meta) {
            return CopyOutcome::Ineligible;
        }

        let modified = match source_meta.modified() {
            Ok(time) => time,
            Err(err) => return self.report_failure(source_file, &err),
        };

        if self.write_in_progress(modified) {
            return CopyOutcome::WriteInProgress;
        }

        let Some(name) = source_file.file_name() else {
            self.events
                .warn("I/O ERROR", format!("{}: no file name", source_file.display()));
            return CopyOutcome::FatalError;
        };
        let target_path = target_dir.join(name);

        let existing = fs::metadata(&target_path).ok().filter(Metadata::is_file);
        if let Some(meta) = &existing {
            if meta.modified().ok() == Some(modified) {
                return CopyOutcome::AlreadyUpToDate;
            }
        }

        self.events.info("Backing up file", source_file.display());
        match self.copy(source_file, &target_path, existing.as_ref(), modified) {
            Ok(()) => CopyOutcome::Copied,
            Err(err) => self.report_failure(source_file, &err),
        }
    }
}
