//! Per-file copy outcomes and their retry classification.
//!
//! Every file the engine looks at ends in exactly one [`CopyOutcome`]:
//! - Success: `Copied`
//! - Normal skips: `AlreadyUpToDate`, `Ineligible`
//! - Retryable: `WriteInProgress`, `TransientIOError` (the cause may go away on its own)
//! - Permanent: `PathTooLong`, `FatalError` (a retry cannot change the result)

use serde::Serialize;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use crate::platform;

/// Result of deciding (and possibly performing) the copy of one source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyOutcome {
    /// File was written to the target.
    Copied,
    /// Target already holds a file with the same modification time.
    AlreadyUpToDate,
    /// Hidden file while hidden files are ignored.
    Ineligible,
    /// Source was modified too recently to trust; another process may still be writing it.
    WriteInProgress,
    /// Target path exceeds the platform limit.
    PathTooLong,
    /// I/O failure that may resolve itself (lock, permission, busy device).
    TransientIOError,
    /// Failure that is neither a path limit nor plausible contention.
    FatalError,
}

impl CopyOutcome {
    /// Whether this outcome is reported as an error at the end of a run.
    pub fn is_error(self) -> bool {
        !matches!(
            self,
            CopyOutcome::Copied | CopyOutcome::AlreadyUpToDate | CopyOutcome::Ineligible
        )
    }

    /// Whether the retry coordinator should re-attempt a file with this outcome.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            CopyOutcome::WriteInProgress | CopyOutcome::TransientIOError
        )
    }

    /// Errors that count towards the per-directory abort threshold.
    pub fn counts_towards_abort(self) -> bool {
        self.is_error() && !self.is_retryable()
    }

    /// Human readable label used when grouping errors in the summary.
    pub fn description(self) -> &'static str {
        match self {
            CopyOutcome::Copied => "copied",
            CopyOutcome::AlreadyUpToDate => "already backed up",
            CopyOutcome::Ineligible => "ineligible",
            CopyOutcome::WriteInProgress => "file write in progress",
            CopyOutcome::PathTooLong => "path too long",
            CopyOutcome::TransientIOError => "I/O error",
            CopyOutcome::FatalError => "unexpected error",
        }
    }
}

impl fmt::Display for CopyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Classify an I/O error raised while copying a file.
pub fn classify_io_error(err: &io::Error) -> CopyOutcome {
    if platform::is_path_too_long(err) {
        return CopyOutcome::PathTooLong;
    }

    match err.kind() {
        // Retrying cannot fix malformed input or an unsupported operation
        io::ErrorKind::InvalidInput
        | io::ErrorKind::InvalidData
        | io::ErrorKind::Unsupported
        | io::ErrorKind::OutOfMemory => CopyOutcome::FatalError,

        // Locks, sharing violations, permission flips, devices coming back
        _ => CopyOutcome::TransientIOError,
    }
}

/// A file that did not make it into the target during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    pub outcome: CopyOutcome,
    pub source_file: PathBuf,
    pub target_dir: PathBuf,
}

impl ErrorRecord {
    pub fn new(outcome: CopyOutcome, source_file: &Path, target_dir: &Path) -> Self {
        Self {
            outcome,
            source_file: source_file.to_path_buf(),
            target_dir: target_dir.to_path_buf(),
        }
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source_file.display(), self.outcome)
    }
}

/// Run-terminating failure: a single directory produced more permanent
/// errors than the configured threshold.
#[derive(Debug)]
pub struct ExcessiveErrors {
    /// Source directory whose file batch tripped the threshold.
    pub directory: PathBuf,
    /// Number of permanent errors seen in that batch.
    pub errors: usize,
}

impl fmt::Display for ExcessiveErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "backup aborted due to excessive errors ({} in {})",
            self.errors,
            self.directory.display()
        )
    }
}

impl std::error::Error for ExcessiveErrors {}
