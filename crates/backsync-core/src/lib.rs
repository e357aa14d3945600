//! Backup and mirror engine.
//!
//! A run walks each source root depth-first, copies files whose modification
//! time differs from the target copy, optionally prunes target entries that
//! vanished from the source (sync mode), retries transient failures for a
//! bounded time, and reports what could not be backed up.

pub mod config;
pub mod decide;
pub mod events;
pub mod filter;
pub mod outcome;
pub mod platform;
pub mod retry;
pub mod settings;
pub mod summary;
pub mod sync;
pub mod task;
pub mod traversal;

pub use config::{ConfigDocument, ConfigValue};
pub use decide::{CopyDecisionEngine, FileDecider};
pub use events::{EventLog, LogEvent};
pub use filter::ExclusionFilter;
pub use outcome::{classify_io_error, CopyOutcome, ErrorRecord, ExcessiveErrors};
pub use settings::{BackupMode, EngineLimits, InvalidSetting, Settings};
pub use summary::{DirectoryError, RunSummary};
pub use task::{BackupTask, RunState};
