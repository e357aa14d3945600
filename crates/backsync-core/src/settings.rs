use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::config::{ConfigDocument, ConfigValue};
use crate::filter::ExclusionFilter;
use crate::platform;

pub const KEY_BACKUP_TYPE: &str = "backup_type";
pub const KEY_TARGET_DIR: &str = "target_dir";
pub const KEY_SOURCE_DIRS: &str = "source_dirs";
pub const KEY_IGNORE_HIDDEN: &str = "ignore_hidden_files";
pub const KEY_EXCLUDED_DIRS: &str = "excluded_dirs";
pub const KEY_EXCLUDED_TYPES: &str = "excluded_types";
pub const KEY_EXCLUDED_FILES: &str = "excluded_files";

const KNOWN_KEYS: [&str; 7] = [
    KEY_BACKUP_TYPE,
    KEY_TARGET_DIR,
    KEY_SOURCE_DIRS,
    KEY_IGNORE_HIDDEN,
    KEY_EXCLUDED_DIRS,
    KEY_EXCLUDED_TYPES,
    KEY_EXCLUDED_FILES,
];

/// How the target is brought up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupMode {
    /// Copy new and changed files, never delete anything.
    #[default]
    Copy,
    /// Copy, and delete target entries that no longer exist in the source.
    Sync,
}

impl BackupMode {
    pub fn label(self) -> &'static str {
        match self {
            BackupMode::Copy => "COPY",
            BackupMode::Sync => "SYNC",
        }
    }
}

impl fmt::Display for BackupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for BackupMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "copy" => Ok(BackupMode::Copy),
            "sync" => Ok(BackupMode::Sync),
            other => Err(format!("unknown backup type '{other}' (expected copy or sync)")),
        }
    }
}

/// Thresholds and timings used by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineLimits {
    /// Permanent errors tolerated in one directory before the run aborts.
    pub max_errors_per_directory: usize,
    /// Files modified more recently than this are treated as still being written.
    pub write_guard: Duration,
    /// Pause before each retry pass.
    pub retry_interval: Duration,
    /// Retry passes stop once this much time has elapsed.
    pub retry_budget: Duration,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_errors_per_directory: 3,
            write_guard: Duration::from_millis(500),
            retry_interval: Duration::from_millis(500),
            retry_budget: Duration::from_millis(3000),
        }
    }
}

/// A setting that prevents a run from starting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidSetting {
    pub key: String,
    pub reason: String,
}

impl InvalidSetting {
    fn new(key: &str, reason: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for InvalidSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.reason)
    }
}

/// Everything a backup run needs to know. Read-only to the engine.
#[derive(Debug, Clone)]
pub struct Settings {
    pub mode: BackupMode,
    pub target_root: PathBuf,
    pub source_roots: Vec<PathBuf>,
    pub ignore_hidden: bool,
    pub filter: ExclusionFilter,
    pub limits: EngineLimits,
    /// Problems found while reading the configuration document.
    config_problems: Vec<InvalidSetting>,
}

impl Settings {
    pub fn new<P: Into<PathBuf>>(
        mode: BackupMode,
        target_root: P,
        source_roots: Vec<PathBuf>,
    ) -> Self {
        Self {
            mode,
            target_root: target_root.into(),
            source_roots,
            ignore_hidden: true,
            filter: ExclusionFilter::default(),
            limits: EngineLimits::default(),
            config_problems: Vec::new(),
        }
    }

    /// Force the run mode, superseding any `backup_type` in the document.
    pub fn with_mode(mut self, mode: BackupMode) -> Self {
        self.mode = mode;
        self.config_problems
            .retain(|problem| problem.key != KEY_BACKUP_TYPE);
        self
    }

    pub fn with_ignore_hidden(mut self, ignore_hidden: bool) -> Self {
        self.ignore_hidden = ignore_hidden;
        self
    }

    pub fn with_filter(mut self, filter: ExclusionFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_limits(mut self, limits: EngineLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Build settings from a parsed configuration document.
    ///
    /// Never fails: anything missing or malformed is recorded and surfaces
    /// through [`Settings::invalid_settings`].
    pub fn from_document(doc: &ConfigDocument) -> Self {
        let mut problems = Vec::new();

        for key in doc.keys() {
            if !KNOWN_KEYS.contains(&key) {
                log::warn!("ignoring unknown configuration key '{key}'");
            }
        }

        let mode = match scalar(doc, KEY_BACKUP_TYPE, &mut problems) {
            Some(value) => value.parse().unwrap_or_else(|reason: String| {
                problems.push(InvalidSetting::new(KEY_BACKUP_TYPE, reason));
                BackupMode::default()
            }),
            None => {
                problems.push(InvalidSetting::new(KEY_BACKUP_TYPE, "backup type not specified"));
                BackupMode::default()
            }
        };

        let target_root = scalar(doc, KEY_TARGET_DIR, &mut problems)
            .map(PathBuf::from)
            .unwrap_or_default();

        let source_roots = sequence(doc, KEY_SOURCE_DIRS, &mut problems)
            .into_iter()
            .map(PathBuf::from)
            .collect();

        let ignore_hidden = match scalar(doc, KEY_IGNORE_HIDDEN, &mut problems) {
            Some(value) => parse_bool(&value).unwrap_or_else(|| {
                problems.push(InvalidSetting::new(
                    KEY_IGNORE_HIDDEN,
                    format!("'{value}' is not a boolean"),
                ));
                true
            }),
            None => true,
        };

        let filter = ExclusionFilter::new(
            sequence(doc, KEY_EXCLUDED_DIRS, &mut problems),
            sequence(doc, KEY_EXCLUDED_TYPES, &mut problems),
            sequence(doc, KEY_EXCLUDED_FILES, &mut problems),
        );

        Self {
            mode,
            target_root,
            source_roots,
            ignore_hidden,
            filter,
            limits: EngineLimits::default(),
            config_problems: problems,
        }
    }

    pub fn is_file_excluded(&self, path: &Path) -> bool {
        self.filter.is_file_excluded(path)
    }

    pub fn is_directory_excluded(&self, name: &str) -> bool {
        self.filter.is_directory_excluded(name)
    }

    /// All reasons these settings cannot be used for a run.
    pub fn invalid_settings(&self) -> Vec<InvalidSetting> {
        let mut invalid = self.config_problems.clone();

        if self.target_root.as_os_str().is_empty() {
            invalid.push(InvalidSetting::new(
                KEY_TARGET_DIR,
                "target directory not specified",
            ));
        }

        if self.source_roots.is_empty() {
            invalid.push(InvalidSetting::new(
                KEY_SOURCE_DIRS,
                "no source directories specified",
            ));
        }

        let target = (!self.target_root.as_os_str().is_empty())
            .then(|| platform::normalize(&self.target_root).ok())
            .flatten();

        for source in &self.source_roots {
            if source.as_os_str().is_empty() {
                invalid.push(InvalidSetting::new(
                    KEY_SOURCE_DIRS,
                    "empty source directory entry",
                ));
                continue;
            }
            if !source.is_dir() {
                invalid.push(InvalidSetting::new(
                    KEY_SOURCE_DIRS,
                    format!("source directory does not exist: {}", source.display()),
                ));
                continue;
            }
            if let (Some(target), Ok(source_abs)) = (&target, platform::normalize(source)) {
                if target.starts_with(&source_abs) {
                    invalid.push(InvalidSetting::new(
                        KEY_TARGET_DIR,
                        format!(
                            "target directory lies inside source directory {}",
                            source.display()
                        ),
                    ));
                }
            }
        }

        invalid
    }

    pub fn is_valid(&self) -> bool {
        self.invalid_settings().is_empty()
    }
}

fn scalar(doc: &ConfigDocument, key: &str, problems: &mut Vec<InvalidSetting>) -> Option<String> {
    match doc.get(key)? {
        ConfigValue::Scalar(value) => Some(value.clone()),
        ConfigValue::Sequence(_) => {
            problems.push(InvalidSetting::new(key, "expected a single value, found a list"));
            None
        }
    }
}

fn sequence(doc: &ConfigDocument, key: &str, problems: &mut Vec<InvalidSetting>) -> Vec<String> {
    match doc.get(key) {
        None => Vec::new(),
        Some(ConfigValue::Sequence(items)) => {
            items.iter().filter(|i| !i.is_empty()).cloned().collect()
        }
        // A lone value is accepted as a one-item list
        Some(ConfigValue::Scalar(value)) if !value.is_empty() => vec![value.clone()],
        Some(ConfigValue::Scalar(_)) => {
            problems.push(InvalidSetting::new(key, "expected a list"));
            Vec::new()
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}
