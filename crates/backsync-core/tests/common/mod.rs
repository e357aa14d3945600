#![allow(dead_code)]

use backsync_core::platform::mirror_subpath;
use backsync_core::{CopyOutcome, EngineLimits, FileDecider};
use filetime::{set_file_mtime, FileTime};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Scratch layout: `<tmp>/src` and `<tmp>/target`.
///
/// Roots sit one level below the temp dir because temp dir names start with
/// a dot and would count as hidden on Unix.
pub struct Scratch {
    pub _temp: tempfile::TempDir,
    pub source: PathBuf,
    pub target: PathBuf,
}

impl Scratch {
    pub fn new() -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let source = temp.path().join("src");
        let target = temp.path().join("target");
        fs::create_dir_all(&source).expect("source dir");
        Self {
            _temp: temp,
            source,
            target,
        }
    }

    pub fn extra_root(&self, name: &str) -> PathBuf {
        let root = self._temp.path().join(name);
        fs::create_dir_all(&root).expect("extra root");
        root
    }

    /// Where `source_root` is mirrored inside the target.
    pub fn mirrored(&self, source_root: &Path) -> PathBuf {
        self.target
            .join(mirror_subpath(source_root).expect("mirror subpath"))
    }
}

/// Write `contents` to `path` and pin its mtime to `secs` after the epoch.
pub fn write_file(path: &Path, contents: &[u8], secs: i64) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("parent dir");
    }
    fs::write(path, contents).expect("write file");
    set_file_mtime(path, FileTime::from_unix_time(secs, 0)).expect("set mtime");
}

pub fn mtime(path: &Path) -> FileTime {
    FileTime::from_last_modification_time(&fs::metadata(path).expect("metadata"))
}

/// Limits short enough to keep retry tests quick.
pub fn fast_limits() -> EngineLimits {
    EngineLimits {
        max_errors_per_directory: 3,
        write_guard: Duration::from_millis(300),
        retry_interval: Duration::from_millis(50),
        retry_budget: Duration::from_millis(600),
    }
}

pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("read dir")
        .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Decider that replays a script of outcomes per file name and records every call.
/// Files without a script are reported as `Copied`.
#[derive(Default)]
pub struct ScriptedDecider {
    scripts: RefCell<HashMap<String, Vec<CopyOutcome>>>,
    pub calls: RefCell<Vec<String>>,
}

impl ScriptedDecider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcomes for successive decisions on `name`; the last one repeats.
    pub fn script(self, name: &str, outcomes: &[CopyOutcome]) -> Self {
        self.scripts
            .borrow_mut()
            .insert(name.to_string(), outcomes.to_vec());
        self
    }

    pub fn calls_for(&self, name: &str) -> usize {
        self.calls.borrow().iter().filter(|c| c.as_str() == name).count()
    }
}

impl FileDecider for ScriptedDecider {
    fn decide(&self, source_file: &Path, _target_dir: &Path) -> CopyOutcome {
        let name = source_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.calls.borrow_mut().push(name.clone());

        let mut scripts = self.scripts.borrow_mut();
        match scripts.get_mut(&name) {
            Some(outcomes) if outcomes.len() > 1 => outcomes.remove(0),
            Some(outcomes) => outcomes.first().copied().unwrap_or(CopyOutcome::Copied),
            None => CopyOutcome::Copied,
        }
    }
}

/// Permission based tests are meaningless for root, which bypasses mode bits.
#[cfg(unix)]
pub fn running_as_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

#[cfg(unix)]
pub fn set_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).expect("set mode");
}
