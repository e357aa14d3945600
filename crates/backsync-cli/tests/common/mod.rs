#![allow(dead_code)]

use filetime::{set_file_mtime, FileTime};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Scratch workspace with a source tree, a target root and a config directory.
pub struct TestContext {
    pub _work: tempfile::TempDir,
    pub source: PathBuf,
    pub target: PathBuf,
    pub config_dir: PathBuf,
    pub cli_bin: PathBuf,
}

impl TestContext {
    pub fn new() -> Self {
        let work = tempfile::tempdir().expect("tempdir");
        let source = work.path().join("src");
        let target = work.path().join("target");
        let config_dir = work.path().join("cli-config");
        fs::create_dir_all(&source).expect("source dir");
        fs::create_dir_all(&config_dir).expect("config dir");

        Self {
            _work: work,
            source,
            target,
            config_dir,
            cli_bin: PathBuf::from(env!("CARGO_BIN_EXE_backsync")),
        }
    }

    pub fn config_text(&self, mode: &str) -> String {
        format!(
            concat!(
                "# test configuration\nbackup_type: {mode}\ntarget_dir: {}\n",
                "source_dirs:\n  - \"{}\"\nexcluded_types:\n  - .tmp\n",
            ),
            self.target.display(),
            self.source.display(),
            mode = mode,
        )
    }

    /// Write a config file next to the source tree and return its path.
    pub fn write_config(&self, name: &str, text: &str) -> PathBuf {
        let path = self._work.path().join(name);
        fs::write(&path, text).expect("write config");
        path
    }

    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.cli_bin);
        cmd.arg("--config-dir").arg(&self.config_dir);
        cmd.env("RUST_LOG", "off");
        cmd
    }

    /// Where the source root ends up inside the target.
    pub fn mirror(&self) -> PathBuf {
        let mut mirrored = self.target.clone();
        for component in self.source.components() {
            if let std::path::Component::Normal(part) = component {
                mirrored.push(part);
            }
        }
        mirrored
    }
}

pub fn write_file(path: &Path, contents: &[u8], secs: i64) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("parent dir");
    }
    fs::write(path, contents).expect("write file");
    set_file_mtime(path, FileTime::from_unix_time(secs, 0)).expect("set mtime");
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
