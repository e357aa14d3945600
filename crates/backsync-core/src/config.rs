//! Backup configuration files.
//!
//! The format is a small YAML subset: `key: value` lines, `key:` followed by
//! `- item` sequence lines, `key: []` for an empty sequence, `#` comments and
//! `---`/`...` document markers.

use directories::{BaseDirs, ProjectDirs};
use eyre::{bail, eyre, Result, WrapErr};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// File name looked up inside the configuration directory.
pub const DEFAULT_CONFIG_FILE: &str = "backup.yaml";

static CONFIG_DIR_OVERRIDE: Lazy<RwLock<Option<PathBuf>>> = Lazy::new(|| RwLock::new(None));

/// Override the configuration directory for the current process.
/// Subsequent calls replace the previous override.
pub fn set_config_dir<P: AsRef<Path>>(path: P) {
    *CONFIG_DIR_OVERRIDE.write() = Some(path.as_ref().to_path_buf());
}

/// Clear any previously configured override.
pub fn clear_config_dir_override() {
    CONFIG_DIR_OVERRIDE.write().take();
}

/// Resolve the configuration directory.
/// Priority: explicit override -> platform standard -> ~/.config/backsync
pub fn config_dir() -> Result<PathBuf> {
    if let Some(path) = CONFIG_DIR_OVERRIDE.read().clone() {
        return Ok(path);
    }

    if let Some(proj) = ProjectDirs::from("com", "Backsync", "backsync") {
        return Ok(proj.config_dir().to_path_buf());
    }

    if let Some(base) = BaseDirs::new() {
        return Ok(base.home_dir().join(".config").join("backsync"));
    }

    Err(eyre!(
        "unable to determine configuration directory (no override and no platform default)"
    ))
}

/// Config file used when none is given explicitly.
pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(DEFAULT_CONFIG_FILE))
}

/// A parsed value: either a single scalar or a sequence of items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    Scalar(String),
    Sequence(Vec<String>),
}

/// Key/value pairs read from a configuration file. Keys are lowercase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDocument {
    entries: BTreeMap<String, ConfigValue>,
}

impl ConfigDocument {
    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config file: {}", path.display()))?;
        Self::parse_str(&content)
            .wrap_err_with(|| format!("failed to parse config file: {}", path.display()))
    }

    pub fn parse_str(text: &str) -> Result<Self> {
        let mut entries = BTreeMap::new();
        // Key of the sequence currently collecting `- item` lines
        let mut open_sequence: Option<String> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = trim_whitespace(raw);

            if is_ignored(line) {
                continue;
            }

            if is_sequence_entry(line) {
                let Some(key) = open_sequence.as_ref() else {
                    bail!("line {line_no}: sequence entry without key definition: {line}");
                };
                if let Some(ConfigValue::Sequence(items)) = entries.get_mut(key) {
                    items.push(trim_sequence_chars(line).to_string());
                }
                continue;
            }

            let Some((key, value)) = split_key_value(line) else {
                bail!("line {line_no}: entry not supported: {line}");
            };

            if entries.contains_key(&key) {
                bail!("line {line_no}: duplicate key '{key}'");
            }

            if value.is_empty() {
                entries.insert(key.clone(), ConfigValue::Sequence(Vec::new()));
                open_sequence = Some(key);
            } else {
                let parsed = if value.replace(' ', "") == "[]" {
                    ConfigValue::Sequence(Vec::new())
                } else {
                    ConfigValue::Scalar(trim_quotes(value).to_string())
                };
                entries.insert(key, parsed);
                open_sequence = None;
            }
        }

        Ok(Self { entries })
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn trim_whitespace(s: &str) -> &str {
    s.trim_matches(|c| c == ' ' || c == '\n' || c == '\r')
}

fn is_ignored(line: &str) -> bool {
    line.is_empty() || line.starts_with("---") || line.starts_with("...") || line.starts_with('#')
}

fn is_sequence_entry(line: &str) -> bool {
    line.starts_with('-') && !line.starts_with("--")
}

fn trim_sequence_chars(line: &str) -> &str {
    line.trim_start_matches('-')
        .trim_matches(|c| c == ' ' || c == '"' || c == '\'')
}

fn trim_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

// Split on the first ':' only; Windows paths keep their drive separator.
fn split_key_value(line: &str) -> Option<(String, &str)> {
    let (key, value) = line.split_once(':')?;
    Some((key.trim().to_lowercase(), value.trim()))
}
