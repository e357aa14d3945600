//! Depth-first walk of a source tree, one directory batch at a time.

use eyre::{Result, WrapErr};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::decide::FileDecider;
use crate::events::EventLog;
use crate::outcome::{CopyOutcome, ErrorRecord, ExcessiveErrors};
use crate::platform;
use crate::settings::Settings;
use crate::summary::{DirectoryError, RunSummary};

/// Immediate contents of one directory, sorted by name.
#[derive(Debug, Default, Clone)]
pub struct DirListing {
    pub files: Vec<PathBuf>,
    pub dirs: Vec<PathBuf>,
    /// Links to directories and dangling links. Never followed.
    pub links: Vec<PathBuf>,
}

/// List `dir` one level deep. Links to files count as files.
pub fn list_directory(dir: &Path) -> Result<DirListing> {
    let mut listing = DirListing::default();

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    for next in walker {
        let entry = match next {
            Ok(e) => e,
            Err(err) => {
                if err.depth() == 0 {
                    return Err(err).wrap_err_with(|| format!("listing {}", dir.display()));
                }
                log::debug!("skipping unreadable entry in {}: {err}", dir.display());
                continue;
            }
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            listing.dirs.push(entry.into_path());
        } else if file_type.is_file() {
            listing.files.push(entry.into_path());
        } else if file_type.is_symlink() {
            match fs::metadata(entry.path()) {
                Ok(md) if md.is_file() => listing.files.push(entry.into_path()),
                _ => listing.links.push(entry.into_path()),
            }
        }
    }

    Ok(listing)
}

/// Files of `listing` that pass the file exclusion rules.
pub(crate) fn eligible_files<'l>(
    settings: &'l Settings,
    listing: &'l DirListing,
) -> impl Iterator<Item = &'l Path> + 'l {
    listing
        .files
        .iter()
        .map(PathBuf::as_path)
        .filter(move |path| !settings.is_file_excluded(path))
}

/// Sub-directories of `listing` whose names pass the directory exclusion rules.
pub(crate) fn eligible_dirs<'l>(
    settings: &'l Settings,
    listing: &'l DirListing,
) -> impl Iterator<Item = &'l Path> + 'l {
    listing.dirs.iter().map(PathBuf::as_path).filter(move |path| {
        path.file_name()
            .map(|name| !settings.is_directory_excluded(&name.to_string_lossy()))
            .unwrap_or(false)
    })
}

/// Walks source trees and drives a [`FileDecider`] over every eligible file.
pub struct Traversal<'a, D: FileDecider> {
    settings: &'a Settings,
    decider: &'a D,
    events: &'a EventLog,
}

impl<'a, D: FileDecider> Traversal<'a, D> {
    pub fn new(settings: &'a Settings, decider: &'a D, events: &'a EventLog) -> Self {
        Self {
            settings,
            decider,
            events,
        }
    }

    pub(crate) fn settings(&self) -> &'a Settings {
        self.settings
    }

    pub(crate) fn events(&self) -> &'a EventLog {
        self.events
    }

    /// Create the target root if needed.
    pub fn prepare_target(&self) -> Result<()> {
        let target = &self.settings.target_root;
        self.events.info("Target DIR", target.display());
        if !target.is_dir() {
            fs::create_dir_all(target)
                .wrap_err_with(|| format!("creating target directory {}", target.display()))?;
        }
        Ok(())
    }

    /// Copy every source root into the target. Returns the number of files copied.
    pub fn copy_all(&self, summary: &mut RunSummary) -> Result<usize> {
        self.prepare_target()?;

        let mut copied = 0;
        for source_root in &self.settings.source_roots {
            if let Some(target_dir) = self.resolve_root(source_root, summary)? {
                copied += self.copy_tree(source_root, &target_dir, summary)?;
            }
        }
        Ok(copied)
    }

    /// Target directory mirroring `source_root`, or `None` if the root is unusable.
    pub(crate) fn resolve_root(
        &self,
        source_root: &Path,
        summary: &mut RunSummary,
    ) -> Result<Option<PathBuf>> {
        self.events.info("Source DIR", source_root.display());

        if !source_root.is_dir() {
            self.record_unreadable(source_root, "source directory does not exist", summary);
            return Ok(None);
        }

        let subpath = platform::mirror_subpath(source_root)?;
        Ok(Some(self.settings.target_root.join(subpath)))
    }

    /// Copy the tree under `source_dir` into `target_dir`, mirroring its layout.
    pub fn copy_tree(
        &self,
        source_dir: &Path,
        target_dir: &Path,
        summary: &mut RunSummary,
    ) -> Result<usize> {
        if self.is_hidden_dir(source_dir) {
            self.events.debug("Skipping hidden DIR", source_dir.display());
            return Ok(0);
        }

        self.events.info("Backing up DIR", source_dir.display());

        let Some(listing) = self.list_source(source_dir, summary) else {
            return Ok(0);
        };

        let mut copied = self.copy_files(
            source_dir,
            eligible_files(self.settings, &listing),
            target_dir,
            summary,
        )?;

        for sub_dir in eligible_dirs(self.settings, &listing) {
            if let Some(name) = sub_dir.file_name() {
                copied += self.copy_tree(sub_dir, &target_dir.join(name), summary)?;
            }
        }

        Ok(copied)
    }

    /// Run the decider over one directory's files.
    ///
    /// Fails with [`ExcessiveErrors`] once the batch produces more permanent
    /// errors than the configured threshold.
    pub fn copy_files<'p, I>(
        &self,
        source_dir: &Path,
        files: I,
        target_dir: &Path,
        summary: &mut RunSummary,
    ) -> Result<usize>
    where
        I: IntoIterator<Item = &'p Path>,
    {
        let threshold = self.settings.limits.max_errors_per_directory;
        let mut copied = 0;
        // Reset for every directory
        let mut permanent_errors = 0;

        for file in files {
            match self.decider.decide(file, target_dir) {
                CopyOutcome::Copied => {
                    copied += 1;
                    // Kept current so an aborted run still reports what reached the target
                    summary.files_copied += 1;
                }
                CopyOutcome::AlreadyUpToDate | CopyOutcome::Ineligible => {}
                outcome => {
                    summary
                        .errors
                        .push(ErrorRecord::new(outcome, file, target_dir));

                    if outcome.counts_towards_abort() {
                        permanent_errors += 1;
                        if permanent_errors > threshold {
                            return Err(ExcessiveErrors {
                                directory: source_dir.to_path_buf(),
                                errors: permanent_errors,
                            }
                            .into());
                        }
                    }
                }
            }
        }

        Ok(copied)
    }

    /// Hidden directories hide their whole subtree when hidden files are ignored.
    pub(crate) fn is_hidden_dir(&self, dir: &Path) -> bool {
        self.settings.ignore_hidden
            && fs::metadata(dir)
                .map(|md| platform::is_hidden(dir, &md))
                .unwrap_or(false)
    }

    pub(crate) fn list_source(&self, dir: &Path, summary: &mut RunSummary) -> Option<DirListing> {
        match list_directory(dir) {
            Ok(listing) => Some(listing),
            Err(err) => {
                self.record_unreadable(dir, &format!("{err:#}"), summary);
                None
            }
        }
    }

    fn record_unreadable(&self, dir: &Path, message: &str, summary: &mut RunSummary) {
        self.events
            .warn("ACCESS ERROR", format!("{}: {message}", dir.display()));
        summary.directory_errors.push(DirectoryError {
            path: dir.to_path_buf(),
            message: message.to_string(),
        });
    }
}
