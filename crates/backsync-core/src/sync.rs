//! Mirror mode: prune target entries that no longer exist in the source,
//! then copy as a plain backup would.
//!
//! Names are compared case-insensitively and by leaf name only. The
//! comparison uses the complete source listing, before exclusion rules, so
//! the mirrored copy of an excluded or hidden source entry is left alone.

use eyre::Result;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::decide::FileDecider;
use crate::platform;
use crate::summary::RunSummary;
use crate::traversal::{eligible_dirs, eligible_files, list_directory, DirListing, Traversal};

/// Mirror-mode driver layered on a [`Traversal`].
pub struct SyncReconciler<'a, D: FileDecider> {
    traversal: Traversal<'a, D>,
}

impl<'a, D: FileDecider> SyncReconciler<'a, D> {
    pub fn new(traversal: Traversal<'a, D>) -> Self {
        Self { traversal }
    }

    /// Sync every source root. Deletions only ever happen below the mirrored
    /// path of a source root, never elsewhere in the target.
    pub fn sync_all(&self, summary: &mut RunSummary) -> Result<usize> {
        self.traversal.prepare_target()?;

        let mut copied = 0;
        for source_root in &self.traversal.settings().source_roots {
            if let Some(target_dir) = self.traversal.resolve_root(source_root, summary)? {
                copied += self.sync_tree(source_root, &target_dir, summary)?;
            }
        }
        Ok(copied)
    }

    pub fn sync_tree(
        &self,
        source_dir: &Path,
        target_dir: &Path,
        summary: &mut RunSummary,
    ) -> Result<usize> {
        if self.traversal.is_hidden_dir(source_dir) {
            self.traversal
                .events()
                .debug("Skipping hidden DIR", source_dir.display());
            return Ok(0);
        }

        self.traversal
            .events()
            .info("Syncing DIR", source_dir.display());

        let Some(source) = self.traversal.list_source(source_dir, summary) else {
            return Ok(0);
        };

        // Free space before anything new is written
        if target_dir.is_dir() {
            match list_directory(target_dir) {
                Ok(target) => self.prune(&source, &target, summary),
                Err(err) => self
                    .traversal
                    .events()
                    .warn("SYNC ERROR", format!("{err:#}")),
            }
        }

        let settings = self.traversal.settings();
        let mut copied = self.traversal.copy_files(
            source_dir,
            eligible_files(settings, &source),
            target_dir,
            summary,
        )?;

        for sub_dir in eligible_dirs(settings, &source) {
            if let Some(name) = sub_dir.file_name() {
                copied += self.sync_tree(sub_dir, &target_dir.join(name), summary)?;
            }
        }

        Ok(copied)
    }

    /// Delete target directories and files with no same-named source entry.
    /// Failures are reported and skipped.
    fn prune(&self, source: &DirListing, target: &DirListing, summary: &mut RunSummary) {
        let events = self.traversal.events();

        let source_dirs = folded_names(&source.dirs);
        for dir in &target.dirs {
            if contains_name(&source_dirs, dir) {
                continue;
            }
            match fs::remove_dir_all(dir) {
                Ok(()) => {
                    summary.deleted_dirs += 1;
                    events.info("Deleted DIR", dir.display());
                }
                Err(err) => events.warn("SYNC ERROR", format!("{}: {err}", dir.display())),
            }
        }

        let source_files = folded_names(source.files.iter().chain(&source.links));
        for file in target.files.iter().chain(&target.links) {
            if contains_name(&source_files, file) {
                continue;
            }
            match delete_file(file) {
                Ok(()) => {
                    summary.deleted_files += 1;
                    events.info("Deleted file", file.display());
                }
                Err(err) => events.warn("SYNC ERROR", format!("{}: {err}", file.display())),
            }
        }
    }
}

fn fold_name(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
}

fn folded_names<'p, I>(paths: I) -> HashSet<String>
where
    I: IntoIterator<Item = &'p PathBuf>,
{
    paths.into_iter().filter_map(|p| fold_name(p)).collect()
}

fn contains_name(names: &HashSet<String>, path: &Path) -> bool {
    fold_name(path).is_some_and(|name| names.contains(&name))
}

/// Remove a file, clearing its read-only flag first. Links are removed, not followed.
fn delete_file(path: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(path)?;
    if !metadata.file_type().is_symlink() {
        platform::clear_readonly(path, &metadata)?;
    }
    fs::remove_file(path)
}
