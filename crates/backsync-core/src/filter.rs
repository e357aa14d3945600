use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use once_cell::sync::OnceCell;
use std::path::Path;

/// File and directory exclusion rules.
///
/// Directory rules are matched against the directory *name* only, file rules
/// against the file name (globs) or its extension. All matching ignores case.
#[derive(Debug, Default)]
pub struct ExclusionFilter {
    pub exclude_dirs: Vec<String>,
    pub exclude_types: Vec<String>,
    pub exclude_files: Vec<String>,
    compiled_dirs: OnceCell<GlobSet>,
    compiled_files: OnceCell<GlobSet>,
}

impl ExclusionFilter {
    pub fn new(
        exclude_dirs: Vec<String>,
        exclude_types: Vec<String>,
        exclude_files: Vec<String>,
    ) -> Self {
        Self {
            exclude_dirs,
            exclude_types,
            exclude_files,
            compiled_dirs: OnceCell::new(),
            compiled_files: OnceCell::new(),
        }
    }

    fn build_globset(patterns: &[String]) -> GlobSet {
        let mut builder = GlobSetBuilder::new();
        for pat in patterns {
            match GlobBuilder::new(pat).case_insensitive(true).build() {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(err) => log::warn!("ignoring invalid exclusion pattern {pat:?}: {err}"),
            }
        }
        builder.build().unwrap_or_else(|err| {
            log::warn!("exclusion patterns could not be compiled: {err}");
            GlobSet::empty()
        })
    }

    fn dir_globs(&self) -> &GlobSet {
        self.compiled_dirs
            .get_or_init(|| Self::build_globset(&self.exclude_dirs))
    }

    fn file_globs(&self) -> &GlobSet {
        self.compiled_files
            .get_or_init(|| Self::build_globset(&self.exclude_files))
    }

    /// Whether the file at `path` must not be backed up.
    pub fn is_file_excluded(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };

        if let Some(ext) = path.extension() {
            let ext = ext.to_string_lossy();
            let excluded_type = self
                .exclude_types
                .iter()
                .map(|t| t.trim_start_matches('.'))
                .any(|t| t.eq_ignore_ascii_case(&ext));
            if excluded_type {
                return true;
            }
        }

        self.file_globs().is_match(name)
    }

    /// Whether a directory called `name` must not be visited.
    pub fn is_directory_excluded(&self, name: &str) -> bool {
        self.dir_globs().is_match(name)
    }
}

impl Clone for ExclusionFilter {
    fn clone(&self) -> Self {
        Self::new(
            self.exclude_dirs.clone(),
            self.exclude_types.clone(),
            self.exclude_files.clone(),
        )
    }
}
