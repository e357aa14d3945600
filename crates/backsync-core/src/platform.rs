//! Platform specific filesystem helpers: hidden detection, read-only flags,
//! path-length errors and volume-prefix stripping.

use eyre::{bail, Result};
use std::fs::{self, Metadata};
use std::io;
use std::path::{Component, Path, PathBuf};

#[cfg(windows)]
const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
#[cfg(windows)]
const ERROR_FILENAME_EXCED_RANGE: i32 = 206;

/// Whether the entry at `path` is hidden.
///
/// Unix has no hidden attribute, so dot-files are treated as hidden there.
#[cfg(unix)]
pub fn is_hidden(path: &Path, _metadata: &Metadata) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

#[cfg(windows)]
pub fn is_hidden(_path: &Path, metadata: &Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;
    metadata.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0
}

/// Make a read-only file writable so it can be overwritten or deleted.
pub fn clear_readonly(path: &Path, metadata: &Metadata) -> io::Result<()> {
    let mut perms = metadata.permissions();
    if !perms.readonly() {
        return Ok(());
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        perms.set_mode(perms.mode() | 0o200);
    }
    #[cfg(windows)]
    #[allow(clippy::permissions_set_readonly_false)]
    {
        perms.set_readonly(false);
    }

    fs::set_permissions(path, perms)
}

/// Whether `err` was raised because a path exceeded the OS limit.
pub fn is_path_too_long(err: &io::Error) -> bool {
    #[cfg(unix)]
    {
        err.raw_os_error() == Some(libc::ENAMETOOLONG)
    }
    #[cfg(windows)]
    {
        err.raw_os_error() == Some(ERROR_FILENAME_EXCED_RANGE)
    }
}

/// Relative path under which `source_root` is mirrored in the target.
///
/// The root is made absolute, `.`/`..` are folded lexically, and the
/// volume prefix and root separator are dropped, so `/home/me/docs` becomes
/// `home/me/docs` and `C:\Users\me` becomes `Users\me`.
pub fn mirror_subpath(source_root: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(source_root)?;
    let mut clean = PathBuf::new();
    for comp in absolute.components() {
        match comp {
            Component::Prefix(_) | Component::RootDir | Component::CurDir => {}
            Component::ParentDir => {
                clean.pop();
            }
            Component::Normal(part) => clean.push(part),
        }
    }
    if clean.as_os_str().is_empty() {
        bail!(
            "source root {} has no path below its volume",
            source_root.display()
        );
    }
    Ok(clean)
}

/// Lexically normalised absolute form of `path`, used for containment checks.
pub fn normalize(path: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    let mut clean = PathBuf::new();
    for comp in absolute.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                clean.pop();
            }
            other => clean.push(other.as_os_str()),
        }
    }
    Ok(clean)
}
