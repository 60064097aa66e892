// Path and filesystem helpers shared by the backup manager, the stages and
// the preflight checker.
use crate::log_debug;
use colored::Colorize;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Whether something (file, directory or symlink, even a dangling one) exists at `path`.
pub fn path_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Walks up from `path` until an existing ancestor is found.
/// The disk-space check uses this when the target directory is not created yet.
pub fn nearest_existing_ancestor(path: &Path) -> Option<&Path> {
    path.ancestors().find(|candidate| candidate.exists())
}

/// Where a source path lands inside a backup snapshot.
///
/// Paths under the installation root keep their relative layout
/// (`~/.zshrc` -> `<snapshot>/.zshrc`). Anything else is stored under `_abs`
/// with its absolute layout (`/etc/default/docker` -> `<snapshot>/_abs/etc/default/docker`).
pub fn snapshot_relative_path(path: &Path, root: &Path) -> PathBuf {
    if let Ok(relative) = path.strip_prefix(root) {
        if relative.as_os_str().is_empty() {
            return PathBuf::from("_root");
        }
        return relative.to_path_buf();
    }
    let mut relative = PathBuf::from("_abs");
    relative.extend(path.components().filter_map(|component| match component {
        Component::Normal(part) => Some(part),
        _ => None,
    }));
    relative
}

/// Copies a file, a symlink or a whole directory tree from `src` to `dst`.
/// Symlinks are recreated, not followed.
pub fn copy_recursively(src: &Path, dst: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(src)?;
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }

    if metadata.file_type().is_symlink() {
        return copy_symlink(src, dst);
    }
    if metadata.is_file() {
        fs::copy(src, dst)?;
        return Ok(());
    }

    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(io::Error::other)?;
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    log_debug!(
        "[Backup] Copied tree {} -> {}",
        src.display().to_string().dimmed(),
        dst.display().to_string().dimmed()
    );
    Ok(())
}

fn copy_symlink(src: &Path, dst: &Path) -> io::Result<()> {
    let target = fs::read_link(src)?;
    std::os::unix::fs::symlink(target, dst)
}
