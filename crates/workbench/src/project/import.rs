//! Importing an existing local directory as a project.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::ProjectError;
use crate::policy::{Operation, Policy, PolicyHandler};

/// How an imported project's directory was populated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStrategy {
    /// Visible files were copied into a fresh directory
    Copy,
    /// The destination is a symlink to the source, because the destination
    /// lies inside the source and a copy would recurse into itself
    Link,
}

/// Outcome of [`import_directory`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImportReport {
    /// Strategy used
    pub strategy: ImportStrategy,
    /// Number of files copied (0 for [`ImportStrategy::Link`])
    pub files_copied: usize,
}

/// Populate the not-yet-existing `dest` from `source`.
///
/// Copies skip dot-entries, build caches and symlinks, and never overwrite
/// anything already present at the destination.
pub fn import_directory(source: &Path, dest: &Path) -> Result<ImportReport, ProjectError> {
    let source = fs::canonicalize(source).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ProjectError::SourceNotFound(source.to_path_buf()),
        _ => ProjectError::Io(e),
    })?;
    if !source.is_dir() {
        return Err(ProjectError::SourceNotFound(source));
    }

    let dest_real = real_destination(dest)?;
    if dest_real.starts_with(&source) {
        link_dir(&source, dest)?;
        tracing::info!(
            source = %source.display(),
            dest = %dest.display(),
            "destination is inside source; imported by reference"
        );
        return Ok(ImportReport {
            strategy: ImportStrategy::Link,
            files_copied: 0,
        });
    }

    fs::create_dir(dest)?;
    let files_copied = copy_tree(&source, dest)?;
    tracing::info!(
        source = %source.display(),
        dest = %dest.display(),
        files_copied,
        "imported project by copy"
    );
    Ok(ImportReport {
        strategy: ImportStrategy::Copy,
        files_copied,
    })
}

/// Where `dest` will live once created, with its parent's symlinks resolved.
fn real_destination(dest: &Path) -> Result<PathBuf, ProjectError> {
    let parent = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let name = dest
        .file_name()
        .ok_or_else(|| ProjectError::InvalidPath(dest.to_path_buf()))?;
    fs::create_dir_all(parent)?;
    Ok(fs::canonicalize(parent)?.join(name))
}

fn copy_tree(source: &Path, dest: &Path) -> Result<usize, ProjectError> {
    let root = source.to_path_buf();
    let policy = Policy::import();
    let walker = ignore::WalkBuilder::new(source)
        .standard_filters(false)
        .follow_links(false)
        .filter_entry(move |entry| match entry.path().strip_prefix(&root) {
            Ok(rel) if rel.as_os_str().is_empty() => true,
            Ok(rel) => policy
                .check_access(&rel.to_string_lossy(), Operation::List)
                .is_allowed(),
            Err(_) => false,
        })
        .build();

    let mut copied = 0;
    for entry in walker {
        let entry = entry.map_err(|e| ProjectError::Io(io::Error::other(e)))?;
        let Ok(rel) = entry.path().strip_prefix(source) else {
            continue;
        };
        if rel.as_os_str().is_empty() {
            continue;
        }
        let Some(file_type) = entry.file_type() else {
            continue;
        };
        let target = dest.join(rel);

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_file() {
            let mut reader = fs::File::open(entry.path())?;
            let mut writer = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&target)?;
            io::copy(&mut reader, &mut writer)?;
            copied += 1;
        } else {
            tracing::debug!(path = %entry.path().display(), "skipping symlink during import");
        }
    }
    Ok(copied)
}

#[cfg(unix)]
fn link_dir(source: &Path, dest: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(source, dest)
}

#[cfg(windows)]
fn link_dir(source: &Path, dest: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(source, dest)
}
