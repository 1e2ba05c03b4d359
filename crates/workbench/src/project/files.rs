//! Project File Tool.
//!
//! Every filesystem access made on behalf of a project goes through
//! [`ProjectFiles`]. Paths arrive as untrusted strings relative to the
//! project root; each one is normalized, resolved through any symlinks that
//! already exist on disk, and rejected with [`FileError::PathEscape`] unless
//! the real location is inside the (canonical) root.
//!
//! Writes are atomic: new content goes to a temporary file next to the
//! target which is then renamed over it, so a concurrent reader sees either
//! the old or the new content and never a partial write.

use std::fmt;
use std::fs;
use std::io::{self, Write as _};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::policy::{Operation, Policy, PolicyDecision, PolicyHandler};

/// Maximum number of autocomplete suggestions.
pub const AUTOCOMPLETE_LIMIT: usize = 20;

/// Errors from File Tool operations.
#[derive(Debug, Error)]
pub enum FileError {
    /// The file or directory does not exist
    #[error("not found: {0}")]
    NotFound(String),
    /// A file operation was attempted on a directory
    #[error("is a directory: {0}")]
    IsDirectory(String),
    /// A directory operation was attempted on a file
    #[error("not a directory: {0}")]
    NotADirectory(String),
    /// The path resolves outside the project root
    #[error("path escapes project root: {0}")]
    PathEscape(String),
    /// `create` target already exists
    #[error("already exists: {0}")]
    AlreadyExists(String),
    /// `search_replace` found no occurrence of the search text
    #[error("text not found in {0}")]
    TextNotFound(String),
    /// `search_replace` was given an empty search string
    #[error("search text must not be empty")]
    EmptySearch,
    /// The access policy refuses the operation
    #[error("access denied: {0}")]
    Denied(String),
    /// Underlying IO failure
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl FileError {
    /// Stable machine-readable name of the condition.
    pub fn code(&self) -> &'static str {
        match self {
            FileError::NotFound(_) => "not_found",
            FileError::IsDirectory(_) => "is_directory",
            FileError::NotADirectory(_) => "not_a_directory",
            FileError::PathEscape(_) => "path_escape",
            FileError::AlreadyExists(_) => "already_exists",
            FileError::TextNotFound(_) => "text_not_found",
            FileError::EmptySearch => "empty_search",
            FileError::Denied(_) => "denied",
            FileError::Io(_) => "io_error",
        }
    }
}

/// How [`ProjectFiles::write`] combines new content with the existing file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Truncate and rewrite
    #[default]
    Replace,
    /// Add after the existing content
    Append,
    /// Add before the existing content
    Prepend,
}

impl WriteMode {
    /// Combine the `existing` file bytes with `new` content.
    ///
    /// A line break separates the two parts when the file was non-empty and
    /// the first part does not already end with one. Existing bytes are kept
    /// verbatim, whatever their encoding.
    pub fn apply(self, existing: &[u8], new: &[u8]) -> Vec<u8> {
        let (first, second) = match self {
            WriteMode::Replace => return new.to_vec(),
            WriteMode::Append => (existing, new),
            WriteMode::Prepend => (new, existing),
        };

        let mut out = Vec::with_capacity(first.len() + second.len() + 1);
        out.extend_from_slice(first);
        if !existing.is_empty() && !first.ends_with(b"\n") {
            out.push(b'\n');
        }
        out.extend_from_slice(second);
        out
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WriteMode::Replace => "replace",
            WriteMode::Append => "append",
            WriteMode::Prepend => "prepend",
        })
    }
}

impl FromStr for WriteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" => Ok(WriteMode::Replace),
            "append" => Ok(WriteMode::Append),
            "prepend" => Ok(WriteMode::Prepend),
            other => Err(format!(
                "unknown edit operation '{other}' (expected replace, append or prepend)"
            )),
        }
    }
}

/// Kind of a directory entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Regular file (or a symlink to one)
    File,
    /// Directory (or a symlink to one)
    Directory,
}

/// One entry of a directory listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// File name
    pub name: String,
    /// Path relative to the project root
    pub path: String,
    /// File or directory
    pub kind: EntryKind,
    /// Size in bytes (0 for directories)
    pub size: u64,
}

/// A file found by a recursive walk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Path relative to the project root, `/`-separated
    pub path: String,
    /// Size in bytes
    pub size: u64,
    /// Last modification time
    pub modified: DateTime<Utc>,
}

/// A path that passed containment checks.
#[derive(Debug)]
struct Resolved {
    /// Normalized path as the caller named it
    rel: String,
    /// Path relative to the root after following existing symlinks
    real_rel: String,
    /// Absolute real path
    path: PathBuf,
}

/// Filesystem access for one project, confined to its root directory.
#[derive(Clone)]
pub struct ProjectFiles {
    root: Arc<PathBuf>,
    policy: Arc<dyn PolicyHandler>,
}

impl fmt::Debug for ProjectFiles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectFiles")
            .field("root", &self.root)
            .field("policy", &self.policy)
            .finish()
    }
}

impl ProjectFiles {
    /// Open the project rooted at `root` with the default project policy.
    ///
    /// The root is canonicalized once here; if it is a symlink (a project
    /// imported by reference) every later check is made against the real
    /// directory it points to.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, FileError> {
        Self::with_policy(root, Arc::new(Policy::project()))
    }

    /// Open a project with a custom access policy.
    pub fn with_policy(
        root: impl AsRef<Path>,
        policy: Arc<dyn PolicyHandler>,
    ) -> Result<Self, FileError> {
        let root = root.as_ref();
        let canonical = fs::canonicalize(root).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => FileError::NotFound(root.display().to_string()),
            _ => FileError::Io(e),
        })?;
        if !canonical.is_dir() {
            return Err(FileError::NotADirectory(root.display().to_string()));
        }
        Ok(Self {
            root: Arc::new(canonical),
            policy,
        })
    }

    /// The canonical project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read a file as text (invalid UTF-8 is replaced).
    pub async fn read(&self, path: &str) -> Result<String, FileError> {
        let path = path.to_string();
        self.blocking(move |files| files.read_sync(&path)).await
    }

    /// List the visible entries of a directory, directories first, then by
    /// name. An empty `directory` lists the root.
    pub async fn list(&self, directory: &str) -> Result<Vec<DirEntry>, FileError> {
        let directory = directory.to_string();
        self.blocking(move |files| files.list_sync(&directory)).await
    }

    /// Every visible file under the root, sorted by path.
    pub async fn tree(&self) -> Result<Vec<FileInfo>, FileError> {
        self.blocking(|files| Ok(files.tree_sync())).await
    }

    /// Relative paths containing `query` (case-insensitive), at most
    /// [`AUTOCOMPLETE_LIMIT`] of them.
    pub async fn autocomplete(&self, query: &str) -> Result<Vec<String>, FileError> {
        let needle = query.to_lowercase();
        let tree = self.tree().await?;
        Ok(tree
            .into_iter()
            .map(|f| f.path)
            .filter(|p| p.to_lowercase().contains(&needle))
            .take(AUTOCOMPLETE_LIMIT)
            .collect())
    }

    /// Create a new file, making parent directories as needed.
    ///
    /// Never touches an existing file.
    pub async fn create(&self, path: &str, content: &str) -> Result<(), FileError> {
        let path = path.to_string();
        let content = content.to_string();
        self.blocking(move |files| files.create_sync(&path, &content))
            .await
    }

    /// Write a file according to `mode`.
    ///
    /// `append` and `prepend` read the whole existing file into memory. A
    /// missing file counts as empty; `replace` creates it.
    pub async fn write(&self, path: &str, content: &str, mode: WriteMode) -> Result<(), FileError> {
        let path = path.to_string();
        let content = content.to_string();
        self.blocking(move |files| files.write_sync(&path, &content, mode))
            .await
    }

    /// Replace every occurrence of `search` with `replace`, returning how
    /// many were replaced.
    pub async fn search_replace(
        &self,
        path: &str,
        search: &str,
        replace: &str,
    ) -> Result<usize, FileError> {
        let path = path.to_string();
        let search = search.to_string();
        let replace = replace.to_string();
        self.blocking(move |files| files.search_replace_sync(&path, &search, &replace))
            .await
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, FileError>
    where
        T: Send + 'static,
        F: FnOnce(ProjectFiles) -> Result<T, FileError> + Send + 'static,
    {
        let files = self.clone();
        tokio::task::spawn_blocking(move || f(files))
            .await
            .map_err(|e| FileError::Io(io::Error::other(e)))?
    }

    fn read_sync(&self, path: &str) -> Result<String, FileError> {
        let resolved = self.resolve(path)?;
        self.check(&resolved, Operation::Read)?;
        let meta = self.metadata(&resolved)?;
        if meta.is_dir() {
            return Err(FileError::IsDirectory(resolved.rel));
        }
        let bytes = fs::read(&resolved.path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn list_sync(&self, directory: &str) -> Result<Vec<DirEntry>, FileError> {
        let resolved = self.resolve(directory)?;
        self.check(&resolved, Operation::List)?;
        if !self.metadata(&resolved)?.is_dir() {
            return Err(FileError::NotADirectory(resolved.rel));
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(&resolved.path)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let rel = join_rel(&resolved.rel, &name);
            if !self.policy.check_access(&rel, Operation::List).is_allowed() {
                continue;
            }
            // Follows symlinks; dangling links are skipped.
            let Ok(meta) = fs::metadata(entry.path()) else {
                continue;
            };
            let (kind, size) = if meta.is_dir() {
                (EntryKind::Directory, 0)
            } else {
                (EntryKind::File, meta.len())
            };
            entries.push(DirEntry {
                name,
                path: rel,
                kind,
                size,
            });
        }

        entries.sort_by(|a, b| {
            (a.kind != EntryKind::Directory, &a.name).cmp(&(b.kind != EntryKind::Directory, &b.name))
        });
        Ok(entries)
    }

    fn tree_sync(&self) -> Vec<FileInfo> {
        let root = Arc::clone(&self.root);
        let policy = Arc::clone(&self.policy);
        let walker = ignore::WalkBuilder::new(self.root.as_path())
            .standard_filters(false)
            .follow_links(false)
            .filter_entry(move |entry| match entry.path().strip_prefix(root.as_path()) {
                Ok(rel) if rel.as_os_str().is_empty() => true,
                Ok(rel) => policy
                    .check_access(&rel_string(rel), Operation::List)
                    .is_allowed(),
                Err(_) => false,
            })
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(self.root.as_path()) else {
                continue;
            };
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            files.push(FileInfo {
                path: rel_string(rel),
                size: meta.len(),
                modified: meta
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_default(),
            });
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        files
    }

    fn create_sync(&self, path: &str, content: &str) -> Result<(), FileError> {
        let resolved = self.resolve(path)?;
        self.check(&resolved, Operation::Write)?;
        if fs::symlink_metadata(&resolved.path).is_ok() {
            return Err(FileError::AlreadyExists(resolved.rel));
        }
        write_atomic(&resolved, content.as_bytes(), false)?;
        tracing::debug!(path = %resolved.rel, bytes = content.len(), "created file");
        Ok(())
    }

    fn write_sync(&self, path: &str, content: &str, mode: WriteMode) -> Result<(), FileError> {
        let resolved = self.resolve(path)?;
        self.check(&resolved, Operation::Write)?;

        let existing = match fs::metadata(&resolved.path) {
            Ok(meta) if meta.is_dir() => return Err(FileError::IsDirectory(resolved.rel)),
            Ok(_) if mode != WriteMode::Replace => fs::read(&resolved.path)?,
            Ok(_) => Vec::new(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let updated = mode.apply(&existing, content.as_bytes());
        write_atomic(&resolved, &updated, true)?;
        tracing::debug!(path = %resolved.rel, %mode, bytes = updated.len(), "wrote file");
        Ok(())
    }

    fn search_replace_sync(
        &self,
        path: &str,
        search: &str,
        replace: &str,
    ) -> Result<usize, FileError> {
        if search.is_empty() {
            return Err(FileError::EmptySearch);
        }
        let resolved = self.resolve(path)?;
        self.check(&resolved, Operation::Read)?;
        self.check(&resolved, Operation::Write)?;
        if self.metadata(&resolved)?.is_dir() {
            return Err(FileError::IsDirectory(resolved.rel));
        }

        let content = String::from_utf8(fs::read(&resolved.path)?).map_err(|_| {
            FileError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} is not valid UTF-8 text", resolved.rel),
            ))
        })?;

        let count = content.matches(search).count();
        if count == 0 {
            return Err(FileError::TextNotFound(resolved.rel));
        }
        write_atomic(&resolved, content.replace(search, replace).as_bytes(), true)?;
        tracing::debug!(path = %resolved.rel, count, "search/replace applied");
        Ok(count)
    }

    fn metadata(&self, resolved: &Resolved) -> Result<fs::Metadata, FileError> {
        fs::metadata(&resolved.path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => FileError::NotFound(resolved.rel.clone()),
            _ => FileError::Io(e),
        })
    }

    fn check(&self, resolved: &Resolved, operation: Operation) -> Result<(), FileError> {
        for rel in [&resolved.rel, &resolved.real_rel] {
            if let PolicyDecision::Deny(reason) = self.policy.check_access(rel, operation) {
                tracing::debug!(path = %rel, ?operation, %reason, "policy denied access");
                return Err(FileError::Denied(reason));
            }
        }
        Ok(())
    }

    /// Resolve an untrusted relative path to a real path inside the root.
    fn resolve(&self, path: &str) -> Result<Resolved, FileError> {
        let escape = || FileError::PathEscape(path.to_string());

        let mut parts: Vec<String> = Vec::new();
        for component in Path::new(path).components() {
            match component {
                Component::Normal(name) => parts.push(name.to_string_lossy().into_owned()),
                Component::CurDir => {}
                Component::ParentDir => {
                    if parts.pop().is_none() {
                        return Err(escape());
                    }
                }
                Component::RootDir | Component::Prefix(_) => return Err(escape()),
            }
        }
        let rel = parts.join("/");
        let nominal = self.root.join(&rel);

        // Walk up to the deepest ancestor that exists and resolve it through
        // any symlinks; the missing tail is plain names and cannot escape.
        let mut existing = nominal.as_path();
        let mut missing = Vec::new();
        loop {
            match fs::symlink_metadata(existing) {
                Ok(_) => break,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    let (Some(parent), Some(name)) = (existing.parent(), existing.file_name())
                    else {
                        return Err(escape());
                    };
                    missing.push(name.to_os_string());
                    existing = parent;
                }
                Err(e) => return Err(e.into()),
            }
        }

        let mut real = match fs::canonicalize(existing) {
            Ok(real) => real,
            // A dangling symlink; its target cannot be verified.
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(escape()),
            Err(e) => return Err(e.into()),
        };
        if !real.starts_with(self.root.as_path()) {
            tracing::warn!(path = %path, real = %real.display(), "rejected path outside project root");
            return Err(escape());
        }
        for name in missing.iter().rev() {
            real.push(name);
        }

        let real_rel = real
            .strip_prefix(self.root.as_path())
            .map(rel_string)
            .map_err(|_| escape())?;

        Ok(Resolved {
            rel,
            real_rel,
            path: real,
        })
    }
}

fn write_atomic(resolved: &Resolved, contents: &[u8], clobber: bool) -> Result<(), FileError> {
    let dir = resolved
        .path
        .parent()
        .ok_or_else(|| FileError::IsDirectory(resolved.rel.clone()))?;
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    // The temp file starts out 0600; an existing target keeps its own mode.
    match fs::metadata(&resolved.path) {
        Ok(meta) => tmp.as_file().set_permissions(meta.permissions())?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    tmp.as_file().sync_all()?;

    if clobber {
        tmp.persist(&resolved.path).map_err(|e| FileError::Io(e.error))?;
    } else {
        tmp.persist_noclobber(&resolved.path).map_err(|e| {
            if e.error.kind() == io::ErrorKind::AlreadyExists {
                FileError::AlreadyExists(resolved.rel.clone())
            } else {
                FileError::Io(e.error)
            }
        })?;
    }
    Ok(())
}

fn join_rel(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{base}/{name}")
    }
}

fn rel_string(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn project() -> (tempfile::TempDir, ProjectFiles) {
        let dir = tempfile::tempdir().unwrap();
        let files = ProjectFiles::open(dir.path()).unwrap();
        (dir, files)
    }

    // ==================== WriteMode Tests ====================

    #[test]
    fn test_append_separator() {
        assert_eq!(WriteMode::Append.apply(b"a", b"b"), b"a\nb");
        assert_eq!(WriteMode::Append.apply(b"a\n", b"b"), b"a\nb");
        assert_eq!(WriteMode::Append.apply(b"", b"b"), b"b");
    }

    #[test]
    fn test_prepend_separator() {
        assert_eq!(WriteMode::Prepend.apply(b"body", b"head"), b"head\nbody");
        assert_eq!(WriteMode::Prepend.apply(b"body", b"head\n"), b"head\nbody");
        assert_eq!(WriteMode::Prepend.apply(b"", b"head"), b"head");
    }

    #[test]
    fn test_apply_keeps_non_utf8_bytes() {
        let existing = b"caf\xe9\n";
        assert_eq!(WriteMode::Prepend.apply(existing, b"header"), b"header\ncaf\xe9\n");
        assert_eq!(WriteMode::Append.apply(existing, b"tail"), b"caf\xe9\ntail");
    }

    #[test]
    fn test_write_mode_parse() {
        assert_eq!("Append".parse::<WriteMode>().unwrap(), WriteMode::Append);
        assert_eq!(" replace ".parse::<WriteMode>().unwrap(), WriteMode::Replace);
        assert!("truncate".parse::<WriteMode>().is_err());
    }

    #[test]
    fn test_write_mode_serde() {
        let mode: WriteMode = serde_json::from_str("\"prepend\"").unwrap();
        assert_eq!(mode, WriteMode::Prepend);
    }

    // ==================== Resolution Tests ====================

    #[test]
    fn test_resolve_normalizes_inside_root() {
        let (_dir, files) = project();
        let resolved = files.resolve("src/../src/./main.py").unwrap();
        assert_eq!(resolved.rel, "src/main.py");
        assert_eq!(resolved.path, files.root().join("src/main.py"));
    }

    #[test]
    fn test_resolve_rejects_parent_escape() {
        let (_dir, files) = project();
        assert!(matches!(
            files.resolve("../../etc/passwd"),
            Err(FileError::PathEscape(_))
        ));
        assert!(matches!(
            files.resolve("a/../../b"),
            Err(FileError::PathEscape(_))
        ));
    }

    #[test]
    fn test_resolve_rejects_absolute() {
        let (_dir, files) = project();
        assert!(matches!(
            files.resolve("/etc/passwd"),
            Err(FileError::PathEscape(_))
        ));
    }

    #[test]
    fn test_empty_path_is_root() {
        let (_dir, files) = project();
        let resolved = files.resolve("").unwrap();
        assert_eq!(resolved.rel, "");
        assert_eq!(resolved.path, files.root());
    }

    // ==================== Operation Tests ====================

    #[tokio::test]
    async fn test_create_then_read() {
        let (_dir, files) = project();
        files.create("src/app.py", "print('hi')\n").await.unwrap();

        assert_eq!(files.read("src/app.py").await.unwrap(), "print('hi')\n");
    }

    #[tokio::test]
    async fn test_read_missing_and_directory() {
        let (dir, files) = project();
        fs::create_dir(dir.path().join("pkg")).unwrap();

        assert!(matches!(files.read("nope.txt").await, Err(FileError::NotFound(_))));
        assert!(matches!(files.read("pkg").await, Err(FileError::IsDirectory(_))));
    }

    #[tokio::test]
    async fn test_hidden_files_refused() {
        let (dir, files) = project();
        fs::write(dir.path().join(".env"), "SECRET=1").unwrap();

        assert!(matches!(files.read(".env").await, Err(FileError::Denied(_))));
        assert!(matches!(
            files.write(".env", "x", WriteMode::Replace).await,
            Err(FileError::Denied(_))
        ));
        assert_eq!(fs::read_to_string(dir.path().join(".env")).unwrap(), "SECRET=1");
    }

    #[tokio::test]
    async fn test_list_sorted_and_filtered() {
        let (dir, files) = project();
        fs::write(dir.path().join("b.txt"), "bb").unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join(".hidden"), "").unwrap();
        fs::create_dir(dir.path().join("zdir")).unwrap();

        let entries = files.list("").await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["zdir", "a.txt", "b.txt"]);
        assert_eq!(entries[0].kind, EntryKind::Directory);
        assert_eq!(entries[2].size, 2);
    }

    #[tokio::test]
    async fn test_list_file_is_not_directory() {
        let (dir, files) = project();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        assert!(matches!(
            files.list("a.txt").await,
            Err(FileError::NotADirectory(_))
        ));
    }

    #[tokio::test]
    async fn test_write_modes_on_disk() {
        let (_dir, files) = project();
        files.write("log.txt", "one", WriteMode::Append).await.unwrap();
        files.write("log.txt", "two", WriteMode::Append).await.unwrap();
        files.write("log.txt", "zero", WriteMode::Prepend).await.unwrap();
        assert_eq!(files.read("log.txt").await.unwrap(), "zero\none\ntwo");

        files.write("log.txt", "fresh", WriteMode::Replace).await.unwrap();
        assert_eq!(files.read("log.txt").await.unwrap(), "fresh");
    }

    #[tokio::test]
    async fn test_write_to_directory_fails() {
        let (dir, files) = project();
        fs::create_dir(dir.path().join("pkg")).unwrap();
        assert!(matches!(
            files.write("pkg", "x", WriteMode::Replace).await,
            Err(FileError::IsDirectory(_))
        ));
    }

    #[tokio::test]
    async fn test_search_replace_counts() {
        let (_dir, files) = project();
        files.create("a.txt", "foo bar foo").await.unwrap();

        let count = files.search_replace("a.txt", "foo", "baz").await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(files.read("a.txt").await.unwrap(), "baz bar baz");
    }

    #[tokio::test]
    async fn test_search_replace_misses() {
        let (_dir, files) = project();
        files.create("a.txt", "hello").await.unwrap();

        assert!(matches!(
            files.search_replace("a.txt", "bye", "x").await,
            Err(FileError::TextNotFound(_))
        ));
        assert!(matches!(
            files.search_replace("missing.txt", "a", "b").await,
            Err(FileError::NotFound(_))
        ));
        assert!(matches!(
            files.search_replace("a.txt", "", "b").await,
            Err(FileError::EmptySearch)
        ));
        assert_eq!(files.read("a.txt").await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_tree_and_autocomplete() {
        let (dir, files) = project();
        fs::create_dir_all(dir.path().join("src/utils")).unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join("src/Main.py"), "x").unwrap();
        fs::write(dir.path().join("src/utils/helpers.py"), "y").unwrap();
        fs::write(dir.path().join(".git/HEAD"), "ref").unwrap();
        fs::write(dir.path().join("README.md"), "# r").unwrap();

        let tree = files.tree().await.unwrap();
        let paths: Vec<_> = tree.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["README.md", "src/Main.py", "src/utils/helpers.py"]);

        let hits = files.autocomplete("MAIN").await.unwrap();
        assert_eq!(hits, vec!["src/Main.py"]);
    }

    #[tokio::test]
    async fn test_autocomplete_capped() {
        let (dir, files) = project();
        for i in 0..30 {
            fs::write(dir.path().join(format!("file{i:02}.txt")), "").unwrap();
        }
        assert_eq!(files.autocomplete("file").await.unwrap().len(), AUTOCOMPLETE_LIMIT);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(FileError::PathEscape("x".into()).code(), "path_escape");
        assert_eq!(FileError::TextNotFound("x".into()).code(), "text_not_found");
    }
}
