//! Projects: rooted directory trees the workbench may read and mutate.

mod files;
mod import;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use files::{
    AUTOCOMPLETE_LIMIT, DirEntry, EntryKind, FileError, FileInfo, ProjectFiles, WriteMode,
};
pub use import::{ImportReport, ImportStrategy, import_directory};

use crate::store::{Record, Store, StoreError};

/// Errors from the project registry.
#[derive(Debug, Error)]
pub enum ProjectError {
    /// No project with this id
    #[error("project not found: {0}")]
    NotFound(String),
    /// The import source does not exist or is not a directory
    #[error("import source not found: {}", .0.display())]
    SourceNotFound(PathBuf),
    /// A path that cannot name a project directory
    #[error("invalid project path: {}", .0.display())]
    InvalidPath(PathBuf),
    /// File Tool failure inside the project
    #[error(transparent)]
    File(#[from] FileError),
    /// Registry backend failure
    #[error(transparent)]
    Store(#[from] StoreError),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A named, rooted directory tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Opaque identity, also the directory name under the projects root
    pub id: String,
    /// Human name
    pub name: String,
    /// Optional free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Root directory, fixed at creation
    pub root: PathBuf,
    /// Directory the project was imported from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    /// How the import populated the root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_strategy: Option<ImportStrategy>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Record for Project {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Project {
    /// File Tool confined to this project's root.
    pub fn files(&self) -> Result<ProjectFiles, FileError> {
        ProjectFiles::open(&self.root)
    }
}

/// A project together with its visible files.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProjectDetails {
    /// The project
    #[serde(flatten)]
    pub project: Project,
    /// Every visible file, sorted by path
    pub files: Vec<FileInfo>,
}

/// Parameters for [`ProjectRegistry::create`].
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NewProject {
    /// Human name
    pub name: String,
    /// Optional description
    #[serde(default)]
    pub description: Option<String>,
    /// Existing local directory to import
    #[serde(default, alias = "local_path")]
    pub source: Option<PathBuf>,
}

/// Creates projects on disk and keeps track of them.
pub struct ProjectRegistry {
    projects_root: PathBuf,
    store: Arc<dyn Store<Project>>,
}

impl std::fmt::Debug for ProjectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectRegistry")
            .field("projects_root", &self.projects_root)
            .finish_non_exhaustive()
    }
}

impl ProjectRegistry {
    /// Create a registry placing project directories under `projects_root`.
    pub fn new(projects_root: impl Into<PathBuf>, store: Arc<dyn Store<Project>>) -> Self {
        Self {
            projects_root: projects_root.into(),
            store,
        }
    }

    /// The directory holding all project roots.
    pub fn projects_root(&self) -> &Path {
        &self.projects_root
    }

    /// Allocate a new project directory, seeding it with a README or
    /// importing `source`.
    pub async fn create(&self, new: NewProject) -> Result<Project, ProjectError> {
        let id = Uuid::new_v4().to_string();
        let root = self.projects_root.join(&id);
        let created_at = Utc::now();

        let import_strategy = match new.source.clone() {
            Some(source) => {
                let dest = root.clone();
                let report =
                    tokio::task::spawn_blocking(move || import_directory(&source, &dest))
                        .await
                        .map_err(|e| ProjectError::Io(io::Error::other(e)))??;
                Some(report.strategy)
            }
            None => {
                tokio::fs::create_dir_all(&self.projects_root).await?;
                tokio::fs::create_dir(&root).await?;
                let readme = format!("# {}\n\nProject created at {}\n", new.name, created_at.to_rfc3339());
                tokio::fs::write(root.join("README.md"), readme).await?;
                None
            }
        };

        let project = Project {
            id,
            name: new.name,
            description: new.description,
            root,
            source: new.source,
            import_strategy,
            created_at,
        };
        self.store.put(project.clone()).await?;
        tracing::info!(project_id = %project.id, name = %project.name, strategy = ?project.import_strategy, "created project");
        Ok(project)
    }

    /// Look up a project.
    pub async fn get(&self, id: &str) -> Result<Project, ProjectError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| ProjectError::NotFound(id.to_string()))
    }

    /// All projects, oldest first.
    pub async fn list(&self) -> Result<Vec<Project>, ProjectError> {
        let mut projects = self.store.list().await?;
        projects.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(projects)
    }

    /// Number of registered projects.
    pub async fn count(&self) -> Result<usize, ProjectError> {
        Ok(self.store.len().await?)
    }

    /// A project plus its visible file tree.
    pub async fn details(&self, id: &str) -> Result<ProjectDetails, ProjectError> {
        let project = self.get(id).await?;
        let files = project.files()?.tree().await?;
        Ok(ProjectDetails { project, files })
    }

    /// File Tool for a registered project.
    pub async fn files(&self, id: &str) -> Result<ProjectFiles, ProjectError> {
        Ok(self.get(id).await?.files()?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn registry(root: &Path) -> ProjectRegistry {
        ProjectRegistry::new(root.join("projects"), Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_create_writes_readme() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());

        let project = registry
            .create(NewProject {
                name: "Demo".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(project.root, dir.path().join("projects").join(&project.id));
        let readme = std::fs::read_to_string(project.root.join("README.md")).unwrap();
        assert!(readme.starts_with("# Demo\n"));
        assert_eq!(registry.get(&project.id).await.unwrap(), project);
    }

    #[tokio::test]
    async fn test_get_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        assert!(matches!(
            registry.get("missing").await,
            Err(ProjectError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_import_and_details() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src-repo");
        std::fs::create_dir_all(source.join("lib")).unwrap();
        std::fs::write(source.join("lib/mod.py"), "x = 1").unwrap();
        std::fs::write(source.join(".env"), "hidden").unwrap();

        let registry = registry(dir.path());
        let project = registry
            .create(NewProject {
                name: "Imported".to_string(),
                description: Some("from disk".to_string()),
                source: Some(source.clone()),
            })
            .await
            .unwrap();

        assert_eq!(project.import_strategy, Some(ImportStrategy::Copy));
        let details = registry.details(&project.id).await.unwrap();
        let paths: Vec<_> = details.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["lib/mod.py"]);
    }

    #[tokio::test]
    async fn test_list_and_count() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        for name in ["a", "b"] {
            registry
                .create(NewProject {
                    name: name.to_string(),
                    ..Default::default()
                })
                .await
                .unwrap();
        }
        assert_eq!(registry.count().await.unwrap(), 2);
        assert_eq!(registry.list().await.unwrap().len(), 2);
    }
}
