use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::config::WorkbenchConfig;
use crate::conversation::{Conversation, ConversationError, ConversationLog};
use crate::dispatch::{
    AgentDispatcher, DeveloperProvider, DevopsProvider, DispatchError, FilesProvider,
    ProjectManagerProvider, QaProvider, Task, TaskOutput,
};
use crate::interpreter::{CommandInterpreter, InterpreterError, Reply};
use crate::project::{NewProject, Project, ProjectDetails, ProjectError, ProjectRegistry};
use crate::sandbox::ExecutionEngine;
use crate::store::MemoryStore;

/// Errors from [`Workbench`] operations spanning several components.
#[derive(Debug, Error)]
pub enum WorkbenchError {
    /// Project registry failure, including unknown projects
    #[error(transparent)]
    Project(#[from] ProjectError),
    /// Conversation log failure, including unknown conversations
    #[error(transparent)]
    Conversation(#[from] ConversationError),
}

/// Service counters reported by [`Workbench::health`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Health {
    /// Always `healthy` when the call succeeds
    pub status: &'static str,
    /// Registered projects
    pub projects: usize,
    /// Open conversations
    pub conversations: usize,
    /// Registered capability providers
    pub agents: usize,
    /// Whether code execution is available
    pub sandbox_enabled: bool,
}

/// All components wired together over in-memory stores.
///
/// Projects and conversations live only as long as the process; the project
/// directories themselves persist under the configured root.
#[derive(Debug, Clone)]
pub struct Workbench {
    config: WorkbenchConfig,
    projects: Arc<ProjectRegistry>,
    conversations: Arc<ConversationLog>,
    engine: Arc<ExecutionEngine>,
    interpreter: Arc<CommandInterpreter>,
    dispatcher: Arc<AgentDispatcher>,
}

impl Workbench {
    /// Wire a workbench around an already-built engine.
    pub fn new(config: WorkbenchConfig, engine: ExecutionEngine) -> Self {
        let projects = Arc::new(ProjectRegistry::new(
            config.projects_root.clone(),
            Arc::new(MemoryStore::new()),
        ));
        let conversations = Arc::new(ConversationLog::new(Arc::new(MemoryStore::new())));
        let engine = Arc::new(engine);
        let interpreter = Arc::new(CommandInterpreter::new(
            Arc::clone(&projects),
            Arc::clone(&conversations),
            Arc::clone(&engine),
        ));
        let dispatcher = Arc::new(default_dispatcher(&projects, &engine));

        Self {
            config,
            projects,
            conversations,
            engine,
            interpreter,
            dispatcher,
        }
    }

    /// Wire a workbench using the configured container runtime, probing it
    /// once.
    pub async fn connect(config: WorkbenchConfig) -> Self {
        let engine = ExecutionEngine::connect(&config.sandbox).await;
        Self::new(config, engine)
    }

    /// Configuration the workbench was built with.
    pub fn config(&self) -> &WorkbenchConfig {
        &self.config
    }

    /// Project registry.
    pub fn projects(&self) -> &Arc<ProjectRegistry> {
        &self.projects
    }

    /// Conversation log.
    pub fn conversations(&self) -> &Arc<ConversationLog> {
        &self.conversations
    }

    /// Sandboxed execution engine.
    pub fn engine(&self) -> &Arc<ExecutionEngine> {
        &self.engine
    }

    /// Agent registry.
    pub fn dispatcher(&self) -> &Arc<AgentDispatcher> {
        &self.dispatcher
    }

    /// Create a project, importing `new.source` when given.
    pub async fn create_project(&self, new: NewProject) -> Result<Project, ProjectError> {
        self.projects.create(new).await
    }

    /// A project plus its visible files.
    pub async fn project_details(&self, id: &str) -> Result<ProjectDetails, ProjectError> {
        self.projects.details(id).await
    }

    /// Start a conversation in an existing project.
    pub async fn create_conversation(
        &self,
        project_id: &str,
        title: Option<String>,
        initial_message: Option<String>,
    ) -> Result<Conversation, WorkbenchError> {
        let project = self.projects.get(project_id).await?;
        Ok(self
            .conversations
            .create(&project, title, initial_message)
            .await?)
    }

    /// Run one conversation turn through the command interpreter.
    pub async fn send_message(
        &self,
        conversation_id: &str,
        message: &str,
    ) -> Result<Reply, InterpreterError> {
        self.interpreter.handle_message(conversation_id, message).await
    }

    /// Run `task` on the agent named `agent`.
    pub async fn execute_task(&self, agent: &str, task: Task) -> Result<TaskOutput, DispatchError> {
        self.dispatcher.execute(agent, task).await
    }

    /// Current counters.
    pub async fn health(&self) -> Result<Health, WorkbenchError> {
        Ok(Health {
            status: "healthy",
            projects: self.projects.count().await?,
            conversations: self.conversations.count().await?,
            agents: self.dispatcher.len(),
            sandbox_enabled: self.engine.is_enabled(),
        })
    }
}

fn default_dispatcher(
    projects: &Arc<ProjectRegistry>,
    engine: &Arc<ExecutionEngine>,
) -> AgentDispatcher {
    AgentDispatcher::new()
        .with(ProjectManagerProvider::default())
        .with(DeveloperProvider::new(Arc::clone(engine)))
        .with(FilesProvider::new(Arc::clone(projects)))
        .with(QaProvider)
        .with(DevopsProvider)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::sandbox::DockerCli;

    fn workbench(root: &std::path::Path) -> Workbench {
        let mut config = WorkbenchConfig {
            projects_root: root.to_path_buf(),
            ..Default::default()
        };
        config.sandbox.enabled = false;
        let engine = ExecutionEngine::new(&config.sandbox, Arc::new(DockerCli::default()));
        Workbench::new(config, engine)
    }

    #[tokio::test]
    async fn test_health_counts() {
        let dir = tempfile::tempdir().unwrap();
        let wb = workbench(dir.path());

        let health = wb.health().await.unwrap();
        assert_eq!(health.projects, 0);
        assert_eq!(health.agents, 5);
        assert!(!health.sandbox_enabled);

        let project = wb
            .create_project(NewProject {
                name: "demo".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        wb.create_conversation(&project.id, None, Some("hi".to_string()))
            .await
            .unwrap();

        let health = wb.health().await.unwrap();
        assert_eq!(health.projects, 1);
        assert_eq!(health.conversations, 1);
    }

    #[tokio::test]
    async fn test_conversation_requires_project() {
        let dir = tempfile::tempdir().unwrap();
        let wb = workbench(dir.path());

        let err = wb.create_conversation("missing", None, None).await.unwrap_err();
        assert!(matches!(
            err,
            WorkbenchError::Project(ProjectError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_default_agents() {
        let dir = tempfile::tempdir().unwrap();
        let wb = workbench(dir.path());

        let names: Vec<_> = wb.dispatcher().list().into_iter().map(|a| a.name).collect();
        assert_eq!(
            names,
            vec!["project_manager", "developer", "files", "qa", "devops"]
        );
    }
}
