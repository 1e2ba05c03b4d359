//! Agent Task Dispatcher.
//!
//! A uniform `execute(agent, task)` entry point over named
//! [`CapabilityProvider`]s. Tasks are a `type` tag plus free-form
//! parameters; results are JSON values tagged with the task kind.

mod builtin;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub use builtin::{
    DeveloperProvider, DevopsProvider, FilesProvider, ProjectManagerProvider, QaProvider,
};

use crate::project::{FileError, ProjectError};
use crate::store::StoreError;

/// Errors from dispatching or executing a task.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No provider registered under this name
    #[error("unknown agent: {0}")]
    UnknownAgent(String),
    /// The provider does not handle this task kind
    #[error("agent '{agent}' does not handle task type '{kind}'")]
    UnknownTaskKind {
        /// Provider name
        agent: String,
        /// Requested task kind
        kind: String,
    },
    /// A required task parameter is absent
    #[error("missing task parameter: {0}")]
    MissingParameter(String),
    /// A task parameter has the wrong shape or value
    #[error("invalid task parameter '{name}': {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// What is wrong with it
        reason: String,
    },
    /// The requested variant (framework, language...) is not available
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// A project or other named entity does not exist
    #[error("not found: {0}")]
    NotFound(String),
    /// File Tool failure
    #[error(transparent)]
    File(#[from] FileError),
    /// Project registry failure
    #[error(transparent)]
    Project(ProjectError),
    /// Provider state could not be read or written
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Result could not be encoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ProjectError> for DispatchError {
    fn from(e: ProjectError) -> Self {
        match e {
            ProjectError::NotFound(id) => DispatchError::NotFound(format!("project {id}")),
            ProjectError::File(e) => DispatchError::File(e),
            other => DispatchError::Project(other),
        }
    }
}

impl DispatchError {
    /// Stable machine-readable name of the condition.
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::UnknownAgent(_) => "unknown_agent",
            DispatchError::UnknownTaskKind { .. } => "unknown_task_kind",
            DispatchError::MissingParameter(_) => "missing_parameter",
            DispatchError::InvalidParameter { .. } => "invalid_parameter",
            DispatchError::Unsupported(_) => "unsupported",
            DispatchError::NotFound(_) => "not_found",
            DispatchError::File(e) => e.code(),
            DispatchError::Project(_) => "project_error",
            DispatchError::Store(_) => "store_error",
            DispatchError::Serialization(_) => "serialization_error",
        }
    }
}

/// A unit of work: a kind tag plus parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Task kind, e.g. `execute_code`
    #[serde(rename = "type")]
    pub kind: String,
    /// Kind-specific parameters
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl Task {
    /// A task with no parameters.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: Map::new(),
        }
    }

    /// Builder-style parameter setter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// A parameter, if present and not null.
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name).filter(|v| !v.is_null())
    }

    /// A required string parameter.
    pub fn str_param(&self, name: &str) -> Result<&str, DispatchError> {
        match self.param(name) {
            Some(Value::String(s)) => Ok(s),
            Some(_) => Err(DispatchError::InvalidParameter {
                name: name.to_string(),
                reason: "expected a string".to_string(),
            }),
            None => Err(DispatchError::MissingParameter(name.to_string())),
        }
    }

    /// An optional string parameter.
    pub fn opt_str_param(&self, name: &str) -> Result<Option<&str>, DispatchError> {
        match self.param(name) {
            None => Ok(None),
            Some(_) => self.str_param(name).map(Some),
        }
    }

    /// An object parameter; absent means empty.
    pub fn object_param(&self, name: &str) -> Result<Map<String, Value>, DispatchError> {
        match self.param(name) {
            None => Ok(Map::new()),
            Some(Value::Object(map)) => Ok(map.clone()),
            Some(_) => Err(DispatchError::InvalidParameter {
                name: name.to_string(),
                reason: "expected an object".to_string(),
            }),
        }
    }
}

/// The tagged result of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutput {
    /// Agent that ran the task
    pub agent: String,
    /// Task kind that produced this output
    #[serde(rename = "type")]
    pub kind: String,
    /// Kind-specific result
    pub data: Value,
}

/// A named component able to execute one or more task kinds.
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    /// Registry name, e.g. `developer`.
    fn name(&self) -> &str;

    /// One-line description.
    fn description(&self) -> &str;

    /// Task kinds this provider accepts.
    fn task_kinds(&self) -> &[&str];

    /// Execute a task whose kind is one of [`task_kinds`](Self::task_kinds).
    async fn execute(&self, task: &Task) -> Result<Value, DispatchError>;
}

/// Summary of a registered provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSummary {
    /// Registry name
    pub name: String,
    /// One-line description
    pub description: String,
    /// Accepted task kinds
    pub task_kinds: Vec<String>,
}

/// Registry of capability providers.
#[derive(Default, Clone)]
pub struct AgentDispatcher {
    providers: Vec<Arc<dyn CapabilityProvider>>,
}

impl fmt::Debug for AgentDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentDispatcher")
            .field(
                "providers",
                &self.providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl AgentDispatcher {
    /// An empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider, replacing any with the same name.
    pub fn register(&mut self, provider: Arc<dyn CapabilityProvider>) {
        self.providers.retain(|p| p.name() != provider.name());
        self.providers.push(provider);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, provider: impl CapabilityProvider + 'static) -> Self {
        self.register(Arc::new(provider));
        self
    }

    /// Look up a provider.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn CapabilityProvider>> {
        self.providers.iter().find(|p| p.name() == name)
    }

    /// Summaries of all providers, in registration order.
    pub fn list(&self) -> Vec<AgentSummary> {
        self.providers
            .iter()
            .map(|p| AgentSummary {
                name: p.name().to_string(),
                description: p.description().to_string(),
                task_kinds: p.task_kinds().iter().map(|k| k.to_string()).collect(),
            })
            .collect()
    }

    /// Number of providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether no provider is registered.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Run `task` on the provider named `agent`.
    pub async fn execute(&self, agent: &str, task: Task) -> Result<TaskOutput, DispatchError> {
        let Some(provider) = self.get(agent) else {
            tracing::warn!(%agent, kind = %task.kind, "task for unknown agent");
            return Err(DispatchError::UnknownAgent(agent.to_string()));
        };
        if !provider.task_kinds().contains(&task.kind.as_str()) {
            return Err(DispatchError::UnknownTaskKind {
                agent: agent.to_string(),
                kind: task.kind,
            });
        }

        let data = provider.execute(&task).await?;
        tracing::info!(%agent, kind = %task.kind, "task completed");
        Ok(TaskOutput {
            agent: agent.to_string(),
            kind: task.kind,
            data,
        })
    }
}
