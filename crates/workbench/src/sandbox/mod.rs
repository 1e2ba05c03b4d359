//! Sandboxed execution engine.
//!
//! Each [`ExecutionRequest`] runs in its own freshly created container with
//! no network, no host mounts and CPU/memory caps. The container is torn
//! down on every exit path, including timeouts, where it is killed first.

mod container;
mod runner;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Semaphore;
use uuid::Uuid;

pub use container::{ContainerLease, ContainerRuntime, ContainerSpec, DockerCli, RunOutput};
pub use runner::{LanguageRunner, NodeRunner, PythonRunner, RunnerRegistry};

use crate::config::SandboxConfig;
use crate::limits::{OutputCap, ResourceLimits};

/// Errors from the container runtime.
///
/// These never escape [`ExecutionEngine::execute`]; they become an
/// [`ExecutionStatus::Failed`] result.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The runtime could not be reached at all
    #[error("container runtime unavailable: {0}")]
    Unavailable(String),
    /// The runtime rejected a request
    #[error("container runtime error: {0}")]
    Runtime(String),
}

/// Outcome class of one execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// The code ran and exited with status 0
    Success,
    /// The code ran and failed (non-zero exit, exception)
    Error,
    /// The time budget ran out and the context was killed
    Timeout,
    /// Execution is administratively switched off
    Disabled,
    /// No runner is registered for the language
    Unsupported,
    /// The sandbox infrastructure itself failed
    Failed,
}

impl ExecutionStatus {
    /// Lowercase name, as serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::Error => "error",
            ExecutionStatus::Timeout => "timeout",
            ExecutionStatus::Disabled => "disabled",
            ExecutionStatus::Unsupported => "unsupported",
            ExecutionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A snippet to run.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    /// Source code
    pub code: String,
    /// Language name or alias
    pub language: String,
    /// Wall-clock budget; the configured default applies when absent
    pub time_limit: Option<Duration>,
}

impl ExecutionRequest {
    /// A request using the default time budget.
    pub fn new(code: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            language: language.into(),
            time_limit: None,
        }
    }

    /// Set an explicit time budget.
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }
}

/// Statistics about one execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStats {
    /// Wall clock time in milliseconds
    pub wall_time_ms: u64,
}

/// Result of one execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Outcome class
    pub status: ExecutionStatus,
    /// Captured stdout followed by stderr, capped at the output limit
    pub output: String,
    /// Diagnostic text for every non-success status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Language the code was run as
    pub language: String,
    /// Exit code when the code ran to completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Whether output was cut at the limit
    #[serde(default)]
    pub truncated: bool,
    /// Execution statistics
    #[serde(default)]
    pub stats: ExecutionStats,
}

impl ExecutionResult {
    fn without_output(status: ExecutionStatus, language: &str, error: impl Into<String>) -> Self {
        Self {
            status,
            output: String::new(),
            error: Some(error.into()),
            language: language.to_string(),
            exit_code: None,
            truncated: false,
            stats: ExecutionStats::default(),
        }
    }

    /// Whether the code ran and succeeded.
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

/// Runs snippets in disposable containers.
pub struct ExecutionEngine {
    enabled: bool,
    runners: RunnerRegistry,
    runtime: Arc<dyn ContainerRuntime>,
    limits: ResourceLimits,
    max_concurrent: usize,
    semaphore: Arc<Semaphore>,
}

impl fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("enabled", &self.enabled)
            .field("languages", &self.runners.languages())
            .field("max_concurrent", &self.max_concurrent)
            .finish_non_exhaustive()
    }
}

impl ExecutionEngine {
    /// Create an engine over `runtime` with the built-in runners.
    ///
    /// No availability check is made; see [`connect`](Self::connect).
    pub fn new(config: &SandboxConfig, runtime: Arc<dyn ContainerRuntime>) -> Self {
        let max_concurrent = config.max_concurrent.max(1);
        Self {
            enabled: config.enabled,
            runners: RunnerRegistry::with_defaults(),
            runtime,
            limits: config.limits.clone(),
            max_concurrent,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    /// Create an engine using the configured runtime CLI, probing it once.
    ///
    /// An unreachable runtime disables the engine instead of failing.
    pub async fn connect(config: &SandboxConfig) -> Self {
        let runtime = Arc::new(DockerCli::new(&config.runtime_binary));
        let mut engine = Self::new(config, runtime);

        if !config.enabled {
            tracing::info!("sandboxed execution disabled by configuration");
            return engine;
        }

        match engine.runtime.ping().await {
            Ok(()) => {
                tracing::info!(runtime = %config.runtime_binary, "container runtime available")
            }
            Err(e) => {
                tracing::warn!(
                    runtime = %config.runtime_binary,
                    error = %e,
                    "container runtime unreachable; sandboxed execution disabled"
                );
                engine.enabled = false;
            }
        }
        engine
    }

    /// Replace the runner table.
    pub fn with_runners(mut self, runners: RunnerRegistry) -> Self {
        self.runners = runners;
        self
    }

    /// Whether executions are attempted at all.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Registered runners.
    pub fn runners(&self) -> &RunnerRegistry {
        &self.runners
    }

    /// Limits applied to each context.
    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Run one snippet. Never fails; every outcome is an [`ExecutionResult`].
    pub async fn execute(&self, request: ExecutionRequest) -> ExecutionResult {
        let start = Instant::now();
        let requested = request.language.trim().to_lowercase();

        if !self.enabled {
            return ExecutionResult::without_output(
                ExecutionStatus::Disabled,
                &requested,
                "code execution sandbox is disabled",
            );
        }

        let Some(runner) = self.runners.get(&requested) else {
            return ExecutionResult::without_output(
                ExecutionStatus::Unsupported,
                &requested,
                format!("language '{}' is not supported", request.language.trim()),
            );
        };
        let language = runner.language().to_string();
        let budget = self.limits.time_budget(request.time_limit);

        let Ok(_permit) = self.semaphore.acquire().await else {
            return ExecutionResult::without_output(
                ExecutionStatus::Failed,
                &language,
                "execution engine is shutting down",
            );
        };

        let spec = ContainerSpec {
            name: format!("workbench-{}", Uuid::new_v4().simple()),
            image: runner.image().to_string(),
            command: runner.command(&request.code),
            limits: self.limits.clone(),
        };

        let lease = match ContainerLease::acquire(Arc::clone(&self.runtime), &spec).await {
            Ok(lease) => lease,
            Err(e) => {
                tracing::error!(%language, error = %e, "failed to create execution context");
                return ExecutionResult::without_output(ExecutionStatus::Failed, &language, e.to_string());
            }
        };

        let run = self.runtime.run(lease.id(), self.limits.output_cap());
        let mut result = match tokio::time::timeout(budget, run).await {
            Ok(Ok(output)) => self.completed(&language, output),
            Ok(Err(e)) => ExecutionResult::without_output(ExecutionStatus::Failed, &language, e.to_string()),
            Err(_) => {
                if let Err(e) = self.runtime.kill(lease.id()).await {
                    tracing::warn!(container = %lease.id(), error = %e, "failed to kill timed out container");
                }
                ExecutionResult::without_output(
                    ExecutionStatus::Timeout,
                    &language,
                    format!("execution timed out after {} ms", budget.as_millis()),
                )
            }
        };
        lease.release().await;

        result.stats.wall_time_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            %language,
            status = %result.status,
            wall_time_ms = result.stats.wall_time_ms,
            truncated = result.truncated,
            "execution finished"
        );
        result
    }

    fn completed(&self, language: &str, output: RunOutput) -> ExecutionResult {
        let limit = self.limits.output_cap();
        let mut combined = OutputCap::new(limit);
        combined.push(&output.stdout);
        combined.push(&output.stderr);
        if output.truncated {
            combined.mark_truncated();
        }
        let truncated = combined.overflowed();
        let combined = combined.into_string();

        let (status, error) = if output.exit_code == 0 {
            (ExecutionStatus::Success, None)
        } else {
            let mut diagnostic = OutputCap::new(limit);
            diagnostic.push(&output.stderr);
            let diagnostic = diagnostic.into_string();
            let diagnostic = if diagnostic.trim().is_empty() {
                format!("process exited with code {}", output.exit_code)
            } else {
                diagnostic
            };
            (ExecutionStatus::Error, Some(diagnostic))
        };

        ExecutionResult {
            status,
            output: combined,
            error,
            language: language.to_string(),
            exit_code: Some(output.exit_code),
            truncated,
            stats: ExecutionStats::default(),
        }
    }
}
