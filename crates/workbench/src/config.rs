//! Service configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::limits::ResourceLimits;

/// Top-level configuration for a [`Workbench`](crate::Workbench).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkbenchConfig {
    /// Directory under which every project gets its own subdirectory
    pub projects_root: PathBuf,
    /// Sandboxed execution settings
    pub sandbox: SandboxConfig,
}

impl Default for WorkbenchConfig {
    fn default() -> Self {
        Self {
            projects_root: PathBuf::from("projects"),
            sandbox: SandboxConfig::default(),
        }
    }
}

/// Settings for the sandboxed execution engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Administrative switch; when off every execution reports `disabled`
    pub enabled: bool,
    /// Container runtime CLI (`docker`, `podman`, ...)
    pub runtime_binary: String,
    /// Maximum executions running at once
    pub max_concurrent: usize,
    /// Per-context resource limits
    pub limits: ResourceLimits,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            runtime_binary: "docker".to_string(),
            max_concurrent: 4,
            limits: ResourceLimits::default(),
        }
    }
}
