//! Container runtime seam and the `docker`-compatible CLI implementation.

use std::fmt;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use super::SandboxError;
use crate::limits::ResourceLimits;

/// Maximum processes inside one container.
const PIDS_LIMIT: u32 = 64;

/// Everything needed to create one isolated execution context.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    /// Container name, unique per execution
    pub name: String,
    /// Image to run
    pub image: String,
    /// Command line, code included
    pub command: Vec<String>,
    /// CPU and memory caps
    pub limits: ResourceLimits,
}

/// What a container produced before exiting.
#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    /// Captured standard output, at most the requested cap
    pub stdout: Vec<u8>,
    /// Captured standard error, at most the requested cap
    pub stderr: Vec<u8>,
    /// Process exit code
    pub exit_code: i32,
    /// Whether either stream produced more than was kept
    pub truncated: bool,
}

/// Operations the engine needs from a container runtime.
#[async_trait]
pub trait ContainerRuntime: Send + Sync + fmt::Debug {
    /// Check that the runtime is reachable.
    async fn ping(&self) -> Result<(), SandboxError>;

    /// Create (but do not start) a container, returning its id.
    async fn create(&self, spec: &ContainerSpec) -> Result<String, SandboxError>;

    /// Start a created container and wait for it to exit.
    ///
    /// At most `output_cap` bytes of each stream are held in memory while
    /// the container runs; the rest is read and discarded.
    async fn run(&self, id: &str, output_cap: usize) -> Result<RunOutput, SandboxError>;

    /// Forcefully stop a running container.
    async fn kill(&self, id: &str) -> Result<(), SandboxError>;

    /// Remove a container, stopping it first if needed.
    async fn remove(&self, id: &str) -> Result<(), SandboxError>;

    /// Whether the container exists and is still running.
    async fn is_running(&self, id: &str) -> Result<bool, SandboxError>;
}

/// Runtime driven through the `docker` CLI (or a compatible one such as
/// `podman`).
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl DockerCli {
    /// Use the given CLI binary.
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    fn unavailable(&self, e: std::io::Error) -> SandboxError {
        SandboxError::Unavailable(format!("failed to run {}: {e}", self.binary))
    }

    async fn invoke(&self, args: &[&str]) -> Result<std::process::Output, SandboxError> {
        self.command(args)
            .output()
            .await
            .map_err(|e| self.unavailable(e))
    }

    async fn checked(&self, args: &[&str]) -> Result<String, SandboxError> {
        let output = self.invoke(args).await?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(SandboxError::Runtime(format!(
                "{} {} failed: {}",
                self.binary,
                args.first().copied().unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }

    fn create_args(spec: &ContainerSpec) -> Vec<String> {
        let memory = spec.limits.max_memory_bytes.to_string();
        let cpus = spec.limits.cpus();
        let pids = PIDS_LIMIT.to_string();
        let mut args: Vec<String> = [
            "create",
            "--name",
            spec.name.as_str(),
            "--network",
            "none",
            "--memory",
            memory.as_str(),
            "--memory-swap",
            memory.as_str(),
            "--cpus",
            cpus.as_str(),
            "--pids-limit",
            pids.as_str(),
            "--read-only",
            "--tmpfs",
            "/tmp:rw,size=64m",
            "--workdir",
            "/tmp",
            "--cap-drop",
            "ALL",
            "--security-opt",
            "no-new-privileges",
            spec.image.as_str(),
        ]
        .into_iter()
        .map(String::from)
        .collect();
        args.extend(spec.command.iter().cloned());
        args
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn ping(&self) -> Result<(), SandboxError> {
        self.checked(&["version"]).await.map(|_| ())
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<String, SandboxError> {
        let args = Self::create_args(spec);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let id = self.checked(&args).await?;
        if id.is_empty() {
            return Err(SandboxError::Runtime("runtime returned no container id".to_string()));
        }
        Ok(id)
    }

    async fn run(&self, id: &str, output_cap: usize) -> Result<RunOutput, SandboxError> {
        let mut child = self
            .command(&["start", "--attach", id])
            .spawn()
            .map_err(|e| self.unavailable(e))?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(SandboxError::Runtime("container output was not piped".to_string()));
        };

        let ((stdout, stdout_cut), (stderr, stderr_cut), status) = tokio::try_join!(
            read_capped(stdout, output_cap),
            read_capped(stderr, output_cap),
            child.wait(),
        )
        .map_err(|e| self.unavailable(e))?;

        Ok(RunOutput {
            stdout,
            stderr,
            exit_code: status.code().unwrap_or(-1),
            truncated: stdout_cut || stderr_cut,
        })
    }

    async fn kill(&self, id: &str) -> Result<(), SandboxError> {
        self.checked(&["kill", id]).await.map(|_| ())
    }

    async fn remove(&self, id: &str) -> Result<(), SandboxError> {
        self.checked(&["rm", "--force", id]).await.map(|_| ())
    }

    async fn is_running(&self, id: &str) -> Result<bool, SandboxError> {
        let output = self
            .invoke(&["inspect", "--format", "{{.State.Running}}", id])
            .await?;
        // A missing container is not running.
        Ok(output.status.success() && String::from_utf8_lossy(&output.stdout).trim() == "true")
    }
}

/// Drain `reader` to the end, keeping only its first `cap` bytes.
///
/// Returns the kept bytes and whether anything was discarded. The stream is
/// always read to EOF so the writer never blocks on a full pipe.
async fn read_capped<R>(mut reader: R, cap: usize) -> std::io::Result<(Vec<u8>, bool)>
where
    R: AsyncRead + Unpin,
{
    let mut kept = Vec::new();
    let mut discarded = false;
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok((kept, discarded));
        }
        let take = n.min(cap.saturating_sub(kept.len()));
        kept.extend_from_slice(&chunk[..take]);
        discarded |= take < n;
    }
}

/// A created container that must be removed on every exit path.
///
/// Call [`release`](Self::release) when done. If the lease is dropped
/// without being released (early return, panic, cancelled future) removal
/// is spawned onto the current Tokio runtime instead.
#[must_use = "a container lease must be released"]
pub struct ContainerLease {
    runtime: Arc<dyn ContainerRuntime>,
    id: Option<String>,
}

impl fmt::Debug for ContainerLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerLease")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl ContainerLease {
    /// Create a container for `spec`.
    pub async fn acquire(
        runtime: Arc<dyn ContainerRuntime>,
        spec: &ContainerSpec,
    ) -> Result<Self, SandboxError> {
        let id = runtime.create(spec).await?;
        tracing::debug!(container = %id, image = %spec.image, "created container");
        Ok(Self {
            runtime,
            id: Some(id),
        })
    }

    /// The container id.
    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    /// Remove the container and wait for the removal.
    pub async fn release(mut self) {
        if let Some(id) = self.id.take() {
            match self.runtime.remove(&id).await {
                Ok(()) => tracing::debug!(container = %id, "removed container"),
                Err(e) => tracing::error!(container = %id, error = %e, "failed to remove container"),
            }
        }
    }
}

impl Drop for ContainerLease {
    fn drop(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let runtime = Arc::clone(&self.runtime);
                handle.spawn(async move {
                    if let Err(e) = runtime.remove(&id).await {
                        tracing::error!(container = %id, error = %e, "failed to remove container");
                    }
                });
            }
            Err(_) => {
                tracing::error!(container = %id, "container lease dropped outside a runtime; container leaked");
            }
        }
    }
}
