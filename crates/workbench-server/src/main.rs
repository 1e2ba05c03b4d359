//! Workbench HTTP Server
//!
//! Serves projects, conversations, file tools and agents over HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use workbench::{SandboxConfig, Workbench, WorkbenchConfig};
use workbench_server::WorkbenchServer;

/// Workbench server - project files, sandboxed execution and agents over HTTP
#[derive(Parser, Debug)]
#[command(name = "workbench-server")]
#[command(about = "HTTP server for workbench projects, conversations and agents")]
struct Args {
    /// Address to listen on
    #[arg(long, env = "WORKBENCH_ADDR", default_value = "127.0.0.1:8000")]
    addr: SocketAddr,

    /// Directory holding one subdirectory per project
    #[arg(long, env = "PROJECTS_ROOT", default_value = "projects")]
    projects_root: PathBuf,

    /// Enable sandboxed code execution
    #[arg(long, env = "SANDBOX_ENABLED", default_value_t = true, action = clap::ArgAction::Set)]
    sandbox_enabled: bool,

    /// Container runtime CLI
    #[arg(long, env = "SANDBOX_RUNTIME", default_value = "docker")]
    runtime: String,

    /// Maximum concurrent executions
    #[arg(long, env = "SANDBOX_MAX_CONCURRENT", default_value_t = 4)]
    max_concurrent: usize,

    /// Default execution timeout in milliseconds
    #[arg(long, env = "SANDBOX_TIMEOUT_MS", default_value_t = 30_000)]
    timeout_ms: u64,

    /// Memory limit per execution in MiB
    #[arg(long, env = "SANDBOX_MEMORY_MB", default_value_t = 256)]
    memory_mb: u64,
}

impl Args {
    fn config(&self) -> WorkbenchConfig {
        let mut sandbox = SandboxConfig {
            enabled: self.sandbox_enabled,
            runtime_binary: self.runtime.clone(),
            max_concurrent: self.max_concurrent,
            ..Default::default()
        };
        sandbox.limits.timeout = Duration::from_millis(self.timeout_ms);
        sandbox.limits.max_memory_bytes = self.memory_mb * 1024 * 1024;

        WorkbenchConfig {
            projects_root: self.projects_root.clone(),
            sandbox,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();
    let config = args.config();
    tokio::fs::create_dir_all(&config.projects_root).await?;
    tracing::info!(projects_root = %config.projects_root.display(), "starting workbench");

    let workbench = Workbench::connect(config).await;
    WorkbenchServer::new(args.addr, workbench).run().await
}
