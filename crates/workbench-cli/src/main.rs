//! Workbench CLI - run one snippet in the sandbox
//!
//! Usage:
//!   workbench -l python -c "print(1)"   Run inline code
//!   workbench script.js                 Run a file, language from its extension
//!   workbench -l python                 Read code from stdin
//!
//! Exit status: 0 success, 1 error or sandbox failure, 2 disabled or
//! unsupported, 124 timeout.

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use workbench::interpreter::DEFAULT_LANGUAGE;
use workbench::{ExecutionEngine, ExecutionRequest, ExecutionStatus, SandboxConfig};

/// Run a code snippet in a disposable container
#[derive(Parser, Debug)]
#[command(name = "workbench")]
#[command(about = "Run a code snippet in the workbench sandbox")]
struct Args {
    /// Language of the code; inferred from the file extension when omitted
    #[arg(short, long)]
    language: Option<String>,

    /// Inline code to run
    #[arg(short, long, conflicts_with = "file")]
    code: Option<String>,

    /// File holding the code; stdin when neither this nor -c is given
    file: Option<PathBuf>,

    /// Wall-clock budget in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Container runtime CLI
    #[arg(long, env = "SANDBOX_RUNTIME", default_value = "docker")]
    runtime: String,
}

fn exit_status(status: ExecutionStatus) -> u8 {
    match status {
        ExecutionStatus::Success => 0,
        ExecutionStatus::Error | ExecutionStatus::Failed => 1,
        ExecutionStatus::Disabled | ExecutionStatus::Unsupported => 2,
        ExecutionStatus::Timeout => 124,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .init();

    let args = Args::parse();

    let code = match (&args.code, &args.file) {
        (Some(code), _) => code.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        (None, None) => {
            let mut code = String::new();
            io::stdin()
                .read_to_string(&mut code)
                .context("failed to read stdin")?;
            code
        }
    };

    let config = SandboxConfig {
        runtime_binary: args.runtime.clone(),
        ..Default::default()
    };
    let engine = ExecutionEngine::connect(&config).await;

    let language = args
        .language
        .clone()
        .or_else(|| {
            let extension = args.file.as_ref()?.extension()?.to_str()?;
            engine
                .runners()
                .for_extension(extension)
                .map(|runner| runner.language().to_string())
        })
        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

    let mut request = ExecutionRequest::new(code, language);
    if let Some(ms) = args.timeout_ms {
        request = request.with_time_limit(Duration::from_millis(ms));
    }
    let result = engine.execute(request).await;

    io::stdout().write_all(result.output.as_bytes())?;
    io::stdout().flush()?;
    if let Some(error) = &result.error
        && !result.output.contains(error.as_str())
    {
        eprintln!("workbench: {}: {error}", result.status);
    }

    Ok(ExitCode::from(exit_status(result.status)))
}
