//! Per-runtime launch strategies.
//!
//! A strategy prepares the scaffolded job directory synchronously (any
//! failure is fatal and nothing is launched) and then describes the command
//! that starts the function. The runner owns the process environment:
//! `PORT`, `LISTEN_ADDRESS`, `PWD` and the function's run envs.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

use fnkit_core::Function;

use crate::error::RunError;

/// Everything a strategy needs to know about the job being launched.
#[derive(Debug, Clone, Copy)]
pub struct LaunchContext<'a> {
    pub function: &'a Function,
    /// Scaffolded job directory; also the process working directory.
    pub dir: &'a Path,
    pub host: &'a str,
    pub port: u16,
    pub verbose: bool,
}

#[async_trait]
pub trait LaunchStrategy: Send + Sync {
    /// Resolve dependencies and compile. Runs to completion before launch.
    async fn prepare(&self, ctx: &LaunchContext<'_>) -> Result<(), RunError>;

    /// Command that starts the prepared function.
    fn command(&self, ctx: &LaunchContext<'_>) -> Command;
}

// ---------------------------------------------------------------------------
// Go
// ---------------------------------------------------------------------------

pub const GO_BINARY: &str = "f.bin";

/// Compiles the scaffold with the Go toolchain and runs the binary.
#[derive(Debug, Clone)]
pub struct GoStrategy {
    pub go: String,
}

impl Default for GoStrategy {
    fn default() -> Self {
        Self { go: "go".to_string() }
    }
}

#[async_trait]
impl LaunchStrategy for GoStrategy {
    async fn prepare(&self, ctx: &LaunchContext<'_>) -> Result<(), RunError> {
        run_step(ctx, "go mod download", &self.go, &["mod", "download"]).await?;
        run_step(ctx, "go build", &self.go, &["build", "-o", GO_BINARY]).await
    }

    fn command(&self, ctx: &LaunchContext<'_>) -> Command {
        Command::new(ctx.dir.join(GO_BINARY))
    }
}

// ---------------------------------------------------------------------------
// Python
// ---------------------------------------------------------------------------

/// Installs dependencies into a job-local virtualenv and runs the
/// interpreter from it.
#[derive(Debug, Clone)]
pub struct PythonStrategy {
    pub python: String,
}

impl Default for PythonStrategy {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
        }
    }
}

#[async_trait]
impl LaunchStrategy for PythonStrategy {
    async fn prepare(&self, ctx: &LaunchContext<'_>) -> Result<(), RunError> {
        run_step(ctx, "python venv", &self.python, &["-m", "venv", ".venv"]).await?;
        let pip = venv_bin(ctx.dir, "pip");
        let pip = pip.to_string_lossy();
        if ctx.dir.join("pyproject.toml").is_file() {
            run_step(ctx, "pip install", &pip, &["install", "."]).await
        } else if ctx.dir.join("requirements.txt").is_file() {
            run_step(ctx, "pip install", &pip, &["install", "-r", "requirements.txt"]).await
        } else {
            Ok(())
        }
    }

    fn command(&self, ctx: &LaunchContext<'_>) -> Command {
        let mut cmd = Command::new(venv_bin(ctx.dir, "python"));
        if ctx.dir.join("service").join("main.py").is_file() {
            cmd.args(["-m", "service.main"]);
        } else {
            cmd.arg("main.py");
        }
        cmd
    }
}

fn venv_bin(dir: &Path, program: &str) -> std::path::PathBuf {
    dir.join(".venv").join("bin").join(program)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Run one preparation step in the job directory, failing with its output.
pub async fn run_step(
    ctx: &LaunchContext<'_>,
    step: &'static str,
    program: &str,
    args: &[&str],
) -> Result<(), RunError> {
    tracing::info!(step, dir = %ctx.dir.display(), "preparing function");
    let output = Command::new(program)
        .args(args)
        .current_dir(ctx.dir)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| RunError::Spawn {
            program: program.to_string(),
            source,
        })?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Err(RunError::Prepare {
        step,
        status: output.status.to_string(),
        detail: format!("{stdout} {stderr}").trim().to_string(),
    })
}
