/// Process boundary for the game itself
use crate::game::launcher::types::LaunchSpec;
use crate::utils::process::HearthCommandExt;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::{Child, ChildStderr, ChildStdout};

/// Running game process.
#[derive(Debug)]
pub struct ProcessHandle {
    pid: Option<u32>,
    child: Child,
}

impl ProcessHandle {
    /// Wrap a child spawned by some other runner.
    pub fn from_child(child: Child) -> Self {
        Self {
            pid: child.id(),
            child,
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Take the stdout pipe. Returns `None` after the first call.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Wait for exit. A process killed by a signal reports `-1`.
    pub async fn wait(&mut self) -> Result<i32> {
        let status = self
            .child
            .wait()
            .await
            .context("Failed to wait for game process")?;
        Ok(status.code().unwrap_or(-1))
    }

    pub async fn kill(&mut self) -> Result<()> {
        self.child
            .kill()
            .await
            .context("Failed to kill game process")
    }
}

#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn launch(&self, spec: &LaunchSpec) -> Result<ProcessHandle>;
}

/// Spawns the game with `tokio::process`, piping stdout and stderr.
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn launch(&self, spec: &LaunchSpec) -> Result<ProcessHandle> {
        log::info!(
            "[launch] Spawning {} with {} argument(s)",
            spec.executable.display(),
            spec.args.len()
        );
        log::debug!("[launch] Arguments: {:?}", spec.args);

        let child = tokio::process::Command::new(&spec.executable)
            .args(&spec.args)
            .current_dir(&spec.working_directory)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .suppress_console()
            .spawn()
            .with_context(|| format!("Failed to start {}", spec.executable.display()))?;

        let pid = child.id();
        log::info!("[launch] Game started (pid {:?})", pid);
        Ok(ProcessHandle { pid, child })
    }
}
