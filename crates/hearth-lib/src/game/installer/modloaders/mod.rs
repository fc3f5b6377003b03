pub mod forge;
pub mod neoforge;

pub use forge::{forge_candidates, ForgeInstaller};
pub use neoforge::{neoforge_candidates, neoforge_prefix, neoforge_supported, NeoForgeInstaller};

use crate::error::InstallError;
use crate::game::installer::types::ProgressSink;
use crate::utils::process::HearthCommandExt;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::ffi::OsStr;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

/// Installer processes get this long before they are killed.
pub const INSTALLER_TIMEOUT: Duration = Duration::from_secs(300);

/// Where a Forge-family loader is published and how its installer is run.
///
/// Forge and NeoForge share the same installer format; only the version
/// listing and the maven coordinates differ, so both front ends sit on top
/// of one of these.
#[async_trait]
pub trait LoaderDistribution: Send + Sync {
    /// Every published version string, in no particular order.
    async fn all_versions(&self) -> Result<Vec<String>>;

    /// Fetch and run the installer for `full_version`. Returns the version id
    /// the installer wrote, if it could tell.
    async fn run_installer(
        &self,
        game_version: &str,
        full_version: &str,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<Option<String>>;
}

/// File name used for OptiFine when it is dropped into a mods folder.
pub fn optifine_jar_name(game_version: &str, edition: &str) -> String {
    format!("OptiFine_{}_{}.jar", game_version, edition)
}

/// Run an installer subprocess to completion.
///
/// A non-zero exit is reported as [`InstallError::SubprocessNonZero`]; the
/// tail of stderr goes to the log only.
pub async fn run_installer_process<I, S>(
    program: impl AsRef<OsStr>,
    args: I,
    sink: &dyn ProgressSink,
) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program.as_ref());
    command
        .args(args)
        .suppress_console()
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    log::debug!("[install] Executing: {:?}", command);
    sink.on_status("Running loader installer");

    let output = tokio::time::timeout(INSTALLER_TIMEOUT, command.output())
        .await
        .context("Installer timed out")?
        .context("Failed to spawn installer process")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: Vec<&str> = stderr.lines().rev().take(20).collect();
        log::error!("[install] Installer failed:");
        for line in tail.into_iter().rev() {
            log::error!("[install]   {}", line);
        }
        let code = output.status.code().unwrap_or(-1);
        return Err(InstallError::SubprocessNonZero { code }.into());
    }
    Ok(())
}
