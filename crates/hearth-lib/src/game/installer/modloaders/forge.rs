use super::LoaderDistribution;
use crate::game::installer::core::traits::{LoaderInstaller, LoaderVersion};
use crate::game::installer::types::ProgressSink;
use crate::game::profile::{full_forge_version, LoaderKind};
use crate::utils::version::compare_versions;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

const MAX_FORGE_CANDIDATES: usize = 20;

/// Forge builds for `game_version`, newest first.
///
/// Forge publishes versions as `"<game>-<build>"`, e.g. `"1.20.1-47.2.0"`;
/// the full string is kept since that is what the installer wants.
pub fn forge_candidates(all: &[String], game_version: &str) -> Vec<LoaderVersion> {
    let prefix = format!("{}-", game_version);
    let mut matching: Vec<&String> = all.iter().filter(|v| v.starts_with(&prefix)).collect();
    matching.sort_by(|a, b| compare_versions(b, a));
    matching.dedup();
    matching
        .into_iter()
        .take(MAX_FORGE_CANDIDATES)
        .map(|v| LoaderVersion::new(v.clone(), true))
        .collect()
}

pub struct ForgeInstaller<D> {
    distribution: D,
}

impl<D: LoaderDistribution> ForgeInstaller<D> {
    pub fn new(distribution: D) -> Self {
        Self { distribution }
    }
}

#[async_trait]
impl<D: LoaderDistribution> LoaderInstaller for ForgeInstaller<D> {
    fn kind(&self) -> LoaderKind {
        LoaderKind::Forge
    }

    async fn list_versions(&self, game_version: &str) -> Result<Vec<LoaderVersion>> {
        let all = self.distribution.all_versions().await?;
        Ok(forge_candidates(&all, game_version))
    }

    async fn install(
        &self,
        game_version: &str,
        loader_version: &str,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<Option<String>> {
        let full = full_forge_version(game_version, loader_version);
        log::info!("[install] Installing Forge {} for Minecraft {}", full, game_version);
        self.distribution.run_installer(game_version, &full, sink).await
    }
}
