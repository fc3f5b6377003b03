use super::LoaderDistribution;
use crate::game::installer::core::traits::{LoaderInstaller, LoaderVersion};
use crate::game::installer::types::ProgressSink;
use crate::game::profile::LoaderKind;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// NeoForge version prefix for a game version.
///
/// NeoForge numbers its builds `MAJOR.MINOR.PATCH[-beta]` where MAJOR and
/// MINOR are the game's second and third components: 1.20.4 maps to
/// `"20.4."`, and 1.21 maps to `"21.0."`.
pub fn neoforge_prefix(game_version: &str) -> Option<String> {
    let parts: Vec<&str> = game_version.split('.').collect();
    if parts.len() < 2 {
        return None;
    }
    let major: u32 = parts[1].parse().ok()?;
    let minor: u32 = match parts.get(2) {
        Some(p) => p.parse().ok()?,
        None => 0,
    };
    Some(format!("{}.{}.", major, minor))
}

fn patch_number(version: &str) -> u64 {
    version
        .replace("-beta", "")
        .split('.')
        .nth(2)
        .and_then(|p| p.parse().ok())
        .unwrap_or(0)
}

/// NeoForge builds for `game_version`: stable first, then newest patch first.
///
/// Snapshot builds (`craftmine`, `0.*`) are never offered.
pub fn neoforge_candidates(all: &[String], game_version: &str) -> Vec<LoaderVersion> {
    let Some(prefix) = neoforge_prefix(game_version) else {
        return Vec::new();
    };
    let mut versions: Vec<LoaderVersion> = all
        .iter()
        .filter(|v| !v.to_lowercase().contains("craftmine") && !v.starts_with("0."))
        .filter(|v| v.starts_with(&prefix))
        .map(|v| LoaderVersion::new(v.clone(), !v.to_lowercase().contains("beta")))
        .collect();
    versions.sort_by(|a, b| {
        b.stable
            .cmp(&a.stable)
            .then_with(|| patch_number(&b.version).cmp(&patch_number(&a.version)))
    });
    versions
}

/// NeoForge exists for 1.20 and later.
pub fn neoforge_supported(game_version: &str) -> bool {
    let mut parts = game_version.split('.');
    let major = parts.next().and_then(|p| p.parse::<u32>().ok());
    let minor = parts.next().and_then(|p| p.parse::<u32>().ok());
    matches!((major, minor), (Some(1), Some(minor)) if minor >= 20)
}

pub struct NeoForgeInstaller<D> {
    distribution: D,
}

impl<D: LoaderDistribution> NeoForgeInstaller<D> {
    pub fn new(distribution: D) -> Self {
        Self { distribution }
    }
}

#[async_trait]
impl<D: LoaderDistribution> LoaderInstaller for NeoForgeInstaller<D> {
    fn kind(&self) -> LoaderKind {
        LoaderKind::NeoForge
    }

    async fn list_versions(&self, game_version: &str) -> Result<Vec<LoaderVersion>> {
        if !neoforge_supported(game_version) {
            return Ok(Vec::new());
        }
        let all = self.distribution.all_versions().await?;
        Ok(neoforge_candidates(&all, game_version))
    }

    async fn is_supported(&self, game_version: &str) -> Result<bool> {
        Ok(neoforge_supported(game_version))
    }

    async fn install(
        &self,
        game_version: &str,
        loader_version: &str,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<Option<String>> {
        // NeoForge versions are used as-is, not prefixed with the game version
        log::info!(
            "[install] Installing NeoForge {} for Minecraft {}",
            loader_version,
            game_version
        );
        self.distribution
            .run_installer(game_version, loader_version, sink)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn prefix_follows_game_version() {
        assert_eq!(neoforge_prefix("1.20.4").as_deref(), Some("20.4."));
        assert_eq!(neoforge_prefix("1.21").as_deref(), Some("21.0."));
        assert_eq!(neoforge_prefix("1.21.1").as_deref(), Some("21.1."));
        assert_eq!(neoforge_prefix("1"), None);
        assert_eq!(neoforge_prefix("1.x"), None);
    }

    #[test]
    fn stable_first_then_patch_descending() {
        let all = strings(&[
            "21.1.5",
            "21.1.70-beta",
            "21.1.65",
            "21.1.9",
            "21.10.1",
            "0.25w14craftmine.3-beta",
            "20.4.200",
        ]);
        let versions: Vec<(String, bool)> = neoforge_candidates(&all, "1.21.1")
            .into_iter()
            .map(|v| (v.version, v.stable))
            .collect();
        assert_eq!(
            versions,
            vec![
                ("21.1.65".to_string(), true),
                ("21.1.9".to_string(), true),
                ("21.1.5".to_string(), true),
                ("21.1.70-beta".to_string(), false),
            ]
        );
    }

    #[test]
    fn single_component_version_has_no_candidates() {
        assert!(neoforge_candidates(&strings(&["21.0.1"]), "1").is_empty());
    }

    #[test]
    fn supported_from_1_20() {
        assert!(neoforge_supported("1.20.1"));
        assert!(neoforge_supported("1.21"));
        assert!(!neoforge_supported("1.19.4"));
        assert!(!neoforge_supported("snapshot"));
    }
}
