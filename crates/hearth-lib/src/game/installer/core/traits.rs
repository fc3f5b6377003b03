//! Collaborators the orchestrator drives. Implementations live with the
//! embedding application; they own HTTP, downloads and installer subprocesses.

use crate::error::InstallError;
use crate::game::installer::core::local::LocalVersions;
use crate::game::installer::types::ProgressSink;
use crate::game::launcher::types::LaunchManifest;
use crate::game::profile::{LoaderKind, ModProvenance};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub id: String,
    /// "release", "snapshot", "old_beta", "old_alpha"
    #[serde(rename = "type", default = "default_version_type")]
    pub version_type: String,
    #[serde(rename = "releaseTime", default, skip_serializing_if = "Option::is_none")]
    pub release_time: Option<DateTime<Utc>>,
}

fn default_version_type() -> String {
    "release".to_string()
}

/// Game versions, installed and installable.
///
/// The installed-side operations have default implementations that work on
/// the standard `versions/<id>/<id>.json` layout under
/// [`versions_dir`](Self::versions_dir).
#[async_trait]
pub trait VersionCatalog: Send + Sync {
    fn versions_dir(&self) -> &Path;

    async fn list_available(
        &self,
        include_snapshots: bool,
        include_old: bool,
    ) -> Result<Vec<VersionInfo>>;

    /// Install a game version. Must be idempotent.
    async fn install(&self, id: &str, sink: Arc<dyn ProgressSink>) -> Result<()>;

    /// Classpath, main class and assets of an installed version.
    async fn launch_manifest(&self, id: &str) -> Result<LaunchManifest>;

    async fn list_installed(&self) -> Result<Vec<VersionInfo>> {
        LocalVersions::new(self.versions_dir()).list().await
    }

    async fn is_installed(&self, id: &str) -> Result<bool> {
        Ok(LocalVersions::new(self.versions_dir()).contains(id))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        LocalVersions::new(self.versions_dir()).delete(id).await
    }

    async fn size_of(&self, id: &str) -> Result<u64> {
        LocalVersions::new(self.versions_dir()).size_of(id).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderVersion {
    pub version: String,
    pub stable: bool,
}

impl LoaderVersion {
    pub fn new(version: impl Into<String>, stable: bool) -> Self {
        Self {
            version: version.into(),
            stable,
        }
    }
}

/// Installer for one loader kind.
#[async_trait]
pub trait LoaderInstaller: Send + Sync {
    fn kind(&self) -> LoaderKind;

    /// Loader versions usable with `game_version`, preferred first.
    async fn list_versions(&self, game_version: &str) -> Result<Vec<LoaderVersion>>;

    async fn is_supported(&self, game_version: &str) -> Result<bool> {
        Ok(!self.list_versions(game_version).await?.is_empty())
    }

    /// Install the loader as a game version. Returns the id the catalog
    /// stored it under, or `None` if the installer produced nothing.
    async fn install(
        &self,
        game_version: &str,
        loader_version: &str,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<Option<String>>;

    /// Install the loader as a mod jar in `mods_dir` instead of as a version.
    async fn install_as_mod(
        &self,
        _game_version: &str,
        _loader_version: &str,
        _mods_dir: &Path,
        _sink: Arc<dyn ProgressSink>,
    ) -> Result<PathBuf> {
        Err(InstallError::NotSupported(format!("{} as a mod", self.kind())).into())
    }
}

/// How one mod version relates to another project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    Required,
    Optional,
    Incompatible,
    Embedded,
    Tool,
    Include,
}

impl DependencyKind {
    /// CurseForge `relationType` codes.
    pub fn from_curseforge(code: u32) -> Option<Self> {
        match code {
            1 => Some(DependencyKind::Embedded),
            2 => Some(DependencyKind::Optional),
            3 => Some(DependencyKind::Required),
            4 => Some(DependencyKind::Tool),
            5 => Some(DependencyKind::Incompatible),
            6 => Some(DependencyKind::Include),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModDependency {
    pub project_id: String,
    /// Pinned version, if the registry gives one. Only used for display;
    /// dependencies are installed at their latest compatible version.
    pub version_id: Option<String>,
    pub kind: DependencyKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModVersion {
    pub project_id: String,
    pub version_id: String,
    pub name: String,
    pub filename: String,
    /// Empty means the registry did not say
    #[serde(default)]
    pub game_versions: Vec<String>,
    /// Registry loader names ("fabric", "forge", ...); empty means any
    #[serde(default)]
    pub loaders: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<ModDependency>,
}

impl ModVersion {
    pub fn is_compatible(&self, game_version: &str, loader: Option<&str>) -> bool {
        let game_ok = self.game_versions.is_empty()
            || self.game_versions.iter().any(|v| v == game_version);
        let loader_ok = match loader {
            Some(loader) => {
                self.loaders.is_empty() || self.loaders.iter().any(|l| l.eq_ignore_ascii_case(loader))
            }
            None => true,
        };
        game_ok && loader_ok
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModSearchHit {
    pub project_id: String,
    pub title: String,
    pub description: String,
    pub downloads: u64,
    pub provenance: ModProvenance,
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ModQuery {
    pub text: String,
    pub game_version: Option<String>,
    pub loader: Option<String>,
    pub limit: usize,
}

/// A public mod registry.
#[async_trait]
pub trait ModRegistry: Send + Sync {
    fn provenance(&self) -> ModProvenance;

    async fn search(&self, query: &ModQuery) -> Result<Vec<ModSearchHit>>;

    /// Versions of a project, newest first, optionally pre-filtered.
    async fn get_versions(
        &self,
        project_id: &str,
        game_version: Option<&str>,
        loader: Option<&str>,
    ) -> Result<Vec<ModVersion>>;

    /// Download `version` into `dest_dir`, returning the written file.
    async fn download(
        &self,
        version: &ModVersion,
        dest_dir: &Path,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<PathBuf>;
}
