//! Explicit wiring of the launcher core.
//!
//! A [`LauncherContext`] owns the config, both stores, the install
//! orchestrator, the mod sources and the process runner. The embedding
//! application builds one at startup and shares it (usually behind an
//! `Arc`); nothing in the crate keeps global state.

use crate::auth::{AccountStore, IdentityProvider};
use crate::config::{LauncherConfig, LauncherPaths};
use crate::error::{AuthError, InstallError, LauncherError, StoreError};
use crate::game::installer::core::traits::{LoaderInstaller, ModRegistry, ModVersion, VersionCatalog};
use crate::game::installer::mods::{ModInstallReport, ModSources, ModTarget};
use crate::game::installer::types::{CancelToken, ProgressSink};
use crate::game::installer::{InstallOrchestrator, ModRequest};
use crate::game::launcher::{build_launch_spec, ProcessHandle, ProcessRunner};
use crate::game::modpack::{
    self, ExportSummary, ImportOptions, ImportReport, SharedProfile,
};
use crate::game::profile::{
    sanitize_folder_name, InstalledModReference, ModProvenance, NewProfile, Profile,
    ProfileFolder, ProfileStore, ProfileUpdate,
};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Outcome of [`LauncherContext::create_from_share_code`].
#[derive(Debug, Clone)]
pub struct SharedProfileImport {
    pub profile: Profile,
    pub mods: ModInstallReport,
    /// Shared mods that could not be matched to a registry version
    pub missing: Vec<String>,
}

pub struct LauncherContext {
    paths: LauncherPaths,
    config: RwLock<LauncherConfig>,
    accounts: AccountStore,
    profiles: ProfileStore,
    orchestrator: InstallOrchestrator,
    mod_sources: ModSources,
    runner: Arc<dyn ProcessRunner>,
}

impl LauncherContext {
    /// Load the config under `paths`, create the launcher directories and
    /// open both stores.
    pub fn open(
        paths: LauncherPaths,
        catalog: Arc<dyn VersionCatalog>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Result<Self> {
        let config = LauncherConfig::load(&paths.config_file());
        let paths = paths.with_config(&config);
        paths.ensure_dirs()?;

        let accounts = AccountStore::open(paths.accounts_file(), &paths.client_token_file());
        let profiles = ProfileStore::open(paths.profiles_file(), paths.profiles_dir());
        log::info!("[config] Launcher root {}", paths.root().display());

        Ok(Self {
            config: RwLock::new(config),
            accounts,
            profiles,
            orchestrator: InstallOrchestrator::new(catalog),
            mod_sources: ModSources::new(),
            runner,
            paths,
        })
    }

    pub fn with_identity_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.accounts.register_provider(provider);
        self
    }

    pub fn with_loader(mut self, installer: Arc<dyn LoaderInstaller>) -> Self {
        self.orchestrator.register_loader(installer);
        self
    }

    pub fn with_mod_registry(mut self, registry: Arc<dyn ModRegistry>) -> Self {
        self.mod_sources.register(registry);
        self
    }

    pub fn paths(&self) -> &LauncherPaths {
        &self.paths
    }

    pub fn accounts(&self) -> &AccountStore {
        &self.accounts
    }

    pub fn profiles(&self) -> &ProfileStore {
        &self.profiles
    }

    pub fn orchestrator(&self) -> &InstallOrchestrator {
        &self.orchestrator
    }

    pub fn mod_sources(&self) -> &ModSources {
        &self.mod_sources
    }

    pub async fn config(&self) -> LauncherConfig {
        self.config.read().await.clone()
    }

    /// Replace the config and save it. The in-memory value is updated even
    /// if the write fails.
    pub async fn update_config(&self, config: LauncherConfig) -> Result<(), StoreError> {
        let path = self.paths.config_file();
        let mut current = self.config.write().await;
        *current = config;
        current
            .save(&path)
            .map_err(|e| StoreError::persistence(&path, format!("{:#}", e)))
    }

    async fn require_profile(&self, id: &str) -> Result<Profile, StoreError> {
        self.profiles
            .get(id)
            .await
            .ok_or_else(|| StoreError::NotFound(format!("profile {}", id)))
    }

    /// Install what `new` needs, then store it. Nothing is persisted when the
    /// install fails.
    pub async fn create_profile(
        &self,
        new: NewProfile,
        sink: Arc<dyn ProgressSink>,
        cancel: &CancelToken,
    ) -> Result<Profile, LauncherError> {
        let draft = self.profiles.draft(new).await?;
        self.orchestrator.install_profile(&draft, sink, cancel).await?;
        Ok(self.profiles.commit(draft).await?)
    }

    /// Make sure the session and the game files are ready, then start the
    /// game for `profile_id`.
    pub async fn launch_profile(
        &self,
        profile_id: &str,
        sink: Arc<dyn ProgressSink>,
        cancel: &CancelToken,
    ) -> Result<ProcessHandle, LauncherError> {
        if let Some(active) = self.accounts.active().await {
            if !self.accounts.ensure_valid(Some(&active.key())).await {
                return Err(AuthError::TokenExpiredNoRefresh(active.display_name).into());
            }
        }

        let profile = self.require_profile(profile_id).await?;
        let resolved = self
            .orchestrator
            .install_profile(&profile, sink, cancel)
            .await?;
        let manifest = self
            .orchestrator
            .catalog()
            .launch_manifest(&resolved)
            .await
            .map_err(InstallError::classify)?;

        let auth = self.accounts.launch_auth().await;
        let config = self.config().await;
        let spec = build_launch_spec(&manifest, &auth, Some(&profile), &config, self.paths.game_dir())
            .map_err(|e| LauncherError::Launch(format!("{:#}", e)))?;

        let handle = self
            .runner
            .launch(&spec)
            .await
            .map_err(|e| LauncherError::Launch(format!("{:#}", e)))?;
        self.profiles.mark_played(&profile.id).await?;
        log::info!("[launch] Launched {} ({})", profile.name, resolved);
        Ok(handle)
    }

    /// Delete an installed game version. Refused while any profile still
    /// resolves to it.
    pub async fn delete_game_version(&self, version_id: &str) -> Result<(), LauncherError> {
        let users = self.profiles.versions_referencing(version_id, None).await;
        if !users.is_empty() {
            let names: Vec<&str> = users.iter().map(|p| p.name.as_str()).collect();
            return Err(StoreError::Conflict(format!(
                "{} is used by {}",
                version_id,
                names.join(", ")
            ))
            .into());
        }
        self.orchestrator
            .catalog()
            .delete(version_id)
            .await
            .map_err(InstallError::classify)?;
        Ok(())
    }

    /// Export to `output`, or to `exports/<profile name>.zip` when not given.
    pub async fn export_profile(
        &self,
        profile_id: &str,
        folders: &[ProfileFolder],
        output: Option<&Path>,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<ExportSummary, LauncherError> {
        let profile = self.require_profile(profile_id).await?;
        let output: PathBuf = match output {
            Some(path) => path.to_path_buf(),
            None => self
                .paths
                .exports_dir()
                .join(format!("{}.zip", sanitize_folder_name(&profile.name))),
        };
        Ok(modpack::export_profile(&profile, folders, &output, sink).await?)
    }

    pub async fn import_profile(
        &self,
        archive: &Path,
        options: ImportOptions,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<ImportReport, LauncherError> {
        Ok(modpack::import_profile(&self.profiles, archive, options, sink).await?)
    }

    pub async fn share_code(&self, profile_id: &str) -> Result<String, LauncherError> {
        let profile = self.require_profile(profile_id).await?;
        Ok(modpack::generate_share_code(&profile)?)
    }

    /// Build a profile from a share code: install its version and loader,
    /// then whatever shared mods the configured registries can still serve.
    pub async fn create_from_share_code(
        &self,
        code: &str,
        sink: Arc<dyn ProgressSink>,
        cancel: &CancelToken,
    ) -> Result<SharedProfileImport, LauncherError> {
        let shared = modpack::parse_share_code(code)?;
        let (requests, missing) = self.resolve_shared_mods(&shared).await;

        let mut new = NewProfile::new(self.profiles.unique_name(&shared.name).await, &shared.game_version);
        if let (Some(kind), Some(version)) = (shared.loader_kind, shared.loader_version.clone()) {
            new = new.with_loader(kind, version);
        }
        let draft = self.profiles.draft(new).await?;
        let outcome = self
            .orchestrator
            .install_with_mods(&draft, &requests, &self.mod_sources, sink, cancel)
            .await?;

        let mut profile = self.profiles.commit(draft).await?;
        if !outcome.mods.installed.is_empty() {
            profile = self
                .profiles
                .update(
                    &profile.id,
                    ProfileUpdate {
                        installed_mods: Some(outcome.mods.installed.clone()),
                        ..ProfileUpdate::default()
                    },
                )
                .await?;
        }
        log::info!(
            "[share] Created {} from share code ({} mod(s), {} missing)",
            profile.name,
            outcome.mods.installed.len(),
            missing.len()
        );
        Ok(SharedProfileImport {
            profile,
            mods: outcome.mods,
            missing,
        })
    }

    async fn resolve_shared_mods(&self, shared: &SharedProfile) -> (Vec<ModRequest>, Vec<String>) {
        let loader = shared
            .loader_kind
            .and_then(crate::game::installer::mods::registry_loader_name);
        let mut requests = Vec::new();
        let mut missing = Vec::new();

        for reference in &shared.mods {
            let Some(project_id) = reference.remote_mod_id.as_deref() else {
                continue;
            };
            let label = reference.display_name.clone().unwrap_or_else(|| project_id.to_string());
            if !self.mod_sources.has(reference.provenance) {
                log::warn!("[share] No {} source configured for {}", reference.provenance.as_str(), label);
                missing.push(label);
                continue;
            }
            let versions = match self
                .mod_sources
                .get_versions(reference.provenance, project_id, Some(&shared.game_version), loader)
                .await
            {
                Ok(versions) => versions,
                Err(e) => {
                    log::warn!("[share] Could not look up {}: {:#}", label, e);
                    missing.push(label);
                    continue;
                }
            };
            match pick_shared_version(versions, reference, &shared.game_version, loader) {
                Some(version) => requests.push(ModRequest {
                    provenance: reference.provenance,
                    version,
                }),
                None => {
                    log::warn!("[share] No compatible version of {}", label);
                    missing.push(label);
                }
            }
        }
        (requests, missing)
    }

    /// Install a mod and its required dependencies into a profile and
    /// remember every file that was written.
    pub async fn install_mod(
        &self,
        profile_id: &str,
        provenance: ModProvenance,
        version: &ModVersion,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<ModInstallReport, LauncherError> {
        let profile = self.require_profile(profile_id).await?;
        let target = ModTarget {
            game_version: profile.game_version.clone(),
            loader: profile.loader_kind,
            mods_dir: profile.mods_dir(),
        };
        let report = self
            .mod_sources
            .install_mod_with_dependencies(provenance, version, &target, sink)
            .await
            .map_err(InstallError::classify)?;

        for reference in &report.installed {
            self.profiles
                .record_installed_mod(&profile.id, reference.clone())
                .await?;
        }
        log::info!(
            "[mods] Installed {} file(s) into {}",
            report.installed.len(),
            profile.name
        );
        Ok(report)
    }
}

/// The shared version if the registry still has it and it fits, otherwise
/// the newest compatible one.
fn pick_shared_version(
    versions: Vec<ModVersion>,
    reference: &InstalledModReference,
    game_version: &str,
    loader: Option<&str>,
) -> Option<ModVersion> {
    let compatible: Vec<ModVersion> = versions
        .into_iter()
        .filter(|v| v.is_compatible(game_version, loader))
        .collect();
    let pinned = reference.remote_version_id.as_deref();
    compatible
        .iter()
        .position(|v| Some(v.version_id.as_str()) == pinned)
        .map(|i| compatible[i].clone())
        .or_else(|| compatible.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(id: &str, game: &str) -> ModVersion {
        ModVersion {
            project_id: "AANobbMI".to_string(),
            version_id: id.to_string(),
            name: format!("Sodium {}", id),
            filename: format!("sodium-{}.jar", id),
            game_versions: vec![game.to_string()],
            loaders: vec!["fabric".to_string()],
            dependencies: Vec::new(),
        }
    }

    fn reference(pinned: Option<&str>) -> InstalledModReference {
        InstalledModReference {
            filename: String::new(),
            provenance: ModProvenance::Modrinth,
            remote_mod_id: Some("AANobbMI".to_string()),
            remote_version_id: pinned.map(str::to_string),
            display_name: Some("Sodium".to_string()),
        }
    }

    #[test]
    fn pinned_version_wins_when_compatible() {
        let versions = vec![version("new", "1.20.1"), version("old", "1.20.1")];
        let picked = pick_shared_version(versions, &reference(Some("old")), "1.20.1", Some("fabric"));
        assert_eq!(picked.unwrap().version_id, "old");
    }

    #[test]
    fn falls_back_to_newest_compatible() {
        let versions = vec![version("other-game", "1.19.2"), version("fits", "1.20.1")];
        let picked = pick_shared_version(versions, &reference(Some("gone")), "1.20.1", Some("fabric"));
        assert_eq!(picked.unwrap().version_id, "fits");
        assert!(pick_shared_version(Vec::new(), &reference(None), "1.20.1", None).is_none());
    }
}
