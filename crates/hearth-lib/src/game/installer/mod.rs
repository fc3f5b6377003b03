pub mod core;
pub mod modloaders;
pub mod mods;
pub mod types;

#[cfg(test)]
mod tests;

use crate::error::InstallError;
use crate::game::installer::core::traits::{LoaderInstaller, LoaderVersion, ModVersion, VersionCatalog};
use crate::game::installer::mods::{ModInstallReport, ModSources, ModTarget};
use crate::game::installer::types::{CancelToken, InstallStage, InstallState, ProgressSink};
use crate::game::profile::{resolve_version_id, LoaderKind, ModProvenance, Profile};
use futures::FutureExt;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};

pub use modloaders::optifine_jar_name;

/// A mod the caller picked for the dependent-mods stage.
#[derive(Debug, Clone)]
pub struct ModRequest {
    pub provenance: ModProvenance,
    pub version: ModVersion,
}

/// Result of [`InstallOrchestrator::install_with_mods`].
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    pub resolved_version_id: String,
    pub mods: ModInstallReport,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Marks a profile as installing until dropped.
struct InFlightGuard {
    set: Arc<Mutex<HashSet<String>>>,
    profile_id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock(&self.set).remove(&self.profile_id);
    }
}

type VersionLockMap = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// Holds the per-version locks of one install. On drop the locks are released
/// and map entries nobody else holds or waits on are removed.
struct VersionLocks<'a> {
    map: &'a VersionLockMap,
    ids: Vec<String>,
    guards: Vec<tokio::sync::OwnedMutexGuard<()>>,
}

impl Drop for VersionLocks<'_> {
    fn drop(&mut self) {
        self.guards.clear();
        let mut map = lock(self.map);
        for id in &self.ids {
            if map.get(id).is_some_and(|m| Arc::strong_count(m) == 1) {
                map.remove(id);
            }
        }
    }
}

/// Drives a profile install: base game version, then loader, then any
/// dependent mods.
///
/// At most one install per profile runs at a time; a second request fails
/// with [`InstallError::Busy`]. Installs of different profiles that touch
/// the same version id wait for each other.
pub struct InstallOrchestrator {
    catalog: Arc<dyn VersionCatalog>,
    loaders: HashMap<LoaderKind, Arc<dyn LoaderInstaller>>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    version_locks: VersionLockMap,
    states: Mutex<HashMap<String, InstallState>>,
}

impl InstallOrchestrator {
    pub fn new(catalog: Arc<dyn VersionCatalog>) -> Self {
        Self {
            catalog,
            loaders: HashMap::new(),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            version_locks: Mutex::new(HashMap::new()),
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_loader(mut self, installer: Arc<dyn LoaderInstaller>) -> Self {
        self.register_loader(installer);
        self
    }

    pub fn register_loader(&mut self, installer: Arc<dyn LoaderInstaller>) {
        self.loaders.insert(installer.kind(), installer);
    }

    pub fn catalog(&self) -> &Arc<dyn VersionCatalog> {
        &self.catalog
    }

    /// Last known state of the install for `profile_id`.
    pub fn state(&self, profile_id: &str) -> InstallState {
        lock(&self.states).get(profile_id).cloned().unwrap_or_default()
    }

    pub fn is_installing(&self, profile_id: &str) -> bool {
        lock(&self.in_flight).contains(profile_id)
    }

    fn installer_for(&self, kind: LoaderKind) -> Result<&Arc<dyn LoaderInstaller>, InstallError> {
        self.loaders
            .get(&kind)
            .ok_or_else(|| InstallError::NotSupported(format!("{} loader", kind)))
    }

    pub async fn loader_versions(
        &self,
        kind: LoaderKind,
        game_version: &str,
    ) -> Result<Vec<LoaderVersion>, InstallError> {
        self.installer_for(kind.version_loader())?
            .list_versions(game_version)
            .await
            .map_err(InstallError::classify)
    }

    pub async fn is_loader_supported(&self, kind: LoaderKind, game_version: &str) -> bool {
        match self.loaders.get(&kind.version_loader()) {
            Some(installer) => installer.is_supported(game_version).await.unwrap_or(false),
            None => false,
        }
    }

    /// Install everything `profile` needs to launch and return its resolved
    /// version id.
    pub async fn install_profile(
        &self,
        profile: &Profile,
        sink: Arc<dyn ProgressSink>,
        cancel: &CancelToken,
    ) -> Result<String, InstallError> {
        self.install_with_mods(profile, &[], &ModSources::new(), sink, cancel)
            .await
            .map(|outcome| outcome.resolved_version_id)
    }

    /// [`install_profile`](Self::install_profile) followed by a
    /// dependent-mods stage that installs `mods` and their required
    /// dependencies into the profile's mods folder.
    ///
    /// Dependencies that cannot be resolved do not fail the install; they are
    /// listed in the returned report.
    pub async fn install_with_mods(
        &self,
        profile: &Profile,
        mods: &[ModRequest],
        sources: &ModSources,
        sink: Arc<dyn ProgressSink>,
        cancel: &CancelToken,
    ) -> Result<InstallOutcome, InstallError> {
        let _guard = self.begin(&profile.id)?;
        self.set_state(&profile.id, InstallState::Idle, sink.as_ref());

        let resolved = profile.resolved_version_id();
        let _version_locks = self.lock_versions(&profile.game_version, &resolved).await;

        let run = AssertUnwindSafe(self.run_stages(profile, mods, sources, sink.clone(), cancel))
            .catch_unwind()
            .await;
        let result = match run {
            Ok(result) => result,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "installer panicked".to_string());
                log::error!("[install] Install of {} panicked: {}", profile.name, message);
                let stage = self.state(&profile.id).stage().unwrap_or(InstallStage::Base);
                Err((stage, InstallError::Internal(message)))
            }
        };

        match result {
            Ok(outcome) => {
                self.set_state(
                    &profile.id,
                    InstallState::Done {
                        resolved_version_id: outcome.resolved_version_id.clone(),
                    },
                    sink.as_ref(),
                );
                log::info!(
                    "[install] {} ready as {}",
                    profile.name,
                    outcome.resolved_version_id
                );
                Ok(outcome)
            }
            Err((stage, err)) => {
                log::error!("[install] {} failed at {}: {}", profile.name, stage, err);
                self.set_state(
                    &profile.id,
                    InstallState::Failed {
                        stage,
                        cause: err.to_string(),
                    },
                    sink.as_ref(),
                );
                Err(err)
            }
        }
    }

    fn begin(&self, profile_id: &str) -> Result<InFlightGuard, InstallError> {
        let mut in_flight = lock(&self.in_flight);
        if !in_flight.insert(profile_id.to_string()) {
            log::warn!("[install] Install already running for {}", profile_id);
            return Err(InstallError::Busy(profile_id.to_string()));
        }
        Ok(InFlightGuard {
            set: self.in_flight.clone(),
            profile_id: profile_id.to_string(),
        })
    }

    /// Take the per-version locks in sorted order so two installs sharing
    /// ids cannot deadlock.
    async fn lock_versions(&self, base: &str, resolved: &str) -> VersionLocks<'_> {
        let mut ids = vec![base.to_string(), resolved.to_string()];
        ids.sort();
        ids.dedup();

        let mut held = VersionLocks {
            map: &self.version_locks,
            ids,
            guards: Vec::new(),
        };
        let mutexes: Vec<Arc<tokio::sync::Mutex<()>>> = {
            let mut locks = lock(&self.version_locks);
            held.ids
                .iter()
                .map(|id| locks.entry(id.clone()).or_default().clone())
                .collect()
        };
        for mutex in mutexes {
            held.guards.push(mutex.lock_owned().await);
        }
        held
    }

    #[cfg(test)]
    fn version_lock_count(&self) -> usize {
        lock(&self.version_locks).len()
    }

    fn set_state(&self, profile_id: &str, state: InstallState, sink: &dyn ProgressSink) {
        sink.on_state(&state);
        lock(&self.states).insert(profile_id.to_string(), state);
    }

    fn check_cancelled(cancel: &CancelToken, stage: InstallStage) -> Result<(), (InstallStage, InstallError)> {
        if cancel.is_cancelled() {
            log::info!("[install] Cancelled before {} stage", stage);
            return Err((stage, InstallError::Cancelled));
        }
        Ok(())
    }

    async fn run_stages(
        &self,
        profile: &Profile,
        mods: &[ModRequest],
        sources: &ModSources,
        sink: Arc<dyn ProgressSink>,
        cancel: &CancelToken,
    ) -> Result<InstallOutcome, (InstallStage, InstallError)> {
        Self::check_cancelled(cancel, InstallStage::Base)?;
        self.set_state(&profile.id, InstallState::InstallingBase, sink.as_ref());
        self.install_base(&profile.game_version, sink.clone())
            .await
            .map_err(|e| (InstallStage::Base, e))?;

        let resolved_version_id = match (profile.loader_kind, profile.loader_version.as_deref()) {
            (Some(kind), Some(loader_version)) => {
                Self::check_cancelled(cancel, InstallStage::Loader)?;
                self.set_state(&profile.id, InstallState::InstallingLoader, sink.as_ref());
                let id = self
                    .install_loader(profile, kind, loader_version, sink.clone())
                    .await
                    .map_err(|e| (InstallStage::Loader, e))?;
                self.install_companion(profile, kind, sink.clone()).await;
                id
            }
            _ => profile.game_version.clone(),
        };

        let mut report = ModInstallReport::default();
        if !mods.is_empty() {
            Self::check_cancelled(cancel, InstallStage::DependentMods)?;
            self.set_state(&profile.id, InstallState::InstallingDependentMods, sink.as_ref());
            let target = ModTarget {
                game_version: profile.game_version.clone(),
                loader: profile.loader_kind,
                mods_dir: profile.mods_dir(),
            };
            for request in mods {
                let one = sources
                    .install_mod_with_dependencies(request.provenance, &request.version, &target, sink.clone())
                    .await
                    .map_err(|e| (InstallStage::DependentMods, InstallError::classify(e)))?;
                report.installed.extend(one.installed);
                report.skipped.extend(one.skipped);
                report.unresolved.extend(one.unresolved);
            }
            if !report.unresolved.is_empty() {
                log::warn!(
                    "[install] Unresolved dependencies for {}: {}",
                    profile.name,
                    report.unresolved.join(", ")
                );
            }
        }

        Ok(InstallOutcome {
            resolved_version_id,
            mods: report,
        })
    }

    async fn install_base(&self, game_version: &str, sink: Arc<dyn ProgressSink>) -> Result<(), InstallError> {
        if self
            .catalog
            .is_installed(game_version)
            .await
            .map_err(InstallError::classify)?
        {
            log::info!("[install] Minecraft {} already installed", game_version);
            return Ok(());
        }
        log::info!("[install] Installing Minecraft {}", game_version);
        sink.on_status(&format!("Installing Minecraft {}", game_version));
        self.catalog
            .install(game_version, sink)
            .await
            .map_err(InstallError::classify)
    }

    async fn install_loader(
        &self,
        profile: &Profile,
        kind: LoaderKind,
        loader_version: &str,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<String, InstallError> {
        let version_kind = kind.version_loader();
        let expected = resolve_version_id(&profile.game_version, Some(version_kind), Some(loader_version));
        let installer = self.installer_for(version_kind)?;

        if self
            .catalog
            .is_installed(&expected)
            .await
            .map_err(InstallError::classify)?
        {
            log::info!("[install] {} already installed", expected);
            return Ok(expected);
        }

        sink.on_status(&format!("Installing {} {}", version_kind, loader_version));
        let installed = installer
            .install(&profile.game_version, loader_version, sink)
            .await
            .map_err(InstallError::classify)?;

        match installed {
            Some(id) if id == expected => Ok(expected),
            Some(id) => {
                log::warn!(
                    "[install] {} installer reported {}, expected {}; keeping {}",
                    version_kind,
                    id,
                    expected,
                    expected
                );
                Ok(expected)
            }
            None => {
                let present = self
                    .catalog
                    .is_installed(&expected)
                    .await
                    .map_err(InstallError::classify)?;
                if present {
                    Ok(expected)
                } else {
                    Err(InstallError::CatalogRejected(format!(
                        "{} installer did not produce {}",
                        version_kind, expected
                    )))
                }
            }
        }
    }

    /// Drop the companion mod (OptiFine for forge+optifine) into the mods
    /// folder. Failures only warn; the profile still launches without it.
    async fn install_companion(&self, profile: &Profile, kind: LoaderKind, sink: Arc<dyn ProgressSink>) {
        let (Some(companion), Some(edition)) = (kind.companion_mod(), profile.optifine_version.as_deref()) else {
            return;
        };
        let Some(installer) = self.loaders.get(&companion) else {
            log::warn!("[install] No {} installer registered; skipping", companion);
            return;
        };

        let mods_dir = profile.mods_dir();
        if let Err(e) = tokio::fs::create_dir_all(&mods_dir).await {
            log::warn!("[install] Could not create {}: {}", mods_dir.display(), e);
            return;
        }
        match installer
            .install_as_mod(&profile.game_version, edition, &mods_dir, sink)
            .await
        {
            Ok(path) => log::info!("[install] Installed {} as {}", companion, path.display()),
            Err(e) => log::warn!("[install] {} {} as a mod failed: {:#}", companion, edition, e),
        }
    }
}
