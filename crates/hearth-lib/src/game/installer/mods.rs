use crate::error::InstallError;
use crate::game::installer::core::traits::{
    DependencyKind, ModQuery, ModRegistry, ModSearchHit, ModVersion,
};
use crate::game::installer::types::ProgressSink;
use crate::game::profile::{InstalledModReference, LoaderKind, ModProvenance};
use anyhow::{anyhow, Result};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Loader name as mod registries spell it. OptiFine is not a mod loader
/// as far as registries are concerned.
pub fn registry_loader_name(kind: LoaderKind) -> Option<&'static str> {
    match kind {
        LoaderKind::Fabric => Some("fabric"),
        LoaderKind::Quilt => Some("quilt"),
        LoaderKind::Forge | LoaderKind::ForgeOptiFine => Some("forge"),
        LoaderKind::NeoForge => Some("neoforge"),
        LoaderKind::OptiFine => None,
    }
}

/// What a mod is being installed into.
#[derive(Debug, Clone)]
pub struct ModTarget {
    pub game_version: String,
    pub loader: Option<LoaderKind>,
    pub mods_dir: PathBuf,
}

impl ModTarget {
    fn loader_name(&self) -> Option<&'static str> {
        self.loader.and_then(registry_loader_name)
    }
}

/// Outcome of [`ModSources::install_mod_with_dependencies`].
#[derive(Debug, Clone, Default)]
pub struct ModInstallReport {
    /// Everything downloaded, requested mod first.
    pub installed: Vec<InstalledModReference>,
    /// Dependencies whose file was already in the mods folder.
    pub skipped: Vec<String>,
    /// Required dependencies with no compatible version.
    pub unresolved: Vec<String>,
}

impl ModInstallReport {
    pub fn ensure_resolved(&self) -> Result<(), InstallError> {
        match self.unresolved.first() {
            None => Ok(()),
            Some(_) => Err(InstallError::DependencyUnresolved(self.unresolved.join(", "))),
        }
    }
}

/// One registry per provenance.
#[derive(Default, Clone)]
pub struct ModSources {
    registries: HashMap<ModProvenance, Arc<dyn ModRegistry>>,
}

impl ModSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(mut self, registry: Arc<dyn ModRegistry>) -> Self {
        self.register(registry);
        self
    }

    pub fn register(&mut self, registry: Arc<dyn ModRegistry>) {
        let provenance = registry.provenance();
        log::info!("[mods] Registered {} source", provenance.as_str());
        self.registries.insert(provenance, registry);
    }

    pub fn has(&self, provenance: ModProvenance) -> bool {
        self.registries.contains_key(&provenance)
    }

    fn registry(&self, provenance: ModProvenance) -> Result<&Arc<dyn ModRegistry>> {
        self.registries
            .get(&provenance)
            .ok_or_else(|| anyhow!("Mod source not configured: {}", provenance.as_str()))
    }

    /// Search every registry and merge the hits by download count.
    ///
    /// A failing registry is logged and left out; the search only fails if
    /// every registry did.
    pub async fn search(&self, query: &ModQuery) -> Result<Vec<ModSearchHit>> {
        let searches = self.registries.values().map(|r| {
            let registry = r.clone();
            async move { (registry.provenance(), registry.search(query).await) }
        });
        let results = futures::future::join_all(searches).await;

        let mut hits = Vec::new();
        let mut last_error = None;
        let mut any_ok = false;
        for (provenance, result) in results {
            match result {
                Ok(found) => {
                    any_ok = true;
                    hits.extend(found);
                }
                Err(e) => {
                    log::warn!("[mods] {} search failed: {:#}", provenance.as_str(), e);
                    last_error = Some(e);
                }
            }
        }
        if let (false, Some(e)) = (any_ok, last_error) {
            return Err(e);
        }

        hits.sort_by(|a, b| b.downloads.cmp(&a.downloads));
        Ok(hits)
    }

    pub async fn get_versions(
        &self,
        provenance: ModProvenance,
        project_id: &str,
        game_version: Option<&str>,
        loader: Option<&str>,
    ) -> Result<Vec<ModVersion>> {
        self.registry(provenance)?
            .get_versions(project_id, game_version, loader)
            .await
    }

    /// Download `version` and every required dependency it pulls in.
    ///
    /// Dependencies are followed transitively, each at its newest version
    /// compatible with the target. A project is fetched at most once per
    /// call. Missing dependencies end up in the report instead of failing
    /// the install; call [`ModInstallReport::ensure_resolved`] to be strict.
    pub async fn install_mod_with_dependencies(
        &self,
        provenance: ModProvenance,
        version: &ModVersion,
        target: &ModTarget,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<ModInstallReport> {
        let registry = self.registry(provenance)?;
        tokio::fs::create_dir_all(&target.mods_dir).await?;

        let mut report = ModInstallReport::default();
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(version.project_id.clone());

        sink.on_status(&format!("Installing {}", version.name));
        let path = registry.download(version, &target.mods_dir, sink.clone()).await?;
        report.installed.push(reference_for(provenance, version, &path));

        let mut queue: VecDeque<ModVersion> = VecDeque::from([version.clone()]);
        while let Some(current) = queue.pop_front() {
            for dep in current
                .dependencies
                .iter()
                .filter(|d| d.kind == DependencyKind::Required)
            {
                if !visited.insert(dep.project_id.clone()) {
                    continue;
                }

                let candidates = registry
                    .get_versions(
                        &dep.project_id,
                        Some(&target.game_version),
                        target.loader_name(),
                    )
                    .await?;
                let Some(dep_version) = candidates
                    .into_iter()
                    .find(|v| v.is_compatible(&target.game_version, target.loader_name()))
                else {
                    log::warn!(
                        "[mods] No compatible version of {} (required by {})",
                        dep.project_id,
                        current.name
                    );
                    report.unresolved.push(dep.project_id.clone());
                    continue;
                };

                if already_present(&target.mods_dir, &dep_version.filename) {
                    log::info!("[mods] {} already present, skipping", dep_version.filename);
                    report.skipped.push(dep.project_id.clone());
                    continue;
                }

                sink.on_status(&format!("Installing dependency {}", dep_version.name));
                let path = registry
                    .download(&dep_version, &target.mods_dir, sink.clone())
                    .await?;
                log::info!("[mods] Installed dependency: {}", dep_version.name);
                report.installed.push(reference_for(provenance, &dep_version, &path));
                queue.push_back(dep_version);
            }
        }

        Ok(report)
    }
}

fn already_present(mods_dir: &Path, filename: &str) -> bool {
    mods_dir.join(filename).exists() || mods_dir.join(format!("{}.disabled", filename)).exists()
}

fn reference_for(provenance: ModProvenance, version: &ModVersion, path: &Path) -> InstalledModReference {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| version.filename.clone());
    InstalledModReference {
        filename,
        provenance,
        remote_mod_id: Some(version.project_id.clone()),
        remote_version_id: Some(version.version_id.clone()),
        display_name: Some(version.name.clone()),
    }
}
