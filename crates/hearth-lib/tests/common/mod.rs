#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use hearth_lib::auth::{Credentials, IdentityProvider, ProviderSession};
use hearth_lib::game::installer::core::traits::{
    LoaderInstaller, LoaderVersion, ModQuery, ModRegistry, ModSearchHit, ModVersion, VersionCatalog,
    VersionInfo,
};
use hearth_lib::game::installer::types::ProgressSink;
use hearth_lib::game::launcher::{LaunchManifest, LaunchSpec, ProcessHandle, ProcessRunner};
use hearth_lib::game::profile::{resolve_version_id, ModProvenance};
use hearth_lib::{Account, AccountKind, AuthError, LoaderKind};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn write_version(versions_dir: &Path, id: &str) {
    let dir = versions_dir.join(id);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(format!("{}.json", id)), format!(r#"{{"id":"{}"}}"#, id)).unwrap();
}

/// Catalog that writes a version json on install and records calls.
pub struct FakeCatalog {
    pub versions_dir: PathBuf,
    pub calls: CallLog,
    pub fail_ids: Vec<String>,
}

impl FakeCatalog {
    pub fn new(versions_dir: impl Into<PathBuf>, calls: CallLog) -> Self {
        Self {
            versions_dir: versions_dir.into(),
            calls,
            fail_ids: Vec::new(),
        }
    }
}

#[async_trait]
impl VersionCatalog for FakeCatalog {
    fn versions_dir(&self) -> &Path {
        &self.versions_dir
    }

    async fn list_available(&self, _snapshots: bool, _old: bool) -> Result<Vec<VersionInfo>> {
        Ok(Vec::new())
    }

    async fn install(&self, id: &str, sink: Arc<dyn ProgressSink>) -> Result<()> {
        self.calls.lock().unwrap().push(format!("base:{}", id));
        if self.fail_ids.iter().any(|f| f == id) {
            return Err(anyhow!("unknown version {}", id));
        }
        sink.on_status(&format!("Downloading {}", id));
        sink.on_progress(1, 1);
        write_version(&self.versions_dir, id);
        Ok(())
    }

    async fn launch_manifest(&self, id: &str) -> Result<LaunchManifest> {
        Ok(LaunchManifest {
            version_id: id.to_string(),
            main_class: "net.minecraft.client.main.Main".to_string(),
            classpath: vec![self.versions_dir.join(id).join(format!("{}.jar", id))],
            natives_dir: self.versions_dir.join(id).join("natives"),
            assets_dir: self.versions_dir.join("assets"),
            asset_index: "5".to_string(),
            version_type: "release".to_string(),
            game_args: Vec::new(),
        })
    }
}

pub struct FakeLoader {
    pub kind: LoaderKind,
    pub versions_dir: PathBuf,
    pub calls: CallLog,
}

#[async_trait]
impl LoaderInstaller for FakeLoader {
    fn kind(&self) -> LoaderKind {
        self.kind
    }

    async fn list_versions(&self, _game_version: &str) -> Result<Vec<LoaderVersion>> {
        Ok(vec![LoaderVersion::new("0.15.7", true)])
    }

    async fn install(
        &self,
        game_version: &str,
        loader_version: &str,
        _sink: Arc<dyn ProgressSink>,
    ) -> Result<Option<String>> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("loader:{}:{}", self.kind, loader_version));
        let id = resolve_version_id(game_version, Some(self.kind), Some(loader_version));
        write_version(&self.versions_dir, &id);
        Ok(Some(id))
    }
}

/// Runner that records the spec instead of starting anything.
#[derive(Default)]
pub struct RecordingRunner {
    pub launched: Mutex<Vec<LaunchSpec>>,
    /// Fail every launch as if the executable could not be spawned
    pub refuse: AtomicBool,
}

#[async_trait]
impl ProcessRunner for RecordingRunner {
    async fn launch(&self, spec: &LaunchSpec) -> Result<ProcessHandle> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(anyhow!("failed to spawn {}", spec.executable.display()));
        }
        self.launched.lock().unwrap().push(spec.clone());
        // A real child is needed for the handle; `true` exits immediately.
        let child = tokio::process::Command::new("true").spawn()?;
        Ok(ProcessHandle::from_child(child))
    }
}

/// Identity provider driven by a script of canned responses.
pub struct ScriptedProvider {
    pub kind: AccountKind,
    pub login_result: Mutex<Option<Result<ProviderSession, AuthError>>>,
    pub refresh_result: Mutex<Option<Result<ProviderSession, AuthError>>>,
    pub login_delay: std::time::Duration,
    pub refresh_calls: Mutex<usize>,
}

impl ScriptedProvider {
    pub fn new(kind: AccountKind) -> Self {
        Self {
            kind,
            login_result: Mutex::new(None),
            refresh_result: Mutex::new(None),
            login_delay: std::time::Duration::ZERO,
            refresh_calls: Mutex::new(0),
        }
    }

    pub fn next_login(&self, result: Result<ProviderSession, AuthError>) {
        *self.login_result.lock().unwrap() = Some(result);
    }

    pub fn next_refresh(&self, result: Result<ProviderSession, AuthError>) {
        *self.refresh_result.lock().unwrap() = Some(result);
    }
}

#[async_trait]
impl IdentityProvider for ScriptedProvider {
    fn kind(&self) -> AccountKind {
        self.kind
    }

    async fn login(
        &self,
        _credentials: Credentials,
        _client_token: &str,
    ) -> Result<ProviderSession, AuthError> {
        tokio::time::sleep(self.login_delay).await;
        self.login_result
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(AuthError::ProviderRejected("no scripted login".to_string())))
    }

    async fn refresh(
        &self,
        _account: &Account,
        _client_token: &str,
    ) -> Result<ProviderSession, AuthError> {
        *self.refresh_calls.lock().unwrap() += 1;
        self.refresh_result
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(AuthError::Network("no scripted refresh".to_string())))
    }
}

pub fn session(name: &str, id: &str, token: &str) -> ProviderSession {
    ProviderSession {
        display_name: name.to_string(),
        player_id: id.to_string(),
        access_token: token.to_string(),
        refresh_token: Some(format!("refresh-{}", token)),
        expires_at: Some(chrono::Utc::now() + chrono::Duration::hours(1)),
        extra: HashMap::new(),
    }
}

/// Registry serving a fixed set of versions and writing small jars.
pub struct FakeRegistry {
    pub provenance: ModProvenance,
    pub versions: HashMap<String, Vec<ModVersion>>,
}

impl FakeRegistry {
    pub fn new(provenance: ModProvenance, versions: Vec<ModVersion>) -> Self {
        let mut map: HashMap<String, Vec<ModVersion>> = HashMap::new();
        for v in versions {
            map.entry(v.project_id.clone()).or_default().push(v);
        }
        Self {
            provenance,
            versions: map,
        }
    }
}

#[async_trait]
impl ModRegistry for FakeRegistry {
    fn provenance(&self) -> ModProvenance {
        self.provenance
    }

    async fn search(&self, _query: &ModQuery) -> Result<Vec<ModSearchHit>> {
        Ok(Vec::new())
    }

    async fn get_versions(
        &self,
        project_id: &str,
        _game_version: Option<&str>,
        _loader: Option<&str>,
    ) -> Result<Vec<ModVersion>> {
        Ok(self.versions.get(project_id).cloned().unwrap_or_default())
    }

    async fn download(
        &self,
        version: &ModVersion,
        dest_dir: &Path,
        _sink: Arc<dyn ProgressSink>,
    ) -> Result<PathBuf> {
        let path = dest_dir.join(&version.filename);
        tokio::fs::write(&path, version.version_id.as_bytes()).await?;
        Ok(path)
    }
}

pub fn mod_version(project: &str, version: &str, deps: &[&str]) -> ModVersion {
    use hearth_lib::game::installer::core::traits::{DependencyKind, ModDependency};
    ModVersion {
        project_id: project.to_string(),
        version_id: version.to_string(),
        name: format!("{} {}", project, version),
        filename: format!("{}-{}.jar", project, version),
        game_versions: vec!["1.20.1".to_string()],
        loaders: vec!["fabric".to_string()],
        dependencies: deps
            .iter()
            .map(|d| ModDependency {
                project_id: d.to_string(),
                version_id: None,
                kind: DependencyKind::Required,
            })
            .collect(),
    }
}
