use super::core::traits::VersionInfo;
use super::types::{SilentProgress, WatchProgressSink};
use super::*;
use crate::game::launcher::types::LaunchManifest;
use crate::game::profile::{NewProfile, ProfileStore};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

type CallLog = Arc<Mutex<Vec<String>>>;

fn write_version(versions_dir: &Path, id: &str) {
    let dir = versions_dir.join(id);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(format!("{}.json", id)), format!(r#"{{"id":"{}"}}"#, id)).unwrap();
}

struct RecordingCatalog {
    versions_dir: PathBuf,
    calls: CallLog,
    delay: Duration,
    fail: bool,
}

#[async_trait]
impl VersionCatalog for RecordingCatalog {
    fn versions_dir(&self) -> &Path {
        &self.versions_dir
    }

    async fn list_available(&self, _snapshots: bool, _old: bool) -> Result<Vec<VersionInfo>> {
        Ok(Vec::new())
    }

    async fn install(&self, id: &str, _sink: Arc<dyn ProgressSink>) -> Result<()> {
        self.calls.lock().unwrap().push(format!("base:{}", id));
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(anyhow!("manifest has no entry for {}", id));
        }
        write_version(&self.versions_dir, id);
        Ok(())
    }

    async fn launch_manifest(&self, id: &str) -> Result<LaunchManifest> {
        Err(anyhow!("not needed for {}", id))
    }
}

struct RecordingLoader {
    kind: LoaderKind,
    versions_dir: PathBuf,
    calls: CallLog,
    result: LoaderResult,
}

#[derive(Clone, Copy)]
enum LoaderResult {
    Installs,
    Nothing,
    Exit(i32),
    Panics,
}

#[async_trait]
impl LoaderInstaller for RecordingLoader {
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
        match self.result {
            LoaderResult::Installs => {
                let id = resolve_version_id(game_version, Some(self.kind), Some(loader_version));
                write_version(&self.versions_dir, &id);
                Ok(Some(id))
            }
            LoaderResult::Nothing => Ok(None),
            LoaderResult::Exit(code) => Err(InstallError::SubprocessNonZero { code }.into()),
            LoaderResult::Panics => panic!("installer blew up"),
        }
    }

    async fn install_as_mod(
        &self,
        game_version: &str,
        loader_version: &str,
        mods_dir: &Path,
        _sink: Arc<dyn ProgressSink>,
    ) -> Result<PathBuf> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("mod:{}:{}", self.kind, loader_version));
        let path = mods_dir.join(optifine_jar_name(game_version, loader_version));
        tokio::fs::write(&path, b"optifine").await?;
        Ok(path)
    }
}

struct Fixture {
    _tmp: TempDir,
    store: ProfileStore,
    versions_dir: PathBuf,
    calls: CallLog,
}

impl Fixture {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let store = ProfileStore::open(tmp.path().join("profiles.json"), tmp.path().join("profiles"));
        let versions_dir = tmp.path().join("versions");
        Self {
            store,
            versions_dir,
            calls: Arc::new(Mutex::new(Vec::new())),
            _tmp: tmp,
        }
    }

    fn catalog(&self, delay_ms: u64, fail: bool) -> Arc<RecordingCatalog> {
        Arc::new(RecordingCatalog {
            versions_dir: self.versions_dir.clone(),
            calls: self.calls.clone(),
            delay: Duration::from_millis(delay_ms),
            fail,
        })
    }

    fn loader(&self, kind: LoaderKind, result: LoaderResult) -> Arc<RecordingLoader> {
        Arc::new(RecordingLoader {
            kind,
            versions_dir: self.versions_dir.clone(),
            calls: self.calls.clone(),
            result,
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[tokio::test]
async fn base_is_installed_before_loader() {
    let fx = Fixture::new();
    let orchestrator = InstallOrchestrator::new(fx.catalog(0, false))
        .with_loader(fx.loader(LoaderKind::Fabric, LoaderResult::Installs));
    let profile = fx
        .store
        .create(NewProfile::new("Fabric", "1.20.1").with_loader(LoaderKind::Fabric, "0.15.7"))
        .await
        .unwrap();

    let id = orchestrator
        .install_profile(&profile, Arc::new(SilentProgress), &CancelToken::never())
        .await
        .unwrap();

    assert_eq!(id, "fabric-loader-0.15.7-1.20.1");
    assert_eq!(fx.calls(), vec!["base:1.20.1", "loader:fabric:0.15.7"]);
    assert_eq!(
        orchestrator.state(&profile.id),
        InstallState::Done {
            resolved_version_id: id
        }
    );
}

#[tokio::test]
async fn installed_versions_are_skipped() {
    let fx = Fixture::new();
    write_version(&fx.versions_dir, "1.20.1");
    let orchestrator = InstallOrchestrator::new(fx.catalog(0, false));
    let profile = fx.store.create(NewProfile::new("Vanilla", "1.20.1")).await.unwrap();

    let id = orchestrator
        .install_profile(&profile, Arc::new(SilentProgress), &CancelToken::never())
        .await
        .unwrap();
    assert_eq!(id, "1.20.1");
    assert!(fx.calls().is_empty());
}

#[tokio::test]
async fn duplicate_install_is_busy() {
    let fx = Fixture::new();
    let orchestrator = Arc::new(InstallOrchestrator::new(fx.catalog(100, false)));
    let profile = fx.store.create(NewProfile::new("Busy", "1.20.1")).await.unwrap();

    let first = {
        let orchestrator = orchestrator.clone();
        let profile = profile.clone();
        tokio::spawn(async move {
            orchestrator
                .install_profile(&profile, Arc::new(SilentProgress), &CancelToken::never())
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(orchestrator.is_installing(&profile.id));

    let second = orchestrator
        .install_profile(&profile, Arc::new(SilentProgress), &CancelToken::never())
        .await;
    assert!(matches!(second, Err(InstallError::Busy(_))));

    first.await.unwrap().unwrap();
    assert_eq!(fx.calls(), vec!["base:1.20.1"]);
    assert!(!orchestrator.is_installing(&profile.id));
}

#[tokio::test]
async fn profiles_sharing_a_version_are_serialized() {
    let fx = Fixture::new();
    let orchestrator = Arc::new(InstallOrchestrator::new(fx.catalog(50, false)));
    let a = fx.store.create(NewProfile::new("A", "1.20.1")).await.unwrap();
    let b = fx.store.create(NewProfile::new("B", "1.20.1")).await.unwrap();

    let run = |profile: Profile| {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            orchestrator
                .install_profile(&profile, Arc::new(SilentProgress), &CancelToken::never())
                .await
        })
    };
    let (ra, rb) = tokio::join!(run(a), run(b));
    ra.unwrap().unwrap();
    rb.unwrap().unwrap();

    // The second one finds the version already there.
    assert_eq!(fx.calls(), vec!["base:1.20.1"]);
}

#[tokio::test]
async fn version_locks_are_dropped_once_released() {
    let fx = Fixture::new();
    let orchestrator = InstallOrchestrator::new(fx.catalog(0, false))
        .with_loader(fx.loader(LoaderKind::Fabric, LoaderResult::Installs));
    for n in 0..3 {
        let profile = fx
            .store
            .create(
                NewProfile::new(format!("P{}", n), format!("1.20.{}", n))
                    .with_loader(LoaderKind::Fabric, "0.15.7"),
            )
            .await
            .unwrap();
        orchestrator
            .install_profile(&profile, Arc::new(SilentProgress), &CancelToken::never())
            .await
            .unwrap();
    }
    assert_eq!(orchestrator.version_lock_count(), 0);

    let failing = InstallOrchestrator::new(fx.catalog(0, true));
    let profile = fx.store.create(NewProfile::new("Broken", "1.99")).await.unwrap();
    assert!(failing
        .install_profile(&profile, Arc::new(SilentProgress), &CancelToken::never())
        .await
        .is_err());
    assert_eq!(failing.version_lock_count(), 0);
}

#[tokio::test]
async fn base_failure_skips_loader() {
    let fx = Fixture::new();
    let orchestrator = InstallOrchestrator::new(fx.catalog(0, true))
        .with_loader(fx.loader(LoaderKind::Fabric, LoaderResult::Installs));
    let profile = fx
        .store
        .create(NewProfile::new("Broken", "9.9").with_loader(LoaderKind::Fabric, "0.15.7"))
        .await
        .unwrap();

    let err = orchestrator
        .install_profile(&profile, Arc::new(SilentProgress), &CancelToken::never())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "catalog_rejected");
    assert_eq!(fx.calls(), vec!["base:9.9"]);
    assert!(matches!(
        orchestrator.state(&profile.id),
        InstallState::Failed {
            stage: InstallStage::Base,
            ..
        }
    ));
}

#[tokio::test]
async fn loader_failure_keeps_base_and_reports_exit_code() {
    let fx = Fixture::new();
    let orchestrator = InstallOrchestrator::new(fx.catalog(0, false))
        .with_loader(fx.loader(LoaderKind::Forge, LoaderResult::Exit(1)));
    let profile = fx
        .store
        .create(NewProfile::new("Forge", "1.20.1").with_loader(LoaderKind::Forge, "1.20.1-47.2.0"))
        .await
        .unwrap();

    let (sink, rx) = WatchProgressSink::channel();
    let err = orchestrator
        .install_profile(&profile, Arc::new(sink), &CancelToken::never())
        .await
        .unwrap_err();

    assert!(matches!(err, InstallError::SubprocessNonZero { code: 1 }));
    assert!(fx.versions_dir.join("1.20.1").join("1.20.1.json").is_file());
    assert!(matches!(
        rx.borrow().state,
        InstallState::Failed {
            stage: InstallStage::Loader,
            ..
        }
    ));
}

#[tokio::test]
async fn missing_loader_installer_is_not_supported() {
    let fx = Fixture::new();
    let orchestrator = InstallOrchestrator::new(fx.catalog(0, false));
    let profile = fx
        .store
        .create(NewProfile::new("Quilt", "1.20.1").with_loader(LoaderKind::Quilt, "0.23.0"))
        .await
        .unwrap();

    let err = orchestrator
        .install_profile(&profile, Arc::new(SilentProgress), &CancelToken::never())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "not_supported");
}

#[tokio::test]
async fn loader_reporting_nothing_is_rejected() {
    let fx = Fixture::new();
    let orchestrator = InstallOrchestrator::new(fx.catalog(0, false))
        .with_loader(fx.loader(LoaderKind::NeoForge, LoaderResult::Nothing));
    let profile = fx
        .store
        .create(NewProfile::new("Neo", "1.21.1").with_loader(LoaderKind::NeoForge, "21.1.65"))
        .await
        .unwrap();

    let err = orchestrator
        .install_profile(&profile, Arc::new(SilentProgress), &CancelToken::never())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "catalog_rejected");
}

#[tokio::test]
async fn panicking_installer_becomes_internal_error() {
    let fx = Fixture::new();
    let orchestrator = InstallOrchestrator::new(fx.catalog(0, false))
        .with_loader(fx.loader(LoaderKind::Fabric, LoaderResult::Panics));
    let profile = fx
        .store
        .create(NewProfile::new("Panic", "1.20.1").with_loader(LoaderKind::Fabric, "0.15.7"))
        .await
        .unwrap();

    let err = orchestrator
        .install_profile(&profile, Arc::new(SilentProgress), &CancelToken::never())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "internal");
    assert!(err.to_string().contains("installer blew up"));
    assert!(matches!(
        orchestrator.state(&profile.id),
        InstallState::Failed {
            stage: InstallStage::Loader,
            ..
        }
    ));
    assert!(!orchestrator.is_installing(&profile.id));
}

#[tokio::test]
async fn forge_optifine_installs_companion_jar() {
    let fx = Fixture::new();
    let orchestrator = InstallOrchestrator::new(fx.catalog(0, false))
        .with_loader(fx.loader(LoaderKind::Forge, LoaderResult::Installs))
        .with_loader(fx.loader(LoaderKind::OptiFine, LoaderResult::Installs));
    let profile = fx
        .store
        .create(
            NewProfile::new("Shaders", "1.20.1")
                .with_loader(LoaderKind::ForgeOptiFine, "1.20.1-47.2.0")
                .with_optifine("HD_U_I6"),
        )
        .await
        .unwrap();

    let id = orchestrator
        .install_profile(&profile, Arc::new(SilentProgress), &CancelToken::never())
        .await
        .unwrap();

    assert_eq!(id, "1.20.1-forge-47.2.0");
    assert_eq!(
        fx.calls(),
        vec!["base:1.20.1", "loader:forge:1.20.1-47.2.0", "mod:optifine:HD_U_I6"]
    );
    assert!(profile.mods_dir().join("OptiFine_1.20.1_HD_U_I6.jar").is_file());
}

#[tokio::test]
async fn cancelled_before_start_runs_nothing() {
    let fx = Fixture::new();
    let orchestrator = InstallOrchestrator::new(fx.catalog(0, false));
    let profile = fx.store.create(NewProfile::new("Cancel", "1.20.1")).await.unwrap();
    let (handle, token) = CancelToken::pair();
    handle.cancel();

    let err = orchestrator
        .install_profile(&profile, Arc::new(SilentProgress), &token)
        .await
        .unwrap_err();
    assert!(matches!(err, InstallError::Cancelled));
    assert!(fx.calls().is_empty());
}
