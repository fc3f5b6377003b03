//! Launcher settings and on-disk layout.

use crate::utils::fs::{read_json, write_json_atomic};
use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// G1 tuning flags passed to every launch unless the user overrides them.
pub const DEFAULT_TUNING_ARGS: &[&str] = &[
    "-XX:+UseG1GC",
    "-XX:+ParallelRefProcEnabled",
    "-XX:MaxGCPauseMillis=200",
    "-XX:+UnlockExperimentalVMOptions",
    "-XX:+DisableExplicitGC",
    "-XX:+AlwaysPreTouch",
    "-XX:G1NewSizePercent=30",
    "-XX:G1MaxNewSizePercent=40",
    "-XX:G1HeapRegionSize=8M",
    "-XX:G1ReservePercent=20",
    "-XX:G1HeapWastePercent=5",
    "-XX:G1MixedGCCountTarget=4",
    "-XX:InitiatingHeapOccupancyPercent=15",
    "-XX:G1MixedGCLiveThresholdPercent=90",
    "-XX:G1RSetUpdatingPauseTimePercent=5",
    "-XX:SurvivorRatio=32",
    "-XX:+PerfDisableSharedMem",
    "-XX:MaxTenuringThreshold=1",
];

/// User-editable launcher settings, stored as `config.json`.
///
/// Unknown or missing keys fall back to the defaults, so older files keep
/// loading after new settings are added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// Minimum heap in GiB (`-Xms`)
    pub ram_min: u32,
    /// Maximum heap in GiB (`-Xmx`)
    pub ram_max: u32,
    /// Java executable; empty means search PATH, JAVA_HOME and the usual
    /// install folders at launch
    pub java_path: String,
    /// Global game directory; empty means the launcher default
    pub game_directory: String,
    pub window_width: u32,
    pub window_height: u32,
    pub show_snapshots: bool,
    pub show_old_versions: bool,
    pub close_on_launch: bool,
    pub show_game_console: bool,
    pub curseforge_api_key: String,
    pub jvm_tuning_args: Vec<String>,
    /// Appended after the tuning flags
    pub extra_jvm_args: Vec<String>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            ram_min: 2,
            ram_max: 4,
            java_path: String::new(),
            game_directory: String::new(),
            window_width: 1280,
            window_height: 720,
            show_snapshots: false,
            show_old_versions: false,
            close_on_launch: false,
            show_game_console: false,
            curseforge_api_key: String::new(),
            jvm_tuning_args: DEFAULT_TUNING_ARGS.iter().map(|s| s.to_string()).collect(),
            extra_jvm_args: Vec::new(),
        }
    }
}

impl LauncherConfig {
    /// Load settings from `path`. A missing file gives the defaults; a broken
    /// one is logged and also gives the defaults.
    pub fn load(path: &Path) -> Self {
        match read_json::<LauncherConfig>(path) {
            Ok(Some(config)) => config,
            Ok(None) => {
                log::info!("[config] No config at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                log::warn!("[config] Ignoring unreadable config: {:#}", e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self).context("Failed to save launcher config")
    }

    /// The configured Java executable, if any. `None` means it should be
    /// discovered at launch.
    pub fn java_override(&self) -> Option<PathBuf> {
        let path = self.java_path.trim();
        (!path.is_empty()).then(|| PathBuf::from(path))
    }

    pub fn game_directory_override(&self) -> Option<PathBuf> {
        let dir = self.game_directory.trim();
        (!dir.is_empty()).then(|| PathBuf::from(dir))
    }
}

/// Resolved locations of everything the launcher keeps on disk.
#[derive(Debug, Clone)]
pub struct LauncherPaths {
    root: PathBuf,
    game_dir: PathBuf,
}

impl LauncherPaths {
    /// Use an explicit launcher root (portable installs, tests).
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let game_dir = root.join("minecraft");
        Self { root, game_dir }
    }

    /// Use the platform data directory, e.g. `~/.local/share/hearth-launcher`.
    pub fn discover() -> Result<Self> {
        let dirs = ProjectDirs::from("com", "hearth", "hearth-launcher")
            .ok_or_else(|| anyhow!("Failed to determine the user's data directory"))?;
        Ok(Self::from_root(dirs.data_dir()))
    }

    /// Apply the `game_directory` override from the config, if any.
    pub fn with_config(mut self, config: &LauncherConfig) -> Self {
        if let Some(dir) = config.game_directory_override() {
            self.game_dir = dir;
        }
        self
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.root, &self.game_dir, &self.versions_dir(), &self.profiles_dir()] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.json")
    }

    pub fn accounts_file(&self) -> PathBuf {
        self.root.join("accounts.json")
    }

    pub fn profiles_file(&self) -> PathBuf {
        self.root.join("profiles.json")
    }

    pub fn client_token_file(&self) -> PathBuf {
        self.root.join("client_token")
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.root.join("exports")
    }

    /// Shared game directory; also the working directory for profiles
    /// without a data directory of their own.
    pub fn game_dir(&self) -> &Path {
        &self.game_dir
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.game_dir.join("versions")
    }

    pub fn profiles_dir(&self) -> PathBuf {
        self.game_dir.join("profiles")
    }
}
