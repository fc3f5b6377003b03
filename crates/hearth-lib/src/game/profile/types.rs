use crate::utils::fs::DirStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_ICON: &str = "🧱";

/// Mod loader a profile runs on. Absent means vanilla.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoaderKind {
    #[serde(rename = "fabric")]
    Fabric,
    #[serde(rename = "quilt")]
    Quilt,
    #[serde(rename = "forge")]
    Forge,
    #[serde(rename = "neoforge")]
    NeoForge,
    /// OptiFine installed as its own game version
    #[serde(rename = "optifine")]
    OptiFine,
    /// Forge, with OptiFine dropped into the mods folder
    #[serde(rename = "forge+optifine")]
    ForgeOptiFine,
}

impl LoaderKind {
    pub const ALL: [LoaderKind; 6] = [
        LoaderKind::Fabric,
        LoaderKind::Quilt,
        LoaderKind::Forge,
        LoaderKind::NeoForge,
        LoaderKind::OptiFine,
        LoaderKind::ForgeOptiFine,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LoaderKind::Fabric => "fabric",
            LoaderKind::Quilt => "quilt",
            LoaderKind::Forge => "forge",
            LoaderKind::NeoForge => "neoforge",
            LoaderKind::OptiFine => "optifine",
            LoaderKind::ForgeOptiFine => "forge+optifine",
        }
    }

    /// Loader that gets installed as a game version.
    pub fn version_loader(&self) -> LoaderKind {
        match self {
            LoaderKind::ForgeOptiFine => LoaderKind::Forge,
            other => *other,
        }
    }

    /// Loader that gets copied into `mods/` on top of the version loader.
    pub fn companion_mod(&self) -> Option<LoaderKind> {
        match self {
            LoaderKind::ForgeOptiFine => Some(LoaderKind::OptiFine),
            _ => None,
        }
    }
}

impl std::fmt::Display for LoaderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LoaderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LoaderKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| anyhow::anyhow!("Unknown loader kind: {}", s))
    }
}

/// Version id under which the catalog stores a game version plus loader.
///
/// This follows the naming each loader's own installer uses, so it has to be
/// computed, never stored.
pub fn resolve_version_id(
    game_version: &str,
    loader: Option<LoaderKind>,
    loader_version: Option<&str>,
) -> String {
    let (Some(loader), Some(loader_version)) = (loader, loader_version) else {
        return game_version.to_string();
    };

    match loader {
        LoaderKind::Fabric | LoaderKind::Quilt => {
            format!("{}-loader-{}-{}", loader.as_str(), loader_version, game_version)
        }
        // Forge catalog versions look like "1.20.1-47.2.0"; the installed
        // version is "1.20.1-forge-47.2.0".
        LoaderKind::Forge | LoaderKind::ForgeOptiFine => {
            let full = full_forge_version(game_version, loader_version);
            let (game, build) = full.split_once('-').unwrap_or((game_version, loader_version));
            format!("{}-forge-{}", game, build)
        }
        LoaderKind::NeoForge => format!("neoforge-{}", loader_version),
        LoaderKind::OptiFine => format!("{}-OptiFine_{}", game_version, loader_version),
    }
}

/// Forge build in catalog form. Accepts both `"47.2.0"` and
/// `"1.20.1-47.2.0"`.
pub fn full_forge_version(game_version: &str, loader_version: &str) -> String {
    if loader_version.starts_with(&format!("{}-", game_version)) {
        loader_version.to_string()
    } else {
        format!("{}-{}", game_version, loader_version)
    }
}

/// Where an installed mod came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModProvenance {
    Modrinth,
    CurseForge,
    Local,
}

impl ModProvenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModProvenance::Modrinth => "modrinth",
            ModProvenance::CurseForge => "curseforge",
            ModProvenance::Local => "local",
        }
    }

    /// Short tag used inside share codes. Local mods have none.
    pub fn share_tag(&self) -> Option<&'static str> {
        match self {
            ModProvenance::Modrinth => Some("mr"),
            ModProvenance::CurseForge => Some("cf"),
            ModProvenance::Local => None,
        }
    }

    pub fn from_share_tag(tag: &str) -> Option<Self> {
        match tag {
            "mr" => Some(ModProvenance::Modrinth),
            "cf" => Some(ModProvenance::CurseForge),
            _ => None,
        }
    }
}

impl std::fmt::Display for ModProvenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledModReference {
    /// File name inside `mods/`, including a `.disabled` suffix if disabled
    pub filename: String,
    pub provenance: ModProvenance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_mod_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_version_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl InstalledModReference {
    pub fn local(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            provenance: ModProvenance::Local,
            remote_mod_id: None,
            remote_version_id: None,
            display_name: None,
        }
    }

    /// Only mods with a registry id can go into a share code.
    pub fn is_shareable(&self) -> bool {
        self.provenance != ModProvenance::Local && self.remote_mod_id.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub game_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loader_kind: Option<LoaderKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loader_version: Option<String>,
    /// OptiFine edition for `forge+optifine` profiles, e.g. "HD_U_I6"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optifine_version: Option<String>,
    pub data_directory: PathBuf,
    /// The user picked `data_directory` instead of having it derived
    #[serde(default)]
    pub custom_directory: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_played_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub installed_mods: Vec<InstalledModReference>,
    #[serde(default = "default_icon")]
    pub icon: String,
}

fn default_icon() -> String {
    DEFAULT_ICON.to_string()
}

impl Profile {
    pub fn resolved_version_id(&self) -> String {
        resolve_version_id(
            &self.game_version,
            self.loader_kind,
            self.loader_version.as_deref(),
        )
    }

    pub fn is_vanilla(&self) -> bool {
        self.loader_kind.is_none()
    }

    pub fn folder(&self, folder: ProfileFolder) -> PathBuf {
        self.data_directory.join(folder.dir_name())
    }

    pub fn mods_dir(&self) -> PathBuf {
        self.folder(ProfileFolder::Mods)
    }

    /// "Fabric 0.15.7" style label, or "Vanilla".
    pub fn loader_label(&self) -> String {
        match (&self.loader_kind, &self.loader_version) {
            (Some(kind), Some(version)) => format!("{} {}", kind, version),
            _ => "Vanilla".to_string(),
        }
    }
}

/// Input for [`ProfileStore::create`](super::ProfileStore::create).
#[derive(Debug, Clone, Default)]
pub struct NewProfile {
    pub name: String,
    pub game_version: String,
    pub loader_kind: Option<LoaderKind>,
    pub loader_version: Option<String>,
    pub optifine_version: Option<String>,
    /// Leave empty to derive one under the profiles root
    pub data_directory: Option<PathBuf>,
    pub icon: Option<String>,
}

impl NewProfile {
    pub fn new(name: impl Into<String>, game_version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            game_version: game_version.into(),
            ..Self::default()
        }
    }

    pub fn with_loader(mut self, kind: LoaderKind, version: impl Into<String>) -> Self {
        self.loader_kind = Some(kind);
        self.loader_version = Some(version.into());
        self
    }

    pub fn with_optifine(mut self, edition: impl Into<String>) -> Self {
        self.optifine_version = Some(edition.into());
        self
    }

    pub fn with_data_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_directory = Some(dir.into());
        self
    }

    pub fn resolved_version_id(&self) -> String {
        resolve_version_id(
            &self.game_version,
            self.loader_kind,
            self.loader_version.as_deref(),
        )
    }
}

/// Partial update. `None` leaves a field alone; the nested options allow
/// clearing the loader.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub game_version: Option<String>,
    pub loader_kind: Option<Option<LoaderKind>>,
    pub loader_version: Option<Option<String>>,
    pub optifine_version: Option<Option<String>>,
    /// Setting this marks the directory as user-chosen
    pub data_directory: Option<PathBuf>,
    pub icon: Option<String>,
    pub installed_mods: Option<Vec<InstalledModReference>>,
}

/// Folders of a profile that can be previewed and exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileFolder {
    Mods,
    ResourcePacks,
    ShaderPacks,
    Config,
}

impl ProfileFolder {
    pub const ALL: [ProfileFolder; 4] = [
        ProfileFolder::Mods,
        ProfileFolder::ResourcePacks,
        ProfileFolder::ShaderPacks,
        ProfileFolder::Config,
    ];

    pub fn dir_name(&self) -> &'static str {
        match self {
            ProfileFolder::Mods => "mods",
            ProfileFolder::ResourcePacks => "resourcepacks",
            ProfileFolder::ShaderPacks => "shaderpacks",
            ProfileFolder::Config => "config",
        }
    }

    pub fn from_dir_name(name: &str) -> Option<Self> {
        ProfileFolder::ALL.into_iter().find(|f| f.dir_name() == name)
    }
}

/// Size preview of a profile's exportable folders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DirectoryInfo {
    pub mods: DirStats,
    pub resourcepacks: DirStats,
    pub shaderpacks: DirStats,
    pub config: DirStats,
}

impl DirectoryInfo {
    pub fn scan(data_directory: &Path) -> Self {
        let stats = |folder: ProfileFolder| crate::utils::fs::dir_stats(&data_directory.join(folder.dir_name()));
        Self {
            mods: stats(ProfileFolder::Mods),
            resourcepacks: stats(ProfileFolder::ResourcePacks),
            shaderpacks: stats(ProfileFolder::ShaderPacks),
            config: stats(ProfileFolder::Config),
        }
    }

    pub fn get(&self, folder: ProfileFolder) -> DirStats {
        match folder {
            ProfileFolder::Mods => self.mods,
            ProfileFolder::ResourcePacks => self.resourcepacks,
            ProfileFolder::ShaderPacks => self.shaderpacks,
            ProfileFolder::Config => self.config,
        }
    }
}
