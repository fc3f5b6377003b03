use crate::game::profile::{
    InstalledModReference, LoaderKind, Profile, ProfileFolder,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Bumped when the archive layout changes incompatibly.
pub const EXPORT_FORMAT_VERSION: u32 = 1;

/// Manifest entry name at the archive root.
pub const MANIFEST_NAME: &str = "hearth-profile.json";

/// The profile fields an archive carries. Ids, paths and timestamps are
/// machine-local and are not exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDescriptor {
    pub name: String,
    pub game_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loader_kind: Option<LoaderKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loader_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optifine_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub installed_mods: Vec<InstalledModReference>,
}

impl From<&Profile> for ProfileDescriptor {
    fn from(profile: &Profile) -> Self {
        Self {
            name: profile.name.clone(),
            game_version: profile.game_version.clone(),
            loader_kind: profile.loader_kind,
            loader_version: profile.loader_version.clone(),
            optifine_version: profile.optifine_version.clone(),
            icon: Some(profile.icon.clone()),
            installed_mods: profile.installed_mods.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportManifest {
    pub format_version: u32,
    pub profile: ProfileDescriptor,
    pub included_folders: Vec<ProfileFolder>,
    pub exported_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub archive_path: PathBuf,
    pub files_written: usize,
}

/// Overrides applied when importing an archive.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Use this name instead of the one in the manifest
    pub name: Option<String>,
    /// Bind the new profile to this directory instead of deriving one
    pub data_directory: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ImportReport {
    pub profile: Profile,
    pub files_extracted: usize,
    /// Non-fatal problems (format version drift, skipped entries)
    pub warnings: Vec<String>,
}

/// Decoded share code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedProfile {
    pub format_version: u32,
    pub name: String,
    pub game_version: String,
    pub loader_kind: Option<LoaderKind>,
    pub loader_version: Option<String>,
    pub mods: Vec<InstalledModReference>,
}
