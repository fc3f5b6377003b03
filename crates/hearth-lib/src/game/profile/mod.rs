//! Profile store
//!
//! Owns the list of profiles and the path each one is bound to. The contents
//! of a profile's data directory belong to the installers and to the running
//! game, not to the store.

pub mod mods;
pub mod sanitize;
pub mod types;

pub use mods::ModFile;
pub use sanitize::sanitize_folder_name;
pub use types::*;

use crate::error::StoreError;
use crate::utils::fs::{read_json, write_json_atomic};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Folders every new profile starts with.
const INITIAL_FOLDERS: [&str; 3] = ["mods", "saves", "resourcepacks"];

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProfilesDocument {
    #[serde(default)]
    profiles: Vec<Profile>,
}

type Reservations = Arc<std::sync::Mutex<HashSet<PathBuf>>>;

pub struct ProfileStore {
    path: PathBuf,
    profiles_root: PathBuf,
    profiles: Mutex<Vec<Profile>>,
    /// Derived directories held by drafts that are not committed yet
    reserved: Reservations,
}

/// A validated profile that is not stored yet. Its derived directory stays
/// reserved until the draft is committed or dropped.
#[derive(Debug)]
pub struct ProfileDraft {
    profile: Profile,
    reserved: Option<Reservations>,
}

impl ProfileDraft {
    pub fn profile(&self) -> &Profile {
        &self.profile
    }
}

impl Deref for ProfileDraft {
    type Target = Profile;

    fn deref(&self) -> &Profile {
        &self.profile
    }
}

impl Drop for ProfileDraft {
    fn drop(&mut self) {
        if let Some(reserved) = self.reserved.take() {
            reserved
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&self.profile.data_directory);
        }
    }
}

impl ProfileStore {
    /// Open the store at `path`, deriving new data directories under
    /// `profiles_root`. An unreadable file is logged and treated as empty.
    pub fn open(path: impl Into<PathBuf>, profiles_root: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let profiles = match read_json::<ProfilesDocument>(&path) {
            Ok(Some(doc)) => doc.profiles,
            Ok(None) => Vec::new(),
            Err(e) => {
                log::warn!("[profiles] Starting with no profiles: {:#}", e);
                Vec::new()
            }
        };
        log::info!("[profiles] Loaded {} profile(s)", profiles.len());

        Self {
            path,
            profiles_root: profiles_root.into(),
            profiles: Mutex::new(profiles),
            reserved: Arc::default(),
        }
    }

    pub fn profiles_root(&self) -> &Path {
        &self.profiles_root
    }

    /// Create a profile and its initial folders. The name must be unique
    /// enough to be useful but duplicates are allowed; see
    /// [`create_unique`](Self::create_unique).
    pub async fn create(&self, new: NewProfile) -> Result<Profile, StoreError> {
        let mut profiles = self.profiles.lock().await;
        self.create_locked(&mut profiles, new)
    }

    /// Like [`create`](Self::create), but renames to `"<name> (n)"` with the
    /// smallest free `n` if the name is already taken.
    pub async fn create_unique(&self, mut new: NewProfile) -> Result<Profile, StoreError> {
        let mut profiles = self.profiles.lock().await;
        new.name = unique_name(&profiles, new.name.trim());
        self.create_locked(&mut profiles, new)
    }

    /// Validate `new` and work out the profile it would become, without
    /// touching the disk or the list. Pair with [`commit`](Self::commit) to
    /// install before persisting. Other drafts and creates skip the derived
    /// directory while the draft is alive.
    pub async fn draft(&self, new: NewProfile) -> Result<ProfileDraft, StoreError> {
        let profiles = self.profiles.lock().await;
        let profile = self.draft_locked(&profiles, new)?;
        let reserved = if profile.custom_directory {
            None
        } else {
            self.reserved
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(profile.data_directory.clone());
            Some(self.reserved.clone())
        };
        Ok(ProfileDraft { profile, reserved })
    }

    /// Store a drafted profile and create its initial folders. Fails with
    /// [`StoreError::Conflict`] if its id or directory was taken meanwhile.
    pub async fn commit(&self, draft: ProfileDraft) -> Result<Profile, StoreError> {
        let mut profiles = self.profiles.lock().await;
        self.commit_locked(&mut profiles, draft.profile.clone())
    }

    fn create_locked(
        &self,
        profiles: &mut Vec<Profile>,
        new: NewProfile,
    ) -> Result<Profile, StoreError> {
        let profile = self.draft_locked(profiles, new)?;
        self.commit_locked(profiles, profile)
    }

    fn draft_locked(&self, profiles: &[Profile], new: NewProfile) -> Result<Profile, StoreError> {
        let name = new.name.trim().to_string();
        if name.is_empty() {
            return Err(StoreError::Invalid("profile name must not be empty".to_string()));
        }
        let loader_version =
            normalize_loader(&new.game_version, new.loader_kind, new.loader_version.as_deref())?;

        let (data_directory, custom_directory) = match new.data_directory {
            Some(dir) => (dir, true),
            None => (self.derive_directory(profiles, &name), false),
        };

        Ok(Profile {
            id: new_profile_id(),
            name,
            game_version: new.game_version,
            loader_kind: new.loader_kind,
            loader_version,
            optifine_version: new.optifine_version,
            data_directory,
            custom_directory,
            created_at: Utc::now(),
            last_played_at: None,
            installed_mods: Vec::new(),
            icon: new.icon.unwrap_or_else(|| DEFAULT_ICON.to_string()),
        })
    }

    fn commit_locked(
        &self,
        profiles: &mut Vec<Profile>,
        profile: Profile,
    ) -> Result<Profile, StoreError> {
        if profiles.iter().any(|p| p.id == profile.id) {
            return Err(StoreError::Conflict(format!("profile id {} is taken", profile.id)));
        }
        if !profile.custom_directory
            && profiles.iter().any(|p| p.data_directory == profile.data_directory)
        {
            return Err(StoreError::Conflict(format!(
                "{} is already used by another profile",
                profile.data_directory.display()
            )));
        }
        for folder in INITIAL_FOLDERS {
            let dir = profile.data_directory.join(folder);
            std::fs::create_dir_all(&dir).map_err(|e| StoreError::persistence(&dir, e))?;
        }
        log::info!(
            "[profiles] Created {} ({}, {}) at {}",
            profile.name,
            profile.id,
            profile.resolved_version_id(),
            profile.data_directory.display()
        );

        profiles.push(profile.clone());
        self.persist_logged(profiles);
        Ok(profile)
    }

    /// `<root>/<sanitized name>`, with `-2`, `-3`, ... appended while the
    /// folder exists on disk or is bound to another profile.
    fn derive_directory(&self, profiles: &[Profile], name: &str) -> PathBuf {
        let base = sanitize_folder_name(name);
        let reserved = self.reserved.lock().unwrap_or_else(|e| e.into_inner());
        let taken = |dir: &Path| {
            dir.exists()
                || reserved.contains(dir)
                || profiles.iter().any(|p| p.data_directory == dir)
        };

        let mut candidate = self.profiles_root.join(&base);
        let mut n = 2;
        while taken(&candidate) {
            candidate = self.profiles_root.join(format!("{}-{}", base, n));
            n += 1;
        }
        candidate
    }

    pub async fn get(&self, id: &str) -> Option<Profile> {
        self.profiles.lock().await.iter().find(|p| p.id == id).cloned()
    }

    /// All profiles, most recently played first. Never-played profiles come
    /// last, in creation order.
    pub async fn list(&self) -> Vec<Profile> {
        let mut list = self.profiles.lock().await.clone();
        list.sort_by(|a, b| b.last_played_at.cmp(&a.last_played_at));
        list
    }

    pub async fn update(&self, id: &str, update: ProfileUpdate) -> Result<Profile, StoreError> {
        let mut profiles = self.profiles.lock().await;
        let profile = profiles
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("profile {}", id)))?;

        let mut next = profile.clone();
        if let Some(name) = update.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(StoreError::Invalid("profile name must not be empty".to_string()));
            }
            next.name = name;
        }
        if let Some(game_version) = update.game_version {
            next.game_version = game_version;
        }
        if let Some(loader_kind) = update.loader_kind {
            next.loader_kind = loader_kind;
        }
        if let Some(loader_version) = update.loader_version {
            next.loader_version = loader_version;
        }
        if let Some(optifine_version) = update.optifine_version {
            next.optifine_version = optifine_version;
        }
        if let Some(dir) = update.data_directory {
            next.data_directory = dir;
            next.custom_directory = true;
        }
        if let Some(icon) = update.icon {
            next.icon = icon;
        }
        if let Some(installed_mods) = update.installed_mods {
            next.installed_mods = installed_mods;
        }
        next.loader_version =
            normalize_loader(&next.game_version, next.loader_kind, next.loader_version.as_deref())?;

        *profile = next.clone();
        self.persist_logged(&profiles);
        Ok(next)
    }

    /// Forget a profile. Its data directory and any installed game version
    /// are left on disk; callers decide about those separately.
    pub async fn delete(&self, id: &str) -> bool {
        let mut profiles = self.profiles.lock().await;
        let before = profiles.len();
        profiles.retain(|p| p.id != id);
        if profiles.len() == before {
            return false;
        }
        self.persist_logged(&profiles);
        log::info!("[profiles] Deleted {}", id);
        true
    }

    pub async fn mark_played(&self, id: &str) -> Result<Profile, StoreError> {
        let mut profiles = self.profiles.lock().await;
        let profile = profiles
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("profile {}", id)))?;
        profile.last_played_at = Some(Utc::now());
        let updated = profile.clone();
        self.persist_logged(&profiles);
        Ok(updated)
    }

    /// File counts and sizes of the exportable folders. Read-only.
    pub async fn directory_info(&self, id: &str) -> Result<DirectoryInfo, StoreError> {
        let profile = self
            .get(id)
            .await
            .ok_or_else(|| StoreError::NotFound(format!("profile {}", id)))?;
        Ok(DirectoryInfo::scan(&profile.data_directory))
    }

    /// Profiles other than `except` whose resolved version id is
    /// `resolved_id`. Reference counts are always computed, never stored.
    pub async fn versions_referencing(&self, resolved_id: &str, except: Option<&str>) -> Vec<Profile> {
        self.profiles
            .lock()
            .await
            .iter()
            .filter(|p| Some(p.id.as_str()) != except && p.resolved_version_id() == resolved_id)
            .cloned()
            .collect()
    }

    /// Smallest `"<name> (n)"` not used by any profile, or `name` itself.
    pub async fn unique_name(&self, name: &str) -> String {
        unique_name(&self.profiles.lock().await, name)
    }

    /// Write the current state to disk, reporting failure to the caller.
    pub async fn flush(&self) -> Result<(), StoreError> {
        let profiles = self.profiles.lock().await;
        self.persist(&profiles)
    }

    fn persist(&self, profiles: &[Profile]) -> Result<(), StoreError> {
        let doc = ProfilesDocument {
            profiles: profiles.to_vec(),
        };
        write_json_atomic(&self.path, &doc)
            .map_err(|e| StoreError::persistence(&self.path, format!("{:#}", e)))
    }

    fn persist_logged(&self, profiles: &[Profile]) {
        if let Err(e) = self.persist(profiles) {
            log::error!("[profiles] {}", e);
        }
    }
}

fn new_profile_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

fn unique_name(profiles: &[Profile], name: &str) -> String {
    let taken = |candidate: &str| profiles.iter().any(|p| p.name == candidate);
    if !taken(name) {
        return name.to_string();
    }
    (1..)
        .map(|n| format!("{} ({})", name, n))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| name.to_string())
}

/// Checks that a loader comes with a version and vice versa, and stores Forge
/// builds in the `<game>-<build>` form the installer uses.
fn normalize_loader(
    game_version: &str,
    kind: Option<LoaderKind>,
    version: Option<&str>,
) -> Result<Option<String>, StoreError> {
    let version = version.map(str::trim).filter(|v| !v.is_empty());
    match (kind, version) {
        (Some(kind), None) => Err(StoreError::Invalid(format!(
            "{} profiles need a loader version",
            kind
        ))),
        (None, Some(_)) => Err(StoreError::Invalid(
            "a loader version was given without a loader".to_string(),
        )),
        (Some(LoaderKind::Forge | LoaderKind::ForgeOptiFine), Some(version)) => {
            Ok(Some(full_forge_version(game_version, version)))
        }
        (_, version) => Ok(version.map(str::to_string)),
    }
}
