//! Mods folder bookkeeping for a profile: list, enable/disable, remove.

use super::{InstalledModReference, ProfileStore};
use crate::error::StoreError;
use serde::Serialize;
use std::path::{Component, Path};

const DISABLED_SUFFIX: &str = ".disabled";

/// A jar found in a profile's `mods/` folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModFile {
    pub filename: String,
    pub enabled: bool,
    pub size: u64,
    /// Where it came from, when the launcher installed it
    pub reference: Option<InstalledModReference>,
}

fn enabled_name(filename: &str) -> &str {
    filename.strip_suffix(DISABLED_SUFFIX).unwrap_or(filename)
}

fn is_mod_file(filename: &str) -> bool {
    enabled_name(filename).ends_with(".jar")
}

/// Accepts only a bare file name that stays inside the mods folder.
fn mod_file_name(filename: &str) -> Result<&str, StoreError> {
    let mut components = Path::new(filename).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(filename),
        _ => Err(StoreError::Invalid(format!(
            "{:?} is not a file name in the mods folder",
            filename
        ))),
    }
}

impl ProfileStore {
    /// Every `.jar` and `.jar.disabled` in the profile's mods folder, sorted by
    /// file name.
    pub async fn list_mods(&self, id: &str) -> Result<Vec<ModFile>, StoreError> {
        let profile = self
            .get(id)
            .await
            .ok_or_else(|| StoreError::NotFound(format!("profile {}", id)))?;
        let mods_dir = profile.mods_dir();

        let entries = match std::fs::read_dir(&mods_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::persistence(&mods_dir, e)),
        };

        let mut mods: Vec<ModFile> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| {
                let filename = entry.file_name().to_string_lossy().to_string();
                if !is_mod_file(&filename) {
                    return None;
                }
                let reference = profile
                    .installed_mods
                    .iter()
                    .find(|r| enabled_name(&r.filename) == enabled_name(&filename))
                    .cloned();
                Some(ModFile {
                    enabled: !filename.ends_with(DISABLED_SUFFIX),
                    size: entry.metadata().map(|m| m.len()).unwrap_or(0),
                    filename,
                    reference,
                })
            })
            .collect();
        mods.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(mods)
    }

    /// Enable or disable a mod by renaming `x.jar` to `x.jar.disabled` or
    /// back. `filename` may be given in either form.
    pub async fn set_mod_enabled(
        &self,
        id: &str,
        filename: &str,
        enabled: bool,
    ) -> Result<String, StoreError> {
        let filename = mod_file_name(filename)?;
        let mut profiles = self.profiles.lock().await;
        let profile = profiles
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("profile {}", id)))?;

        let base = enabled_name(filename).to_string();
        let disabled = format!("{}{}", base, DISABLED_SUFFIX);
        let (from, to) = if enabled { (&disabled, &base) } else { (&base, &disabled) };

        let mods_dir = profile.mods_dir();
        let target = mods_dir.join(to);
        if target.is_file() {
            return Ok(to.clone());
        }
        let source = mods_dir.join(from);
        if !source.is_file() {
            return Err(StoreError::NotFound(format!("mod {}", base)));
        }
        std::fs::rename(&source, &target).map_err(|e| StoreError::persistence(&target, e))?;

        for reference in profile
            .installed_mods
            .iter_mut()
            .filter(|r| enabled_name(&r.filename) == base)
        {
            reference.filename = to.clone();
        }
        log::info!(
            "[mods] {} {} in {}",
            if enabled { "Enabled" } else { "Disabled" },
            base,
            profile.name
        );
        self.persist_logged(&profiles);
        Ok(to.clone())
    }

    /// Delete a mod file and forget its reference.
    pub async fn remove_mod(&self, id: &str, filename: &str) -> Result<(), StoreError> {
        let filename = mod_file_name(filename)?;
        let mut profiles = self.profiles.lock().await;
        let profile = profiles
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("profile {}", id)))?;

        let path = profile.mods_dir().join(filename);
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(format!("mod {}", filename)));
            }
            Err(e) => return Err(StoreError::persistence(&path, e)),
        }

        let base = enabled_name(filename).to_string();
        profile
            .installed_mods
            .retain(|r| enabled_name(&r.filename) != base);
        log::info!("[mods] Removed {} from {}", filename, profile.name);
        self.persist_logged(&profiles);
        Ok(())
    }

    /// Remember where a mod file came from. A previous reference for the same
    /// file is replaced.
    pub async fn record_installed_mod(
        &self,
        id: &str,
        reference: InstalledModReference,
    ) -> Result<(), StoreError> {
        let mut profiles = self.profiles.lock().await;
        let profile = profiles
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("profile {}", id)))?;

        let base = enabled_name(&reference.filename).to_string();
        profile
            .installed_mods
            .retain(|r| enabled_name(&r.filename) != base);
        profile.installed_mods.push(reference);
        self.persist_logged(&profiles);
        Ok(())
    }
}
