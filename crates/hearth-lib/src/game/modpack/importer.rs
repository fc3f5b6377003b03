use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use zip::ZipArchive;

use crate::error::ArchiveError;
use crate::game::installer::types::ProgressSink;
use crate::game::modpack::types::{
    ExportManifest, ImportOptions, ImportReport, EXPORT_FORMAT_VERSION, MANIFEST_NAME,
};
use crate::game::profile::{NewProfile, ProfileStore, ProfileUpdate};

/// Read and check the manifest of a profile archive.
///
/// A format version other than [`EXPORT_FORMAT_VERSION`] is returned as a
/// warning, not an error.
pub fn read_manifest(path: &Path) -> Result<(ExportManifest, Vec<String>), ArchiveError> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file)?;
    log::info!(
        "[modpack] Opened {} ({} entries)",
        path.display(),
        archive.len()
    );

    let mut entry = archive.by_name(MANIFEST_NAME).map_err(|_| {
        ArchiveError::InvalidFormat(format!("{} is missing", MANIFEST_NAME))
    })?;
    let mut content = String::new();
    entry.read_to_string(&mut content)?;
    let manifest: ExportManifest = serde_json::from_str(&content)
        .map_err(|e| ArchiveError::InvalidFormat(format!("bad manifest: {}", e)))?;

    let mut warnings = Vec::new();
    if manifest.format_version != EXPORT_FORMAT_VERSION {
        let mismatch = ArchiveError::VersionMismatch {
            found: manifest.format_version,
            expected: EXPORT_FORMAT_VERSION,
        };
        log::warn!("[modpack] {}; importing anyway", mismatch);
        warnings.push(mismatch.to_string());
    }
    Ok((manifest, warnings))
}

/// Extract every entry except the manifest under `dest`. Entries whose path
/// would escape `dest` are skipped and reported.
fn extract_entries(
    path: &Path,
    dest: &Path,
    sink: &dyn ProgressSink,
) -> Result<(usize, Vec<String>), ArchiveError> {
    let mut archive = ZipArchive::new(File::open(path)?)?;
    let total = archive.len() as u64;
    let mut extracted = 0;
    let mut warnings = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        sink.on_progress(i as u64 + 1, total);
        if entry.is_dir() || entry.name() == MANIFEST_NAME {
            continue;
        }
        let Some(rel) = entry.enclosed_name() else {
            let warning = format!("skipped unsafe entry {}", entry.name());
            log::warn!("[modpack] {}", warning);
            warnings.push(warning);
            continue;
        };

        let target = dest.join(&rel);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        sink.on_status(&format!("Extracting {}", entry.name()));
        let mut out = File::create(&target)?;
        std::io::copy(&mut entry, &mut out)?;
        extracted += 1;
    }
    Ok((extracted, warnings))
}

/// Create a new profile from an exported archive.
///
/// The profile goes through the normal creation path, with `" (n)"` appended
/// to the name if it is taken, and then the archived files are unpacked into
/// its data directory.
pub async fn import_profile(
    store: &ProfileStore,
    archive_path: &Path,
    options: ImportOptions,
    sink: Arc<dyn ProgressSink>,
) -> Result<ImportReport, ArchiveError> {
    let archive_path: PathBuf = archive_path.to_path_buf();
    let (manifest, mut warnings) = {
        let path = archive_path.clone();
        tokio::task::spawn_blocking(move || read_manifest(&path))
            .await
            .map_err(|e| ArchiveError::Filesystem(format!("import task failed: {}", e)))??
    };

    let descriptor = manifest.profile;
    let new = NewProfile {
        name: options.name.unwrap_or(descriptor.name),
        game_version: descriptor.game_version,
        loader_kind: descriptor.loader_kind,
        loader_version: descriptor.loader_version,
        optifine_version: descriptor.optifine_version,
        data_directory: options.data_directory,
        icon: descriptor.icon,
    };
    let mut profile = store.create_unique(new).await?;
    if !descriptor.installed_mods.is_empty() {
        profile = store
            .update(
                &profile.id,
                ProfileUpdate {
                    installed_mods: Some(descriptor.installed_mods),
                    ..ProfileUpdate::default()
                },
            )
            .await?;
    }

    let dest = profile.data_directory.clone();
    let (files_extracted, extract_warnings) =
        tokio::task::spawn_blocking(move || extract_entries(&archive_path, &dest, sink.as_ref()))
            .await
            .map_err(|e| ArchiveError::Filesystem(format!("import task failed: {}", e)))??;
    warnings.extend(extract_warnings);

    log::info!(
        "[modpack] Imported {} as {} ({} file(s))",
        profile.name,
        profile.id,
        files_extracted
    );
    Ok(ImportReport {
        profile,
        files_extracted,
        warnings,
    })
}
