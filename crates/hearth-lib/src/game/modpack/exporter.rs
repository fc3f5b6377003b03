use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use walkdir::WalkDir;
use zip::{write::FileOptions, ZipWriter};

use crate::error::ArchiveError;
use crate::game::installer::types::ProgressSink;
use crate::game::modpack::types::{
    ExportManifest, ExportSummary, ProfileDescriptor, EXPORT_FORMAT_VERSION, MANIFEST_NAME,
};
use crate::game::profile::{Profile, ProfileFolder};

/// Files under the selected folders, relative to the data directory and
/// sorted so archives are reproducible.
fn collect_files(data_dir: &Path, folders: &[ProfileFolder]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for folder in folders {
        let root = data_dir.join(folder.dir_name());
        if !root.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(data_dir) {
                files.push(rel.to_path_buf());
            }
        }
    }
    files.sort();
    files
}

/// Archive entry name for a relative path, always with `/` separators.
fn entry_name(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn write_archive(
    data_dir: &Path,
    manifest: &ExportManifest,
    files: &[PathBuf],
    output: &Path,
    sink: &dyn ProgressSink,
) -> Result<(), ArchiveError> {
    let out_dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(out_dir)?;

    let tmp = NamedTempFile::new_in(out_dir)?;
    let mut zip = ZipWriter::new(tmp);
    let options: FileOptions<()> =
        FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let total = files.len() as u64 + 1;
    sink.on_status("Writing manifest");
    zip.start_file(MANIFEST_NAME, options)?;
    let manifest_json = serde_json::to_vec_pretty(manifest)
        .map_err(|e| ArchiveError::InvalidFormat(e.to_string()))?;
    zip.write_all(&manifest_json)?;
    sink.on_progress(1, total);

    for (i, rel) in files.iter().enumerate() {
        let name = entry_name(rel);
        sink.on_status(&format!("Adding {}", name));
        log::debug!("[modpack] Adding {}", name);

        zip.start_file(name, options)?;
        let mut f = File::open(data_dir.join(rel))?;
        std::io::copy(&mut f, &mut zip)?;
        sink.on_progress(i as u64 + 2, total);
    }

    let tmp = zip.finish()?;
    tmp.persist(output).map_err(|e| ArchiveError::Filesystem(e.error.to_string()))?;
    Ok(())
}

/// Export `profile` as a zip containing a manifest plus every file under the
/// selected folders, stored relative to the data directory.
///
/// Progress totals count the manifest as one unit on top of the files.
pub async fn export_profile(
    profile: &Profile,
    folders: &[ProfileFolder],
    output: &Path,
    sink: Arc<dyn ProgressSink>,
) -> Result<ExportSummary, ArchiveError> {
    let mut included: Vec<ProfileFolder> = folders.to_vec();
    included.sort();
    included.dedup();

    let manifest = ExportManifest {
        format_version: EXPORT_FORMAT_VERSION,
        profile: ProfileDescriptor::from(profile),
        included_folders: included.clone(),
        exported_at: chrono::Utc::now(),
    };
    let data_dir = profile.data_directory.clone();
    let output = output.to_path_buf();

    log::info!(
        "[modpack] Exporting {} ({:?}) to {}",
        profile.name,
        included,
        output.display()
    );

    tokio::task::spawn_blocking(move || {
        let files = collect_files(&data_dir, &included);
        write_archive(&data_dir, &manifest, &files, &output, sink.as_ref())?;
        log::info!("[modpack] Exported {} file(s)", files.len());
        Ok(ExportSummary {
            archive_path: output,
            files_written: files.len(),
        })
    })
    .await
    .map_err(|e| ArchiveError::Filesystem(format!("export task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(u64, u64)>>);

    impl ProgressSink for Recorder {
        fn on_status(&self, _text: &str) {}
        fn on_progress(&self, current: u64, total: u64) {
            self.0.lock().unwrap().push((current, total));
        }
    }

    #[test]
    fn entry_names_use_forward_slashes() {
        let rel: PathBuf = ["config", "sodium", "options.json"].iter().collect();
        assert_eq!(entry_name(&rel), "config/sodium/options.json");
    }

    #[test]
    fn collects_only_selected_folders() {
        let tmp = TempDir::new().unwrap();
        for (dir, file) in [("mods", "a.jar"), ("config", "b.toml"), ("saves", "level.dat")] {
            std::fs::create_dir_all(tmp.path().join(dir)).unwrap();
            std::fs::write(tmp.path().join(dir).join(file), b"x").unwrap();
        }

        let files = collect_files(tmp.path(), &[ProfileFolder::Mods, ProfileFolder::Config]);
        assert_eq!(
            files,
            vec![PathBuf::from("config/b.toml"), PathBuf::from("mods/a.jar")]
        );
    }

    #[test]
    fn progress_counts_manifest_as_one_unit() {
        let tmp = TempDir::new().unwrap();
        let data = tmp.path().join("data");
        std::fs::create_dir_all(data.join("mods")).unwrap();
        std::fs::write(data.join("mods").join("a.jar"), b"a").unwrap();
        std::fs::write(data.join("mods").join("b.jar"), b"b").unwrap();

        let manifest = ExportManifest {
            format_version: EXPORT_FORMAT_VERSION,
            profile: ProfileDescriptor {
                name: "x".to_string(),
                game_version: "1.20.1".to_string(),
                loader_kind: None,
                loader_version: None,
                optifine_version: None,
                icon: None,
                installed_mods: Vec::new(),
            },
            included_folders: vec![ProfileFolder::Mods],
            exported_at: chrono::Utc::now(),
        };
        let files = collect_files(&data, &[ProfileFolder::Mods]);
        let recorder = Recorder::default();
        write_archive(&data, &manifest, &files, &tmp.path().join("out.zip"), &recorder).unwrap();

        assert_eq!(*recorder.0.lock().unwrap(), vec![(1, 3), (2, 3), (3, 3)]);
        let archive = zip::ZipArchive::new(File::open(tmp.path().join("out.zip")).unwrap()).unwrap();
        assert_eq!(archive.len(), 3);
    }
}
