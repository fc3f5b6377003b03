use crate::game::installer::core::traits::VersionInfo;
use crate::utils::fs::dir_stats;
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

/// Installed versions on disk: `versions/<id>/<id>.json` plus whatever the
/// installer put next to it.
#[derive(Debug, Clone)]
pub struct LocalVersions {
    versions_dir: PathBuf,
}

impl LocalVersions {
    pub fn new(versions_dir: impl Into<PathBuf>) -> Self {
        Self {
            versions_dir: versions_dir.into(),
        }
    }

    fn version_dir(&self, id: &str) -> Result<PathBuf> {
        let plain = !id.is_empty()
            && Path::new(id).components().count() == 1
            && !id.contains(['/', '\\'])
            && id != "."
            && id != "..";
        if !plain {
            return Err(anyhow!("Invalid version id: {:?}", id));
        }
        Ok(self.versions_dir.join(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.version_dir(id)
            .map(|dir| dir.join(format!("{}.json", id)).is_file())
            .unwrap_or(false)
    }

    /// Installed versions, newest release time first. Versions whose JSON
    /// cannot be read still show up, as releases without a date.
    pub async fn list(&self) -> Result<Vec<VersionInfo>> {
        let mut entries = match tokio::fs::read_dir(&self.versions_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read {}", self.versions_dir.display())
                })
            }
        };

        let mut versions = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let id = entry.file_name().to_string_lossy().to_string();
            let json_path = entry.path().join(format!("{}.json", id));
            if !json_path.is_file() {
                continue;
            }
            let info = match tokio::fs::read_to_string(&json_path).await {
                Ok(content) => serde_json::from_str::<VersionInfo>(&content).ok(),
                Err(_) => None,
            };
            versions.push(info.map(|i| VersionInfo { id: id.clone(), ..i }).unwrap_or(VersionInfo {
                id,
                version_type: "release".to_string(),
                release_time: None,
            }));
        }
        versions.sort_by(|a, b| b.release_time.cmp(&a.release_time).then_with(|| a.id.cmp(&b.id)));
        Ok(versions)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let dir = self.version_dir(id)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                log::info!("[install] Deleted version {}", id);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete {}", dir.display())),
        }
    }

    /// Bytes used by the version's own directory.
    pub async fn size_of(&self, id: &str) -> Result<u64> {
        let dir = self.version_dir(id)?;
        let stats = tokio::task::spawn_blocking(move || dir_stats(&dir))
            .await
            .context("Size scan task failed")?;
        Ok(stats.total_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn install_fake(root: &Path, id: &str, json: &str, jar_bytes: usize) {
        let dir = root.join(id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(format!("{}.json", id)), json).unwrap();
        std::fs::write(dir.join(format!("{}.jar", id)), vec![0u8; jar_bytes]).unwrap();
    }

    #[tokio::test]
    async fn lists_sizes_and_deletes() {
        let tmp = TempDir::new().unwrap();
        install_fake(
            tmp.path(),
            "1.20.1",
            r#"{"id":"1.20.1","type":"release","releaseTime":"2023-06-12T13:25:51+00:00"}"#,
            100,
        );
        install_fake(
            tmp.path(),
            "fabric-loader-0.15.7-1.20.1",
            r#"{"id":"fabric-loader-0.15.7-1.20.1","inheritsFrom":"1.20.1","releaseTime":"2024-02-01T00:00:00+00:00"}"#,
            0,
        );
        std::fs::create_dir_all(tmp.path().join("half-installed")).unwrap();

        let local = LocalVersions::new(tmp.path());
        let ids: Vec<String> = local.list().await.unwrap().into_iter().map(|v| v.id).collect();
        assert_eq!(ids, vec!["fabric-loader-0.15.7-1.20.1", "1.20.1"]);
        assert!(local.contains("1.20.1"));
        assert!(!local.contains("half-installed"));

        let size = local.size_of("1.20.1").await.unwrap();
        assert!(size >= 100);

        local.delete("1.20.1").await.unwrap();
        assert!(!local.contains("1.20.1"));
        local.delete("1.20.1").await.unwrap();
    }

    #[tokio::test]
    async fn rejects_path_like_ids() {
        let tmp = TempDir::new().unwrap();
        let local = LocalVersions::new(tmp.path().join("versions"));
        assert!(local.delete("../escape").await.is_err());
        assert!(local.delete("..").await.is_err());
        assert!(!local.contains(""));
    }

    #[tokio::test]
    async fn missing_versions_dir_is_empty() {
        let tmp = TempDir::new().unwrap();
        let local = LocalVersions::new(tmp.path().join("nope"));
        assert!(local.list().await.unwrap().is_empty());
    }
}
