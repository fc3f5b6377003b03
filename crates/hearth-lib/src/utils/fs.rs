//! Small filesystem helpers shared by the stores and the archive code.

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use walkdir::WalkDir;

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
///
/// The document is written to a temp file in the same directory and then
/// renamed over the target, so readers see either the old or the new file.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| anyhow!("{} has no parent directory", path.display()))?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    serde_json::to_writer_pretty(&mut tmp, value).context("Failed to serialize document")?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

/// Read a JSON document, returning `Ok(None)` when the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
    };
    let value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(value))
}

/// File count and byte total for a directory tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DirStats {
    pub exists: bool,
    pub file_count: u64,
    pub total_bytes: u64,
}

pub fn dir_stats(path: &Path) -> DirStats {
    if !path.is_dir() {
        return DirStats::default();
    }

    let mut stats = DirStats {
        exists: true,
        ..DirStats::default()
    };
    for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
        if entry.file_type().is_file() {
            stats.file_count += 1;
            stats.total_bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_replaces_existing_document() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("doc.json");

        write_json_atomic(&path, &vec![1, 2, 3]).unwrap();
        write_json_atomic(&path, &vec![4]).unwrap();

        let read: Option<Vec<u32>> = read_json(&path).unwrap();
        assert_eq!(read, Some(vec![4]));
        // no stray temp files left next to the document
        assert_eq!(std::fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn read_missing_is_none() {
        let tmp = TempDir::new().unwrap();
        let read: Option<Vec<u32>> = read_json(&tmp.path().join("absent.json")).unwrap();
        assert!(read.is_none());
    }

    #[test]
    fn stats_count_nested_files() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("config");
        std::fs::create_dir_all(root.join("sub")).unwrap();
        std::fs::write(root.join("a.toml"), b"12345").unwrap();
        std::fs::write(root.join("sub").join("b.json"), b"123").unwrap();

        let stats = dir_stats(&root);
        assert!(stats.exists);
        assert_eq!(stats.file_count, 2);
        assert_eq!(stats.total_bytes, 8);

        assert_eq!(dir_stats(&tmp.path().join("missing")), DirStats::default());
    }
}
